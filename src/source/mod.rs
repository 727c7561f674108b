//! Pull-based PCM sources.
//!
//! A [`SourceProvider`] opens one decoded stream per logical channel (for scopes) plus one full
//! mix (for the audio track). Streams are consumed through the [`SampleSource`] trait.

use std::path::{Path, PathBuf};

use crate::foundation::error::DecodeError;

/// In-memory PCM sources.
pub mod memory;
/// Standard MIDI File sources rendered through a soundfont synthesizer.
pub mod midi;
/// WAV file sources.
pub mod wav;

pub use memory::{MemoryProvider, MemorySource};
pub use midi::MidiProvider;
pub use wav::WavProvider;

/// `.mid`/`.midi` extension, case-insensitive.
pub fn is_midi_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("mid") || e.eq_ignore_ascii_case("midi"))
}

/// Open `path` as a MIDI provider (synthesized with `soundfonts`) or, otherwise, a WAV provider.
pub fn open_provider(
    path: &Path,
    soundfonts: &[PathBuf],
) -> Result<Box<dyn SourceProvider>, DecodeError> {
    if is_midi_path(path) {
        Ok(Box::new(MidiProvider::open(path, soundfonts)?))
    } else {
        Ok(Box::new(WavProvider::open(path)?))
    }
}

/// Result of one [`SampleSource::read`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` interleaved values were written to the front of the buffer.
    Read(usize),
    /// The stream has no more data; nothing was written.
    Ended,
}

/// A decoded interleaved `f32` PCM stream.
pub trait SampleSource: Send {
    /// Native sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Interleaved channel count.
    fn channels(&self) -> u16;

    /// Fill `buf` with up to `buf.len()` interleaved values.
    ///
    /// Short reads only happen at the end of the stream and are always a whole number of
    /// sample frames.
    fn read(&mut self, buf: &mut [f32]) -> Result<ReadOutcome, DecodeError>;

    /// Total length in interleaved values, when known up front.
    fn total_samples(&self) -> Option<u64>;

    /// Interleaved values handed out so far.
    fn consumed_samples(&self) -> u64;

    /// `false` once the stream has been fully consumed.
    fn is_playing(&self) -> bool;
}

/// Opens decoded streams for a multi-channel input.
pub trait SourceProvider: Send + Sync {
    /// Number of logical channels that can be opened with [`SourceProvider::open_channel`].
    fn channel_count(&self) -> usize;

    /// Open a stream restricted to one logical channel.
    ///
    /// `stereo` requests a two-channel stream where the provider can supply one; mono output
    /// is always acceptable since the scope duplicates it.
    fn open_channel(&self, channel: usize, stereo: bool)
    -> Result<Box<dyn SampleSource>, DecodeError>;

    /// Open the full mix used for the output audio track.
    fn open_mix(&self) -> Result<Box<dyn SampleSource>, DecodeError>;

    /// Time-stamped control events (tempo, program, bank) used for channel labels.
    fn event_list(&self) -> EventList {
        EventList::default()
    }
}

/// Control events in tick order plus the tick resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct EventList {
    /// Ticks per quarter note.
    pub ppqn: u16,
    /// Events sorted by tick (stable for equal ticks).
    pub events: Vec<SourceEvent>,
}

impl Default for EventList {
    fn default() -> Self {
        Self {
            ppqn: 480,
            events: Vec::new(),
        }
    }
}

/// One control event at an absolute tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceEvent {
    pub tick: u64,
    pub channel: u8,
    pub kind: SourceEventKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceEventKind {
    /// Microseconds per quarter note.
    Tempo(u32),
    Program(u8),
    /// Bank select (controller 0) value.
    Bank(u8),
}
