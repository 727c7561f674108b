use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use rustysynth::{SoundFont, Synthesizer, SynthesizerSettings};

use crate::events::TempoMap;
use crate::foundation::error::{DecodeError, DecodeErrorKind};
use crate::source::{
    EventList, ReadOutcome, SampleSource, SourceEvent, SourceEventKind, SourceProvider,
};

/// Output rate of synthesized MIDI streams.
pub const MIDI_SAMPLE_RATE: u32 = 48_000;

/// MIDI has 16 channels per port.
pub const MIDI_CHANNELS: usize = 16;

const DECAY_THRESHOLD: f32 = 1e-4;
const MAX_DECAY_TAIL_FRAMES: u64 = 10 * MIDI_SAMPLE_RATE as u64;

const NOTE_OFF: u8 = 0x80;
const NOTE_ON: u8 = 0x90;
const POLY_AFTERTOUCH: u8 = 0xA0;
const CONTROLLER: u8 = 0xB0;
const PROGRAM: u8 = 0xC0;
const CHANNEL_AFTERTOUCH: u8 = 0xD0;
const PITCH_BEND: u8 = 0xE0;

const BANK_SELECT: u8 = 0x00;
const PERCUSSION_CHANNEL: usize = 9;
const PERCUSSION_BANK_OFFSET: i32 = 128;

/// One channel message at an absolute output sample position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct TimedMessage {
    pub(crate) sample: u64,
    pub(crate) channel: u8,
    pub(crate) command: u8,
    pub(crate) data1: u8,
    pub(crate) data2: u8,
}

impl TimedMessage {
    fn is_note(&self) -> bool {
        matches!(self.command, NOTE_OFF | NOTE_ON | POLY_AFTERTOUCH)
    }

    /// Notes of other channels are dropped; every other message passes so controller and
    /// program state stay correct.
    pub(crate) fn passes_filter(&self, note_channel: Option<u8>) -> bool {
        match note_channel {
            Some(ch) if self.is_note() => self.channel == ch,
            _ => true,
        }
    }
}

/// Parsed SMF content, independent of any soundfont.
#[derive(Clone, Debug)]
pub(crate) struct ParsedMidi {
    pub(crate) messages: Vec<TimedMessage>,
    pub(crate) events: EventList,
    /// Sample position of the last event of any kind.
    pub(crate) end_sample: u64,
}

pub(crate) fn parse_smf(bytes: &[u8]) -> Result<ParsedMidi, DecodeError> {
    const PREFIX: &str = "Error creating stream: ";
    let smf = Smf::parse(bytes).map_err(|_| DecodeError::new(PREFIX, DecodeErrorKind::FileFormat))?;
    let ppqn = match smf.header.timing {
        Timing::Metrical(t) => t.as_int(),
        Timing::Timecode(..) => {
            return Err(DecodeError::new(PREFIX, DecodeErrorKind::FileFormat));
        }
    };

    let mut raw: Vec<(u64, TimedMessage)> = Vec::new();
    let mut control: Vec<SourceEvent> = Vec::new();
    let mut last_tick = 0u64;

    for track in &smf.tracks {
        let mut tick = 0u64;
        for event in track {
            tick += u64::from(event.delta.as_int());
            last_tick = last_tick.max(tick);
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(us)) => control.push(SourceEvent {
                    tick,
                    channel: 0,
                    kind: SourceEventKind::Tempo(us.as_int()),
                }),
                TrackEventKind::Midi { channel, message } => {
                    let channel = channel.as_int();
                    let (command, data1, data2) = match message {
                        MidiMessage::NoteOff { key, vel } => (NOTE_OFF, key.as_int(), vel.as_int()),
                        MidiMessage::NoteOn { key, vel } => (NOTE_ON, key.as_int(), vel.as_int()),
                        MidiMessage::Aftertouch { key, vel } => {
                            (POLY_AFTERTOUCH, key.as_int(), vel.as_int())
                        }
                        MidiMessage::Controller { controller, value } => {
                            if controller.as_int() == 0 {
                                control.push(SourceEvent {
                                    tick,
                                    channel,
                                    kind: SourceEventKind::Bank(value.as_int()),
                                });
                            }
                            (CONTROLLER, controller.as_int(), value.as_int())
                        }
                        MidiMessage::ProgramChange { program } => {
                            control.push(SourceEvent {
                                tick,
                                channel,
                                kind: SourceEventKind::Program(program.as_int()),
                            });
                            (PROGRAM, program.as_int(), 0)
                        }
                        MidiMessage::ChannelAftertouch { vel } => (CHANNEL_AFTERTOUCH, vel.as_int(), 0),
                        MidiMessage::PitchBend { bend } => {
                            let raw = bend.0.as_int();
                            (PITCH_BEND, (raw & 0x7f) as u8, (raw >> 7) as u8)
                        }
                    };
                    raw.push((
                        tick,
                        TimedMessage {
                            sample: 0,
                            channel,
                            command,
                            data1,
                            data2,
                        },
                    ));
                }
                _ => {}
            }
        }
    }

    raw.sort_by_key(|(tick, _)| *tick);
    control.sort_by_key(|e| e.tick);

    let events = EventList {
        ppqn,
        events: control,
    };
    let map = TempoMap::from_events(&events);
    let to_sample =
        |tick: u64| (map.seconds_at(tick) * f64::from(MIDI_SAMPLE_RATE)).round() as u64;

    let messages = raw
        .into_iter()
        .map(|(tick, msg)| TimedMessage {
            sample: to_sample(tick),
            ..msg
        })
        .collect();

    Ok(ParsedMidi {
        messages,
        events,
        end_sample: to_sample(last_tick),
    })
}

/// `(bank, patch)` pairs one soundfont defines.
type FontPresets = HashSet<(i32, i32)>;

/// Picks the soundfont that sounds each channel's notes.
///
/// Fonts are layered in list order: a channel plays through the first font defining its current
/// bank and program, or the first font when none does. Channel state messages reach every font.
#[derive(Clone, Debug)]
pub(crate) struct FontRoute {
    presets: Arc<[FontPresets]>,
    bank: [i32; MIDI_CHANNELS],
    program: [i32; MIDI_CHANNELS],
    font: [usize; MIDI_CHANNELS],
}

/// Where one channel message is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Delivery {
    AllFonts,
    Font(usize),
}

impl FontRoute {
    pub(crate) fn new(presets: Arc<[FontPresets]>) -> Self {
        let mut route = Self {
            presets,
            bank: [0; MIDI_CHANNELS],
            program: [0; MIDI_CHANNELS],
            font: [0; MIDI_CHANNELS],
        };
        for ch in 0..MIDI_CHANNELS {
            route.reselect(ch);
        }
        route
    }

    pub(crate) fn deliver(&mut self, msg: &TimedMessage) -> Delivery {
        let ch = usize::from(msg.channel) % MIDI_CHANNELS;
        match msg.command {
            NOTE_ON | POLY_AFTERTOUCH => return Delivery::Font(self.font[ch]),
            PROGRAM => {
                self.program[ch] = i32::from(msg.data1);
                self.reselect(ch);
            }
            CONTROLLER if msg.data1 == BANK_SELECT => {
                self.bank[ch] = i32::from(msg.data2);
                self.reselect(ch);
            }
            _ => {}
        }
        Delivery::AllFonts
    }

    fn reselect(&mut self, ch: usize) {
        let bank = if ch == PERCUSSION_CHANNEL {
            self.bank[ch] + PERCUSSION_BANK_OFFSET
        } else {
            self.bank[ch]
        };
        let key = (bank, self.program[ch]);
        self.font[ch] = self
            .presets
            .iter()
            .position(|p| p.contains(&key))
            .unwrap_or(0);
    }
}

/// One synthesizer per soundfont, summed into a single output.
struct LayeredSynth {
    synths: Vec<Synthesizer>,
    route: FontRoute,
    scratch_left: Vec<f32>,
    scratch_right: Vec<f32>,
}

impl LayeredSynth {
    fn process(&mut self, msg: &TimedMessage) {
        let args = (
            i32::from(msg.channel),
            i32::from(msg.command),
            i32::from(msg.data1),
            i32::from(msg.data2),
        );
        match self.route.deliver(msg) {
            Delivery::Font(i) => {
                if let Some(synth) = self.synths.get_mut(i) {
                    synth.process_midi_message(args.0, args.1, args.2, args.3);
                }
            }
            Delivery::AllFonts => {
                for synth in &mut self.synths {
                    synth.process_midi_message(args.0, args.1, args.2, args.3);
                }
            }
        }
    }

    fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let Some((first, rest)) = self.synths.split_first_mut() else {
            left.fill(0.0);
            right.fill(0.0);
            return;
        };
        first.render(left, right);
        if rest.is_empty() {
            return;
        }
        self.scratch_left.resize(left.len(), 0.0);
        self.scratch_right.resize(right.len(), 0.0);
        for synth in rest {
            synth.render(&mut self.scratch_left, &mut self.scratch_right);
            for (dst, src) in left.iter_mut().zip(&self.scratch_left) {
                *dst += src;
            }
            for (dst, src) in right.iter_mut().zip(&self.scratch_right) {
                *dst += src;
            }
        }
    }
}

/// Standard MIDI File rendered through a layered list of soundfonts.
///
/// Channel streams only sound their own notes; the mix sounds all of them. Both run until every
/// event has played and the synthesized tail has decayed to silence.
#[derive(Clone)]
pub struct MidiProvider {
    path: PathBuf,
    soundfonts: Arc<[Arc<SoundFont>]>,
    presets: Arc<[FontPresets]>,
    messages: Arc<[TimedMessage]>,
    events: EventList,
    end_sample: u64,
}

impl std::fmt::Debug for MidiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiProvider")
            .field("path", &self.path)
            .field("soundfonts", &self.soundfonts.len())
            .field("messages", &self.messages.len())
            .field("end_sample", &self.end_sample)
            .finish_non_exhaustive()
    }
}

impl MidiProvider {
    /// Parse `path` and load every soundfont, earlier ones taking precedence per preset.
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, soundfonts: &[PathBuf]) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            DecodeError::from_io(format!("Error opening file {}: ", path.display()), &e)
        })?;
        let parsed = parse_smf(&bytes)?;

        if soundfonts.is_empty() {
            return Err(DecodeError::new(
                "Error initializing soundfont: ",
                DecodeErrorKind::Include,
            ));
        }
        let fonts = soundfonts
            .iter()
            .map(|p| load_soundfont(p))
            .collect::<Result<Vec<_>, _>>()?;
        let presets: Vec<FontPresets> = fonts
            .iter()
            .map(|sf| {
                sf.get_presets()
                    .iter()
                    .map(|p| (p.get_bank_number(), p.get_patch_number()))
                    .collect()
            })
            .collect();

        tracing::debug!(
            soundfonts = fonts.len(),
            messages = parsed.messages.len(),
            control_events = parsed.events.events.len(),
            end_sample = parsed.end_sample,
            "parsed midi file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            soundfonts: Arc::from(fonts),
            presets: Arc::from(presets),
            messages: Arc::from(parsed.messages),
            events: parsed.events,
            end_sample: parsed.end_sample,
        })
    }

    fn open_stream(
        &self,
        note_channel: Option<u8>,
        stereo: bool,
    ) -> Result<Box<dyn SampleSource>, DecodeError> {
        let settings = SynthesizerSettings::new(MIDI_SAMPLE_RATE as i32);
        let synths = self
            .soundfonts
            .iter()
            .map(|sf| Synthesizer::new(sf, &settings))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| DecodeError::new("Error creating stream: ", DecodeErrorKind::Handle))?;
        Ok(Box::new(MidiSource {
            synth: LayeredSynth {
                synths,
                route: FontRoute::new(Arc::clone(&self.presets)),
                scratch_left: Vec::new(),
                scratch_right: Vec::new(),
            },
            messages: Arc::clone(&self.messages),
            next: 0,
            note_channel,
            stereo,
            pos: 0,
            end_sample: self.end_sample,
            tail_frames: 0,
            ended: false,
            left: Vec::new(),
            right: Vec::new(),
        }))
    }
}

fn load_soundfont(path: &Path) -> Result<Arc<SoundFont>, DecodeError> {
    const PREFIX: &str = "Error initializing soundfont: ";
    let file = File::open(path).map_err(|e| DecodeError::from_io(PREFIX, &e))?;
    let mut reader = BufReader::new(file);
    let sf = SoundFont::new(&mut reader)
        .map_err(|_| DecodeError::new(PREFIX, DecodeErrorKind::FileFormat))?;
    Ok(Arc::new(sf))
}

impl SourceProvider for MidiProvider {
    fn channel_count(&self) -> usize {
        MIDI_CHANNELS
    }

    fn open_channel(
        &self,
        channel: usize,
        stereo: bool,
    ) -> Result<Box<dyn SampleSource>, DecodeError> {
        let ch = u8::try_from(channel)
            .ok()
            .filter(|c| usize::from(*c) < MIDI_CHANNELS)
            .ok_or_else(|| {
                DecodeError::new(
                    format!("Error creating filter for channel {channel}: "),
                    DecodeErrorKind::Handle,
                )
            })?;
        self.open_stream(Some(ch), stereo)
    }

    fn open_mix(&self) -> Result<Box<dyn SampleSource>, DecodeError> {
        self.open_stream(None, true)
    }

    fn event_list(&self) -> EventList {
        self.events.clone()
    }
}

struct MidiSource {
    synth: LayeredSynth,
    messages: Arc<[TimedMessage]>,
    next: usize,
    note_channel: Option<u8>,
    stereo: bool,
    pos: u64,
    end_sample: u64,
    tail_frames: u64,
    ended: bool,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl MidiSource {
    fn dispatch_due(&mut self) {
        while let Some(msg) = self.messages.get(self.next) {
            if msg.sample > self.pos {
                break;
            }
            if msg.passes_filter(self.note_channel) {
                self.synth.process(msg);
            }
            self.next += 1;
        }
    }
}

impl SampleSource for MidiSource {
    fn sample_rate(&self) -> u32 {
        MIDI_SAMPLE_RATE
    }

    fn channels(&self) -> u16 {
        if self.stereo { 2 } else { 1 }
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<ReadOutcome, DecodeError> {
        if self.ended {
            return Ok(ReadOutcome::Ended);
        }
        let ch = usize::from(self.channels());
        let frames = buf.len() / ch;
        let mut produced = 0usize;

        while produced < frames && !self.ended {
            self.dispatch_due();

            let in_tail = self.next >= self.messages.len();
            let mut chunk = frames - produced;
            if let Some(msg) = self.messages.get(self.next) {
                chunk = chunk.min((msg.sample - self.pos) as usize);
            }

            self.left.resize(chunk, 0.0);
            self.right.resize(chunk, 0.0);
            self.synth.render(&mut self.left, &mut self.right);

            let out = &mut buf[produced * ch..(produced + chunk) * ch];
            if self.stereo {
                for (i, frame) in out.chunks_exact_mut(2).enumerate() {
                    frame[0] = self.left[i];
                    frame[1] = self.right[i];
                }
            } else {
                for (i, s) in out.iter_mut().enumerate() {
                    *s = (self.left[i] + self.right[i]) * 0.5;
                }
            }

            self.pos += chunk as u64;
            produced += chunk;

            if in_tail && self.pos >= self.end_sample {
                let peak = self
                    .left
                    .iter()
                    .chain(&self.right)
                    .fold(0.0f32, |m, s| m.max(s.abs()));
                self.tail_frames += chunk as u64;
                if peak < DECAY_THRESHOLD || self.tail_frames >= MAX_DECAY_TAIL_FRAMES {
                    self.ended = true;
                }
            }
        }

        if produced == 0 {
            return Ok(ReadOutcome::Ended);
        }
        Ok(ReadOutcome::Read(produced * ch))
    }

    fn total_samples(&self) -> Option<u64> {
        Some(self.end_sample * u64::from(self.channels()))
    }

    fn consumed_samples(&self) -> u64 {
        self.pos * u64::from(self.channels())
    }

    fn is_playing(&self) -> bool {
        !self.ended
    }
}
