use std::sync::Arc;

use crate::foundation::error::DecodeError;
use crate::source::{ReadOutcome, SampleSource, SourceProvider};

/// Interleaved PCM held in memory.
#[derive(Clone, Debug)]
pub struct MemorySource {
    sample_rate: u32,
    channels: u16,
    data: Arc<[f32]>,
    pos: usize,
}

impl MemorySource {
    /// `data` is interleaved; a trailing partial frame is ignored.
    pub fn new(sample_rate: u32, channels: u16, data: impl Into<Arc<[f32]>>) -> Self {
        let channels = channels.max(1);
        let mut data: Arc<[f32]> = data.into();
        let whole = data.len() - data.len() % usize::from(channels);
        if whole != data.len() {
            data = Arc::from(&data[..whole]);
        }
        Self {
            sample_rate,
            channels,
            data,
            pos: 0,
        }
    }

    pub fn silence(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self::new(
            sample_rate,
            channels,
            vec![0.0f32; frames * usize::from(channels.max(1))],
        )
    }

    /// Mono sine wave.
    pub fn sine(sample_rate: u32, freq_hz: f64, amplitude: f32, frames: usize) -> Self {
        Self::new(sample_rate, 1, sine_wave(sample_rate, freq_hz, amplitude, frames))
    }
}

impl SampleSource for MemorySource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn read(&mut self, buf: &mut [f32]) -> Result<ReadOutcome, DecodeError> {
        let ch = usize::from(self.channels);
        let remaining = self.data.len() - self.pos;
        if remaining == 0 {
            return Ok(ReadOutcome::Ended);
        }
        let n = remaining.min(buf.len() - buf.len() % ch);
        if n == 0 {
            return Ok(ReadOutcome::Read(0));
        }
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(ReadOutcome::Read(n))
    }

    fn total_samples(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    fn consumed_samples(&self) -> u64 {
        self.pos as u64
    }

    fn is_playing(&self) -> bool {
        self.pos < self.data.len()
    }
}

/// Provider over a fixed set of mono channel buffers.
///
/// The mix is a stereo stream whose left and right are the mean of all channels.
#[derive(Clone, Debug)]
pub struct MemoryProvider {
    sample_rate: u32,
    channels: Vec<Arc<[f32]>>,
}

impl MemoryProvider {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels: channels.into_iter().map(Arc::from).collect(),
        }
    }

    /// `count` channels of silence lasting `frames` sample frames each.
    pub fn silence(sample_rate: u32, count: usize, frames: usize) -> Self {
        Self::new(sample_rate, vec![vec![0.0; frames]; count])
    }
}

impl SourceProvider for MemoryProvider {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn open_channel(
        &self,
        channel: usize,
        _stereo: bool,
    ) -> Result<Box<dyn SampleSource>, DecodeError> {
        let data = self.channels.get(channel).ok_or_else(|| {
            DecodeError::new(
                format!("Error opening channel {channel}: "),
                crate::foundation::error::DecodeErrorKind::Handle,
            )
        })?;
        Ok(Box::new(MemorySource::new(
            self.sample_rate,
            1,
            Arc::clone(data),
        )))
    }

    fn open_mix(&self) -> Result<Box<dyn SampleSource>, DecodeError> {
        let frames = self.channels.iter().map(|c| c.len()).max().unwrap_or(0);
        let count = self.channels.len().max(1) as f32;
        let mut mix = vec![0.0f32; frames * 2];
        for ch in &self.channels {
            for (i, &s) in ch.iter().enumerate() {
                mix[i * 2] += s / count;
                mix[i * 2 + 1] += s / count;
            }
        }
        Ok(Box::new(MemorySource::new(self.sample_rate, 2, mix)))
    }
}

pub(crate) fn sine_wave(sample_rate: u32, freq_hz: f64, amplitude: f32, frames: usize) -> Vec<f32> {
    let step = std::f64::consts::TAU * freq_hz / f64::from(sample_rate.max(1));
    (0..frames)
        .map(|i| (step * i as f64).sin() as f32 * amplitude)
        .collect()
}
