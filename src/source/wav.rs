use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::foundation::error::{DecodeError, DecodeErrorKind};
use crate::source::{MemorySource, SampleSource, SourceProvider};

/// Provider over a decoded WAV file; each file channel is one logical channel.
///
/// Mono requests get that single channel. Stereo requests get the pair starting at the requested
/// channel, or the single channel when it is the file's last one.
#[derive(Clone, Debug)]
pub struct WavProvider {
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
    interleaved: Arc<[f32]>,
}

impl WavProvider {
    #[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DecodeError> {
        let path = path.as_ref();
        let prefix = format!("Error opening file {}: ", path.display());
        let mut reader = hound::WavReader::open(path).map_err(|e| map_hound(&prefix, e))?;
        let spec = reader.spec();
        if spec.channels == 0 {
            return Err(DecodeError::new(prefix, DecodeErrorKind::FileFormat));
        }

        let samples: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| map_hound(&prefix, e))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| map_hound(&prefix, e))?
            }
        };

        tracing::debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            values = samples.len(),
            "decoded wav"
        );

        Ok(Self {
            path: path.to_path_buf(),
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            interleaved: Arc::from(samples),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SourceProvider for WavProvider {
    fn channel_count(&self) -> usize {
        usize::from(self.channels)
    }

    fn open_channel(
        &self,
        channel: usize,
        stereo: bool,
    ) -> Result<Box<dyn SampleSource>, DecodeError> {
        let ch = usize::from(self.channels);
        if channel >= ch {
            return Err(DecodeError::new(
                format!("Error opening channel {channel}: "),
                DecodeErrorKind::Handle,
            ));
        }
        let width = if stereo && channel + 1 < ch { 2 } else { 1 };
        let selected: Vec<f32> = self
            .interleaved
            .chunks_exact(ch)
            .flat_map(|frame| &frame[channel..channel + width])
            .copied()
            .collect();
        Ok(Box::new(MemorySource::new(
            self.sample_rate,
            width as u16,
            selected,
        )))
    }

    fn open_mix(&self) -> Result<Box<dyn SampleSource>, DecodeError> {
        Ok(Box::new(MemorySource::new(
            self.sample_rate,
            self.channels,
            Arc::clone(&self.interleaved),
        )))
    }
}

fn map_hound(prefix: &str, err: hound::Error) -> DecodeError {
    match err {
        hound::Error::IoError(e) => DecodeError::from_io(prefix, &e),
        _ => DecodeError::new(prefix, DecodeErrorKind::FileFormat),
    }
}
