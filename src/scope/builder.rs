use std::path::{Path, PathBuf};

use crate::foundation::core::{ms_to_samples, samples_per_frame};
use crate::foundation::error::{WavescopeError, WavescopeResult};
use crate::scope::{Scope, ScopeParams};
use crate::source::{MidiProvider, SampleSource, SourceProvider, WavProvider};

/// Fluent, validating constructor for [`Scope`].
///
/// Millisecond and count setters reject negative or non-finite values immediately. Lengths are
/// converted to samples at build time using the opened stream's native sample rate.
#[derive(Clone, Debug)]
pub struct ScopeBuilder {
    frame_rate: u32,
    stereo: bool,
    trigger_threshold: f64,
    amplification: f64,
    max_nudge_ms: f64,
    display_window_ms: f64,
    similarity_window_ms: f64,
    similarity_bias: f64,
    peak_threshold: f64,
    peak_bias: f64,
    drift_window_ms: f64,
    avoid_drift_bias: f64,
    soundfonts: Vec<PathBuf>,
}

impl Default for ScopeBuilder {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            stereo: false,
            trigger_threshold: 0.1,
            amplification: 1.0,
            max_nudge_ms: 40.0,
            display_window_ms: 40.0,
            similarity_window_ms: 40.0,
            similarity_bias: 1.0,
            peak_threshold: 0.9,
            peak_bias: 0.5,
            drift_window_ms: 0.0,
            avoid_drift_bias: 1.0,
            soundfonts: Vec::new(),
        }
    }
}

fn non_negative(name: &str, v: f64) -> WavescopeResult<f64> {
    if !v.is_finite() || v < 0.0 {
        return Err(WavescopeError::config(format!(
            "{name} cannot be negative (got {v})"
        )));
    }
    Ok(v)
}

impl ScopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_rate(mut self, fps: u32) -> WavescopeResult<Self> {
        if fps == 0 {
            return Err(WavescopeError::config("frame_rate must be positive"));
        }
        self.frame_rate = fps;
        Ok(self)
    }

    pub fn stereo(mut self, stereo: bool) -> Self {
        self.stereo = stereo;
        self
    }

    pub fn trigger_threshold(mut self, threshold: f64) -> Self {
        self.trigger_threshold = threshold;
        self
    }

    pub fn amplification(mut self, amplification: f64) -> Self {
        self.amplification = amplification;
        self
    }

    pub fn max_nudge_ms(mut self, ms: f64) -> WavescopeResult<Self> {
        self.max_nudge_ms = non_negative("max_nudge_ms", ms)?;
        Ok(self)
    }

    pub fn display_window_ms(mut self, ms: f64) -> WavescopeResult<Self> {
        self.display_window_ms = non_negative("display_window_ms", ms)?;
        Ok(self)
    }

    pub fn similarity_window_ms(mut self, ms: f64) -> WavescopeResult<Self> {
        self.similarity_window_ms = non_negative("similarity_window_ms", ms)?;
        Ok(self)
    }

    pub fn similarity_bias(mut self, weight: f64) -> Self {
        self.similarity_bias = weight;
        self
    }

    pub fn peak_threshold(mut self, factor: f64) -> Self {
        self.peak_threshold = factor;
        self
    }

    pub fn peak_bias(mut self, weight: f64) -> Self {
        self.peak_bias = weight;
        self
    }

    pub fn drift_window_ms(mut self, ms: f64) -> WavescopeResult<Self> {
        self.drift_window_ms = non_negative("drift_window_ms", ms)?;
        Ok(self)
    }

    pub fn avoid_drift_bias(mut self, weight: f64) -> Self {
        self.avoid_drift_bias = weight;
        self
    }

    /// Soundfonts used by [`ScopeBuilder::build_from_midi_channel`].
    pub fn soundfonts(mut self, soundfonts: Vec<PathBuf>) -> Self {
        self.soundfonts = soundfonts;
        self
    }

    /// Scope over one logical channel of `provider`.
    pub fn build_from_channel(
        &self,
        provider: &dyn SourceProvider,
        channel: usize,
    ) -> WavescopeResult<Scope> {
        let source = provider.open_channel(channel, self.stereo)?;
        self.build_from_source(source)
    }

    /// Scope over one MIDI channel of a Standard MIDI File, synthesized with the configured
    /// soundfonts.
    pub fn build_from_midi_channel(
        &self,
        path: impl AsRef<Path>,
        channel: usize,
    ) -> WavescopeResult<Scope> {
        let provider = MidiProvider::open(path, &self.soundfonts)?;
        self.build_from_channel(&provider, channel)
    }

    /// Scope over a whole audio file (every channel mixed).
    pub fn build_from_file(&self, path: impl AsRef<Path>) -> WavescopeResult<Scope> {
        let provider = WavProvider::open(path)?;
        self.build_from_source(provider.open_mix()?)
    }

    /// Shared conversion path: millisecond settings to samples at the source's rate.
    #[tracing::instrument(skip_all, fields(sample_rate = source.sample_rate()))]
    pub fn build_from_source(&self, source: Box<dyn SampleSource>) -> WavescopeResult<Scope> {
        let params = self.params_for(source.sample_rate())?;
        tracing::debug!(
            window = params.window_size,
            max_nudge = params.max_nudge,
            similarity = params.similarity_window,
            drift = params.drift_window,
            "scope params"
        );
        Scope::new(params, source)
    }

    /// Sample-domain parameters for a stream at `sample_rate`.
    pub fn params_for(&self, sample_rate: u32) -> WavescopeResult<ScopeParams> {
        let window_size = ms_to_samples(self.display_window_ms, sample_rate);
        let params = ScopeParams {
            samples_per_frame: samples_per_frame(sample_rate, self.frame_rate)?,
            window_size,
            max_nudge: ms_to_samples(self.max_nudge_ms, sample_rate),
            similarity_window: ms_to_samples(self.similarity_window_ms, sample_rate)
                .min(window_size),
            drift_window: ms_to_samples(self.drift_window_ms, sample_rate),
            stereo: self.stereo,
            amplification: self.amplification,
            trigger_threshold: self.trigger_threshold,
            similarity_bias: self.similarity_bias,
            peak_threshold: self.peak_threshold,
            peak_bias: self.peak_bias,
            avoid_drift_bias: self.avoid_drift_bias,
        };
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scope/builder.rs"]
mod tests;
