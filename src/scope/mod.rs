//! Per-channel waveform stabilization.
//!
//! Each output frame, a [`Scope`] pulls one frame's worth of samples, shifts them into a lookback
//! buffer of `window_size + max_nudge` samples, and picks the offset ("nudge") into that buffer
//! whose display window best continues the previous frame.

use crate::foundation::error::{DecodeError, WavescopeError, WavescopeResult};
use crate::foundation::math::mean_abs_diff;
use crate::source::{ReadOutcome, SampleSource};

/// Validated construction.
pub mod builder;

pub use builder::ScopeBuilder;

/// Floor for the trigger threshold and the zero-upcrossing level.
const EPSILON: f64 = 0.005;

/// Fully validated scope parameters, all lengths in samples.
#[derive(Clone, Debug, PartialEq)]
pub struct ScopeParams {
    pub samples_per_frame: usize,
    /// Display window length.
    pub window_size: usize,
    /// Nudge search length; nudges fall in `[0, max_nudge]`.
    pub max_nudge: usize,
    /// Compared span centered in the display window; never longer than `window_size`.
    pub similarity_window: usize,
    /// Neighborhood explored around each base candidate; 0 disables expansion.
    pub drift_window: usize,
    pub stereo: bool,
    pub amplification: f64,
    /// Fraction of the peak amplitude a rising edge must cross.
    pub trigger_threshold: f64,
    pub similarity_bias: f64,
    /// Fraction of the peak amplitude that counts as a peak event.
    pub peak_threshold: f64,
    pub peak_bias: f64,
    pub avoid_drift_bias: f64,
}

impl ScopeParams {
    pub fn validate(&self) -> WavescopeResult<()> {
        if self.samples_per_frame == 0 {
            return Err(WavescopeError::config("samples_per_frame must be non-zero"));
        }
        if self.similarity_window > self.window_size {
            return Err(WavescopeError::config(format!(
                "similarity window ({}) exceeds display window ({})",
                self.similarity_window, self.window_size
            )));
        }
        let weights = [
            ("amplification", self.amplification),
            ("trigger_threshold", self.trigger_threshold),
            ("similarity_bias", self.similarity_bias),
            ("peak_threshold", self.peak_threshold),
            ("peak_bias", self.peak_bias),
            ("avoid_drift_bias", self.avoid_drift_bias),
        ];
        for (name, v) in weights {
            if !v.is_finite() {
                return Err(WavescopeError::config(format!("{name} must be finite")));
            }
        }
        Ok(())
    }

    pub fn internal_size(&self) -> usize {
        self.window_size + self.max_nudge
    }
}

/// A nudge the search may pick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NudgeCandidate {
    /// Offset into the internal buffer.
    pub offset: usize,
    /// Signed distance from the base candidate it was expanded from.
    pub distance: i64,
    pub precedes_peak: bool,
}

/// Outcome of [`find_best_nudge`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NudgeChoice {
    pub candidate: NudgeCandidate,
    pub error: f64,
}

/// Left-shift `src` into `dest`, as if `src` were padded with `T::default()` to `min_size`.
///
/// The oldest values drop off the front. When `src` is longer than `dest`, only its tail is
/// kept.
pub fn shift_in<T: Copy + Default>(dest: &mut [T], src: &[T], min_size: usize) {
    let size = min_size.max(src.len());
    let src = &src[src.len().saturating_sub(dest.len())..];
    let mut at = 0;
    if size < dest.len() {
        dest.copy_within(size.., 0);
        at = dest.len() - size;
    }
    dest[at..at + src.len()].copy_from_slice(src);
    dest[at + src.len()..].fill(T::default());
}

fn stereo_downmix(left: &[f32], right: &[f32]) -> Vec<f32> {
    left.iter().zip(right).map(|(l, r)| (l + r) * 0.5).collect()
}

#[derive(Clone, Copy, Debug)]
struct BaseNudge {
    offset: usize,
    precedes_peak: bool,
    peak_offset: usize,
}

/// Pick the nudge whose display window best continues `prev`.
///
/// `floats` is the mono internal buffer (`window_size + max_nudge` samples) and `prev` the
/// previous output window (`window_size` samples, already amplified). Returns `None` when no
/// rising edge crosses both trigger levels inside the search range.
pub fn find_best_nudge(params: &ScopeParams, floats: &[f32], prev: &[f32]) -> Option<NudgeChoice> {
    let candidates = nudge_candidates(params, floats);
    let sim_len = params.similarity_window;
    let sim_start = (params.window_size - sim_len) / 2;
    let prev_span = prev.get(sim_start..sim_start + sim_len)?;

    let mut best: Option<NudgeChoice> = None;
    for candidate in candidates {
        let start = candidate.offset + sim_start;
        let window = floats.get(start..start + sim_len)?;
        let similarity = mean_abs_diff(window, params.amplification, prev_span);
        let peak = if candidate.precedes_peak { 0.0 } else { 1.0 };
        let drift = if params.drift_window > 0 {
            candidate.distance.unsigned_abs() as f64 / params.drift_window as f64
        } else {
            0.0
        };
        let error = params.similarity_bias * similarity
            + params.peak_bias * peak
            + params.avoid_drift_bias * drift;

        if best.is_none_or(|b| error < b.error) {
            best = Some(NudgeChoice { candidate, error });
        }
    }
    best
}

/// Base candidates from the trigger scan, expanded by the drift window.
pub fn nudge_candidates(params: &ScopeParams, floats: &[f32]) -> Vec<NudgeCandidate> {
    let bases = base_nudges(params, floats);
    if params.drift_window == 0 {
        return bases
            .iter()
            .map(|b| NudgeCandidate {
                offset: b.offset,
                distance: 0,
                precedes_peak: b.precedes_peak,
            })
            .collect();
    }

    let last_offset = params.max_nudge.saturating_sub(1);
    let mut out = Vec::new();
    for (k, base) in bases.iter().enumerate() {
        let mut lo = base.offset.saturating_sub(params.drift_window);
        let mut hi = (base.offset + params.drift_window).min(last_offset);
        if k > 0 {
            lo = lo.max((bases[k - 1].offset + base.offset) / 2 + 1);
        }
        if let Some(next) = bases.get(k + 1) {
            hi = hi.min((base.offset + next.offset) / 2);
        }
        for offset in lo..=hi {
            out.push(NudgeCandidate {
                offset,
                distance: offset as i64 - base.offset as i64,
                precedes_peak: base.precedes_peak && offset <= base.peak_offset,
            });
        }
    }
    out
}

fn base_nudges(params: &ScopeParams, floats: &[f32]) -> Vec<BaseNudge> {
    let mid = params.window_size / 2;
    let Some(range) = floats.get(mid..mid + params.max_nudge) else {
        return Vec::new();
    };
    if range.is_empty() {
        return Vec::new();
    }

    // Signed maximum: negative-going peaks do not raise the thresholds.
    let peak = range.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let peak_threshold = peak * params.peak_threshold;
    let trigger = EPSILON.max(params.trigger_threshold * peak);

    let mut bases: Vec<BaseNudge> = Vec::new();
    let mut anchor = 0usize;
    let mut last = 0.0f64;
    let mut lower_cross = false;
    let mut upper_cross = false;

    for (offs, &f) in range.iter().enumerate() {
        let f = f64::from(f);

        if f < -trigger {
            lower_cross = false;
        } else if last < -trigger {
            lower_cross = true;
        }

        if f < trigger {
            upper_cross = false;
        } else if last < trigger {
            upper_cross = true;
        }

        if last < EPSILON && f >= EPSILON {
            anchor = offs;
        }

        if lower_cross && upper_cross {
            if bases.last().is_none_or(|b| b.offset != anchor) {
                bases.push(BaseNudge {
                    offset: anchor,
                    precedes_peak: false,
                    peak_offset: 0,
                });
            }
            lower_cross = false;
            upper_cross = false;
        }

        if f > peak_threshold
            && let Some(b) = bases.last_mut()
            && !b.precedes_peak
        {
            b.precedes_peak = true;
            b.peak_offset = offs;
        }

        last = f;
    }
    bases
}

/// Stabilized oscilloscope view over one decoded stream.
pub struct Scope {
    source: Box<dyn SampleSource>,
    params: ScopeParams,
    src_channels: usize,
    left_buffer: Vec<f32>,
    right_buffer: Vec<f32>,
    left_output: Vec<f32>,
    right_output: Vec<f32>,
    read_buf: Vec<f32>,
    new_left: Vec<f32>,
    new_right: Vec<f32>,
    total_samples_read: u64,
    frame_num: u64,
    nudge_amount: usize,
    nudge_change: i64,
    no_good_nudge: bool,
    precedes_peak: bool,
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("params", &self.params)
            .field("src_channels", &self.src_channels)
            .field("frame_num", &self.frame_num)
            .field("nudge_amount", &self.nudge_amount)
            .finish_non_exhaustive()
    }
}

impl Scope {
    pub fn new(params: ScopeParams, source: Box<dyn SampleSource>) -> WavescopeResult<Self> {
        params.validate()?;
        let src_channels = usize::from(source.channels().max(1));
        let internal = params.internal_size();
        let window = params.window_size;
        Ok(Self {
            read_buf: vec![0.0; params.samples_per_frame * src_channels],
            source,
            src_channels,
            left_buffer: vec![0.0; internal],
            right_buffer: vec![0.0; internal],
            left_output: vec![0.0; window],
            right_output: vec![0.0; window],
            new_left: Vec::new(),
            new_right: Vec::new(),
            total_samples_read: 0,
            frame_num: 0,
            nudge_amount: 0,
            nudge_change: 0,
            no_good_nudge: false,
            precedes_peak: false,
            params,
        })
    }

    /// Advance one output frame.
    pub fn next_wave_data(&mut self) -> Result<(), DecodeError> {
        self.update_buffers()?;

        let choice = if self.params.stereo {
            find_best_nudge(
                &self.params,
                &stereo_downmix(&self.left_buffer, &self.right_buffer),
                &stereo_downmix(&self.left_output, &self.right_output),
            )
        } else {
            find_best_nudge(&self.params, &self.left_buffer, &self.left_output)
        };

        self.no_good_nudge = choice.is_none();
        self.precedes_peak = choice.is_some_and(|c| c.candidate.precedes_peak);
        let nudge = choice.map_or(0, |c| c.candidate.offset);
        self.nudge_change = nudge as i64 - self.nudge_amount as i64;
        self.nudge_amount = nudge;

        let amp = self.params.amplification;
        let window = self.params.window_size;
        apply_window(&mut self.left_output, &self.left_buffer[nudge..nudge + window], amp);
        if self.params.stereo {
            apply_window(
                &mut self.right_output,
                &self.right_buffer[nudge..nudge + window],
                amp,
            );
        }
        Ok(())
    }

    fn update_buffers(&mut self) -> Result<(), DecodeError> {
        let spf = self.params.samples_per_frame;
        let n = match self.source.read(&mut self.read_buf)? {
            ReadOutcome::Read(n) => n,
            ReadOutcome::Ended => {
                shift_in(&mut self.left_buffer, &[], spf);
                shift_in(&mut self.right_buffer, &[], spf);
                return Ok(());
            }
        };

        self.frame_num += 1;
        self.total_samples_read += n as u64;
        let ch = self.src_channels;
        let frames = n / ch;
        let data = &self.read_buf[..frames * ch];

        self.new_left.clear();
        self.new_right.clear();
        match (self.params.stereo, ch) {
            (true, 1) => {
                self.new_left.extend_from_slice(data);
                self.new_right.extend_from_slice(data);
            }
            (true, _) => {
                for frame in data.chunks_exact(ch) {
                    self.new_left.push(frame[0]);
                    self.new_right.push(frame[1]);
                }
            }
            (false, 1) => self.new_left.extend_from_slice(data),
            (false, _) => {
                self.new_left
                    .extend(data.chunks_exact(ch).map(|f| (f[0] + f[1]) * 0.5));
            }
        }

        shift_in(&mut self.left_buffer, &self.new_left, spf);
        if self.params.stereo {
            shift_in(&mut self.right_buffer, &self.new_right, spf);
        }
        Ok(())
    }

    pub fn params(&self) -> &ScopeParams {
        &self.params
    }

    /// Current display window (left ear, or mono).
    pub fn left_samples(&self) -> &[f32] {
        &self.left_output
    }

    /// Current right-ear display window; all zeros for mono scopes.
    pub fn right_samples(&self) -> &[f32] {
        &self.right_output
    }

    pub fn nudge_amount(&self) -> usize {
        self.nudge_amount
    }

    pub fn nudge_change(&self) -> i64 {
        self.nudge_change
    }

    /// `true` when the last frame found no trigger candidate and fell back to offset 0.
    pub fn no_good_nudge(&self) -> bool {
        self.no_good_nudge
    }

    /// Whether the last chosen nudge precedes a peak event.
    pub fn precedes_peak(&self) -> bool {
        self.precedes_peak
    }

    pub fn sample_rate(&self) -> u32 {
        self.source.sample_rate()
    }

    /// Source values consumed so far (interleaved).
    pub fn consumed_samples(&self) -> u64 {
        self.total_samples_read
    }

    pub fn total_samples(&self) -> Option<u64> {
        self.source.total_samples()
    }

    /// Consumed fraction in `[0, 1]`; 0 when the total is unknown.
    pub fn progress(&self) -> f64 {
        match self.total_samples() {
            Some(total) if total > 0 => (self.total_samples_read as f64 / total as f64).min(1.0),
            _ => 0.0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.source.is_playing()
    }
}

fn apply_window(out: &mut [f32], src: &[f32], amp: f64) {
    for (o, &s) in out.iter_mut().zip(src) {
        *o = (f64::from(s) * amp) as f32;
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scope/scope.rs"]
mod tests;
