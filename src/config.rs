//! JSON-facing render configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::core::{Canvas, Rgba8};
use crate::foundation::error::{WavescopeError, WavescopeResult};
use crate::scope::ScopeBuilder;

/// How channels fill the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    /// `num_rows_or_cols` is the column count; channels fill rows left to right.
    #[default]
    RowMajor,
    /// `num_rows_or_cols` is the row count; channels fill columns top to bottom.
    ColumnMajor,
}

/// Output video codec.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    #[default]
    H264,
    H265,
}

impl VideoCodec {
    /// ffmpeg encoder name.
    pub fn encoder_name(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::H264 => "h264",
            Self::H265 => "h265",
        })
    }
}

impl std::str::FromStr for VideoCodec {
    type Err = WavescopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h264" => Ok(Self::H264),
            "h265" => Ok(Self::H265),
            other => Err(WavescopeError::config(format!("unknown video codec '{other}'"))),
        }
    }
}

/// x264/x265 speed preset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum H26xPreset {
    Ultrafast,
    Superfast,
    Veryfast,
    Faster,
    Fast,
    #[default]
    Medium,
    Slow,
    Slower,
    Veryslow,
    Placebo,
}

impl H26xPreset {
    pub const ALL: [Self; 10] = [
        Self::Ultrafast,
        Self::Superfast,
        Self::Veryfast,
        Self::Faster,
        Self::Fast,
        Self::Medium,
        Self::Slow,
        Self::Slower,
        Self::Veryslow,
        Self::Placebo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ultrafast => "ultrafast",
            Self::Superfast => "superfast",
            Self::Veryfast => "veryfast",
            Self::Faster => "faster",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
            Self::Slower => "slower",
            Self::Veryslow => "veryslow",
            Self::Placebo => "placebo",
        }
    }
}

impl std::fmt::Display for H26xPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for H26xPreset {
    type Err = WavescopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| WavescopeError::config(format!("unknown h26x preset '{s}'")))
    }
}

/// Settings shared by every channel of a render.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub width: u32,
    pub height: u32,
    pub num_rows_or_cols: u32,
    pub order: ChannelOrder,
    pub fps: u32,
    /// Linear gain applied to the output audio track.
    pub volume: f64,
    pub codec: VideoCodec,
    pub preset: H26xPreset,
    pub crf: u32,
    pub audio_bitrate_kbps: u32,
    pub border_color: Rgba8,
    /// Border line thickness in pixels; 0 disables borders.
    pub border_thickness: f64,
    pub background_color: Rgba8,
    /// Worker threads for per-channel painting; rayon's default when absent.
    pub render_threads: Option<usize>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            num_rows_or_cols: 1,
            order: ChannelOrder::RowMajor,
            fps: 30,
            volume: 1.0,
            codec: VideoCodec::H264,
            preset: H26xPreset::Medium,
            crf: 18,
            audio_bitrate_kbps: 384,
            border_color: Rgba8::WHITE,
            border_thickness: 2.0,
            background_color: Rgba8::BLACK,
            render_threads: None,
        }
    }
}

impl GlobalConfig {
    pub fn validate(&self) -> WavescopeResult<()> {
        Canvas::new(self.width, self.height)?;
        if self.fps == 0 {
            return Err(WavescopeError::config("fps must be non-zero"));
        }
        if self.num_rows_or_cols == 0 {
            return Err(WavescopeError::config("num_rows_or_cols must be non-zero"));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(WavescopeError::config("volume cannot be negative"));
        }
        if !self.border_thickness.is_finite() || self.border_thickness < 0.0 {
            return Err(WavescopeError::config("border_thickness cannot be negative"));
        }
        if self.render_threads == Some(0) {
            return Err(WavescopeError::config("render_threads must be >= 1 when set"));
        }
        Ok(())
    }

    pub fn canvas(&self) -> WavescopeResult<Canvas> {
        Canvas::new(self.width, self.height)
    }
}

/// Per-channel scope and style settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Logical source channel (0-based; MIDI channel 9 is the drum channel).
    pub channel_number: usize,
    pub stereo: bool,
    pub amplification: f64,
    pub display_window_ms: f64,
    pub max_nudge_ms: f64,
    pub trigger_threshold: f64,
    pub similarity_window_ms: f64,
    pub similarity_bias: f64,
    pub peak_threshold: f64,
    pub peak_bias: f64,
    pub drift_window_ms: f64,
    pub avoid_drift_bias: f64,

    pub color: Rgba8,
    pub thickness: f64,
    pub midline_color: Rgba8,
    pub midline_thickness: f64,
    pub draw_h_midline: bool,
    pub draw_v_midline: bool,
    pub draw_labels: bool,
    /// `%i` instrument, `%n` 1-based channel number, `%%` literal percent.
    pub label_template: String,
    pub label_size: f32,
    pub label_color: Rgba8,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_number: 0,
            stereo: false,
            amplification: 1.0,
            display_window_ms: 40.0,
            max_nudge_ms: 40.0,
            trigger_threshold: 0.1,
            similarity_window_ms: 40.0,
            similarity_bias: 1.0,
            peak_threshold: 0.9,
            peak_bias: 0.5,
            drift_window_ms: 0.0,
            avoid_drift_bias: 1.0,
            color: Rgba8::WHITE,
            thickness: 2.0,
            midline_color: Rgba8::rgb(0x60, 0x60, 0x60),
            midline_thickness: 1.0,
            draw_h_midline: true,
            draw_v_midline: false,
            draw_labels: true,
            label_template: "%i".to_owned(),
            label_size: 16.0,
            label_color: Rgba8::WHITE,
        }
    }
}

impl ChannelConfig {
    pub fn for_channel(channel_number: usize) -> Self {
        Self {
            channel_number,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> WavescopeResult<()> {
        let lengths = [
            ("display_window_ms", self.display_window_ms),
            ("max_nudge_ms", self.max_nudge_ms),
            ("similarity_window_ms", self.similarity_window_ms),
            ("drift_window_ms", self.drift_window_ms),
            ("thickness", self.thickness),
            ("midline_thickness", self.midline_thickness),
        ];
        for (name, v) in lengths {
            if !v.is_finite() || v < 0.0 {
                return Err(WavescopeError::config(format!(
                    "channel {}: {name} cannot be negative",
                    self.channel_number
                )));
            }
        }
        if !self.label_size.is_finite() || self.label_size <= 0.0 {
            return Err(WavescopeError::config(format!(
                "channel {}: label_size must be positive",
                self.channel_number
            )));
        }
        Ok(())
    }

    /// Builder carrying this channel's scope settings.
    pub fn scope_builder(&self, fps: u32, soundfonts: &[PathBuf]) -> WavescopeResult<ScopeBuilder> {
        Ok(ScopeBuilder::new()
            .frame_rate(fps)?
            .stereo(self.stereo)
            .amplification(self.amplification)
            .trigger_threshold(self.trigger_threshold)
            .display_window_ms(self.display_window_ms)?
            .max_nudge_ms(self.max_nudge_ms)?
            .similarity_window_ms(self.similarity_window_ms)?
            .similarity_bias(self.similarity_bias)
            .peak_threshold(self.peak_threshold)
            .peak_bias(self.peak_bias)
            .drift_window_ms(self.drift_window_ms)?
            .avoid_drift_bias(self.avoid_drift_bias)
            .soundfonts(soundfonts.to_vec()))
    }
}

/// One complete render request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    /// MIDI or WAV input file.
    pub input: PathBuf,
    #[serde(default)]
    pub soundfonts: Vec<PathBuf>,
    pub output: PathBuf,
    /// Explicit encoder executable; `ffmpeg` from `PATH` when absent.
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
    /// TrueType/OpenType font for channel labels; labels are skipped without one.
    #[serde(default)]
    pub label_font: Option<PathBuf>,
    #[serde(default)]
    pub global: GlobalConfig,
    pub channels: Vec<ChannelConfig>,
}

impl RenderJob {
    pub fn from_reader<R: std::io::Read>(r: R) -> WavescopeResult<Self> {
        let job: Self = serde_json::from_reader(r)
            .map_err(|e| WavescopeError::config(format!("parse render job JSON: {e}")))?;
        job.validate()?;
        Ok(job)
    }

    pub fn from_path(path: impl AsRef<Path>) -> WavescopeResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            WavescopeError::config(format!("open render job '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn validate(&self) -> WavescopeResult<()> {
        self.global.validate()?;
        if self.channels.is_empty() {
            return Err(WavescopeError::config("render job has no channels"));
        }
        for ch in &self.channels {
            ch.validate()?;
        }
        Ok(())
    }

    /// Whether the input is rendered through the MIDI synthesizer.
    pub fn is_midi_input(&self) -> bool {
        crate::source::is_midi_path(&self.input)
    }
}
