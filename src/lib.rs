//! Wavescope renders multi-channel oscilloscope videos.
//!
//! Every channel of a MIDI file (synthesized through a soundfont) or a WAV file gets its own
//! stabilized waveform cell in a grid. A render session streams raw frames and PCM audio over
//! two local sockets into an `ffmpeg` subprocess:
//!
//! - Describe the render with a [`RenderJob`]
//! - Start it on a [`RenderWorker`] and wait for its [`SessionOutcome`]
//! - Or paint a static layout check with [`PreviewRenderer`]
#![forbid(unsafe_code)]

mod foundation;

/// Render job and per-channel settings.
pub mod config;
/// External encoder subprocess.
pub mod encode;
/// Source control events mapped onto video frames.
pub mod events;
/// Grid layout and frame painting.
pub mod render;
/// Per-channel waveform stabilization.
pub mod scope;
/// Decoded sample streams and control events from input files.
pub mod source;
/// Render session workers.
pub mod worker;

pub use crate::foundation::core::{
    BezPath, Canvas, FrameIndex, Point, Rect, Rgba8, ms_to_samples, samples_per_frame,
};
pub use crate::foundation::error::{
    DecodeError, DecodeErrorKind, SubprocessError, WavescopeError, WavescopeResult,
};

pub use crate::config::{
    ChannelConfig, ChannelOrder, GlobalConfig, H26xPreset, RenderJob, VideoCodec,
};
pub use crate::encode::{EncoderArgs, EncoderLauncher, EncoderProcess, FfmpegLauncher};
pub use crate::events::{EventTracker, TempoMap};
pub use crate::render::{
    BaseRenderer, FrameRGBA, GridLayout, LabelTypesetter, PreviewRenderer, ScopeRenderer,
};
pub use crate::scope::{Scope, ScopeBuilder};
pub use crate::source::{SampleSource, SourceProvider};
pub use crate::worker::{RenderWorker, SessionOutcome, WorkerSessionState};
