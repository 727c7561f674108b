//! External encoder subprocess: command line, process handle and frame flattening.

pub mod ffmpeg;

pub use ffmpeg::{
    EncoderArgs, EncoderLauncher, EncoderProcess, FfmpegLauncher, ensure_parent_dir,
    is_ffmpeg_on_path, write_opaque_rgba8,
};
