use std::ffi::OsString;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::config::{GlobalConfig, H26xPreset, VideoCodec};
use crate::foundation::core::Rgba8;
use crate::foundation::error::{SubprocessError, WavescopeError, WavescopeResult};
use crate::foundation::math::mul_div255_u16;
use crate::render::FrameRGBA;

/// Everything the encoder needs to read both raw streams and write the output file.
#[derive(Clone, Debug, PartialEq)]
pub struct EncoderArgs {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub video_input: String,
    pub sample_rate: u32,
    pub audio_channels: u16,
    pub audio_input: String,
    pub codec: VideoCodec,
    pub crf: u32,
    pub preset: H26xPreset,
    pub audio_bitrate_kbps: u32,
    pub volume: f64,
    pub output: PathBuf,
}

impl EncoderArgs {
    pub fn new(
        global: &GlobalConfig,
        video_input: impl Into<String>,
        audio_input: impl Into<String>,
        sample_rate: u32,
        audio_channels: u16,
        output: impl Into<PathBuf>,
    ) -> Self {
        Self {
            width: global.width,
            height: global.height,
            fps: global.fps,
            video_input: video_input.into(),
            sample_rate,
            audio_channels,
            audio_input: audio_input.into(),
            codec: global.codec,
            crf: global.crf,
            preset: global.preset,
            audio_bitrate_kbps: global.audio_bitrate_kbps,
            volume: global.volume,
            output: output.into(),
        }
    }

    /// ffmpeg command line, without the program name.
    pub fn to_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "-y".to_owned(),
            "-loglevel".to_owned(),
            "error".to_owned(),
            // raw video input
            "-f".to_owned(),
            "rawvideo".to_owned(),
            "-pixel_format".to_owned(),
            "rgba".to_owned(),
            "-framerate".to_owned(),
            self.fps.to_string(),
            "-video_size".to_owned(),
            format!("{}x{}", self.width, self.height),
            "-i".to_owned(),
            self.video_input.clone(),
            // raw audio input
            "-f".to_owned(),
            "f32le".to_owned(),
            "-sample_rate".to_owned(),
            self.sample_rate.to_string(),
            "-ac".to_owned(),
            self.audio_channels.to_string(),
            "-i".to_owned(),
            self.audio_input.clone(),
            // output video
            "-c:v".to_owned(),
            self.codec.encoder_name().to_owned(),
            "-crf".to_owned(),
            self.crf.to_string(),
            "-preset".to_owned(),
            self.preset.to_string(),
            "-filter:v".to_owned(),
            "format=yuv420p".to_owned(),
            // output audio
            "-c:a".to_owned(),
            "aac".to_owned(),
            "-b:a".to_owned(),
            format!("{}k", self.audio_bitrate_kbps),
            "-filter:a".to_owned(),
            format!("volume={}", self.volume),
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push(self.output.clone().into_os_string());
        args
    }
}

/// A running encoder process.
pub trait EncoderProcess: Send {
    /// Ask the encoder to finish up and exit.
    fn terminate(&mut self);

    fn kill(&mut self);

    /// Exit code once exited; `Some(None)` when it was ended by a signal.
    fn try_wait(&mut self) -> std::io::Result<Option<Option<i32>>>;

    fn wait(&mut self) -> std::io::Result<Option<i32>>;
}

/// Starts encoder processes. `program` is an explicit executable path, if configured.
pub trait EncoderLauncher: Send + Sync {
    fn launch(
        &self,
        program: Option<&Path>,
        args: &EncoderArgs,
    ) -> Result<Box<dyn EncoderProcess>, SubprocessError>;
}

/// Launches the system `ffmpeg` (or a configured executable).
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegLauncher;

impl EncoderLauncher for FfmpegLauncher {
    fn launch(
        &self,
        program: Option<&Path>,
        args: &EncoderArgs,
    ) -> Result<Box<dyn EncoderProcess>, SubprocessError> {
        let failed = || SubprocessError::FailedToStart {
            custom_path: program.map(Path::to_path_buf),
        };

        let mut cmd = Command::new(program.unwrap_or(Path::new("ffmpeg")));
        cmd.args(args.to_args())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        tracing::info!(command = ?cmd, "starting encoder");

        let mut child = cmd.spawn().map_err(|e| {
            tracing::warn!(error = %e, "failed to spawn encoder");
            failed()
        })?;

        let stdin = child.stdin.take();
        let stderr_drain = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut stderr_bytes = Vec::new();
                stderr.read_to_end(&mut stderr_bytes)?;
                Ok(stderr_bytes)
            })
        });

        Ok(Box::new(FfmpegProcess {
            child,
            stdin,
            stderr_drain,
        }))
    }
}

struct FfmpegProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_drain: Option<std::thread::JoinHandle<std::io::Result<Vec<u8>>>>,
}

impl FfmpegProcess {
    fn on_exit(&mut self, code: Option<i32>) {
        drop(self.stdin.take());
        let Some(handle) = self.stderr_drain.take() else {
            return;
        };
        let stderr = match handle.join() {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "encoder stderr read failed");
                return;
            }
            Err(_) => {
                tracing::warn!("encoder stderr drain thread panicked");
                return;
            }
        };
        let stderr = String::from_utf8_lossy(&stderr);
        let stderr = stderr.trim();
        if code != Some(0) && !stderr.is_empty() {
            tracing::warn!(?code, stderr, "encoder exited abnormally");
        } else {
            tracing::debug!(?code, "encoder exited");
        }
    }
}

impl EncoderProcess for FfmpegProcess {
    fn terminate(&mut self) {
        // ffmpeg finalizes the container and exits on `q`
        if let Some(mut stdin) = self.stdin.take()
            && let Err(e) = stdin.write_all(b"q").and_then(|()| stdin.flush())
        {
            tracing::debug!(error = %e, "could not send quit to encoder");
        }
    }

    fn kill(&mut self) {
        if let Err(e) = self.child.kill() {
            tracing::debug!(error = %e, "encoder kill failed");
        }
    }

    fn try_wait(&mut self) -> std::io::Result<Option<Option<i32>>> {
        let Some(status) = self.child.try_wait()? else {
            return Ok(None);
        };
        self.on_exit(status.code());
        Ok(Some(status.code()))
    }

    fn wait(&mut self) -> std::io::Result<Option<i32>> {
        drop(self.stdin.take());
        let status = self.child.wait()?;
        self.on_exit(status.code());
        Ok(status.code())
    }
}

/// Write `frame` as opaque RGBA8 into `dst`, compositing any transparency over `bg`.
pub fn write_opaque_rgba8(frame: &FrameRGBA, bg: Rgba8, dst: &mut Vec<u8>) -> WavescopeResult<()> {
    if !frame.premultiplied {
        return Err(WavescopeError::validation(
            "encoder input frames must be premultiplied",
        ));
    }
    dst.resize(frame.data.len(), 0);
    flatten_premul_over_bg_to_opaque_rgba8(dst, &frame.data, [bg.r, bg.g, bg.b, 255])
}

fn flatten_premul_over_bg_to_opaque_rgba8(
    dst: &mut [u8],
    src_premul: &[u8],
    bg_rgba: [u8; 4],
) -> WavescopeResult<()> {
    if dst.len() != src_premul.len() || !dst.len().is_multiple_of(4) {
        return Err(WavescopeError::validation(
            "flatten_premul_over_bg_to_opaque_rgba8 expects equal-length rgba8 buffers",
        ));
    }

    let bg_r = u16::from(bg_rgba[0]);
    let bg_g = u16::from(bg_rgba[1]);
    let bg_b = u16::from(bg_rgba[2]);

    for (d, s) in dst.chunks_exact_mut(4).zip(src_premul.chunks_exact(4)) {
        let a = u16::from(s[3]);
        if a == 255 {
            d.copy_from_slice(s);
            continue;
        }

        let inv = 255u16 - a;
        d[0] = (u16::from(s[0]) + mul_div255_u16(bg_r, inv)).min(255) as u8;
        d[1] = (u16::from(s[1]) + mul_div255_u16(bg_g, inv)).min(255) as u8;
        d[2] = (u16::from(s[2]) + mul_div255_u16(bg_b, inv)).min(255) as u8;
        d[3] = 255;
    }

    Ok(())
}

/// Ensure the parent directory of `path` exists.
pub fn ensure_parent_dir(path: &Path) -> WavescopeResult<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        use anyhow::Context as _;
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory '{}'", parent.display()))?;
    }
    Ok(())
}

/// Return `true` when `ffmpeg` can be invoked from `PATH`.
pub fn is_ffmpeg_on_path() -> bool {
    Command::new("ffmpeg")
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "../../tests/unit/encode/ffmpeg.rs"]
mod tests;
