use std::path::PathBuf;

/// Crate-wide result alias.
pub type WavescopeResult<T> = Result<T, WavescopeError>;

/// Top-level error taxonomy.
///
/// Every failure in a render session is terminal for that session; nothing here is retried.
#[derive(thiserror::Error, Debug)]
pub enum WavescopeError {
    /// A sample source could not be opened, parsed, or read.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An invalid configuration or builder parameter.
    #[error("config error: {0}")]
    Config(String),

    /// Endpoint or stream write failure.
    #[error("io error: {0}")]
    Io(String),

    /// The external encoder failed to start or exited abnormally.
    #[error("{0}")]
    Subprocess(#[from] SubprocessError),

    /// Buffer or shape mismatch at an API boundary.
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WavescopeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Humanized cause of a [`DecodeError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    FileOpen,
    FileFormat,
    Memory,
    Handle,
    Include,
    Code(i32),
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileOpen => f.write_str("could not open file"),
            Self::FileFormat => f.write_str("unsupported file format"),
            Self::Memory => f.write_str("insufficient memory"),
            Self::Handle => f.write_str("invalid handle"),
            Self::Include => f.write_str("soundfont include file could not be opened"),
            Self::Code(code) => write!(f, "error code {code}"),
        }
    }
}

/// Source failure with a causal prefix, e.g. `"Error opening file song.mid: could not open file"`.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{prefix}{kind}")]
pub struct DecodeError {
    pub prefix: String,
    pub kind: DecodeErrorKind,
}

impl DecodeError {
    pub fn new(prefix: impl Into<String>, kind: DecodeErrorKind) -> Self {
        Self {
            prefix: prefix.into(),
            kind,
        }
    }

    /// Map an I/O failure onto the closest humanized kind.
    pub fn from_io(prefix: impl Into<String>, err: &std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                DecodeErrorKind::FileOpen
            }
            std::io::ErrorKind::OutOfMemory => DecodeErrorKind::Memory,
            std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => {
                DecodeErrorKind::FileFormat
            }
            _ => DecodeErrorKind::Code(err.raw_os_error().unwrap_or(-1)),
        };
        Self::new(prefix, kind)
    }
}

/// Encoder subprocess failures.
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
pub enum SubprocessError {
    #[error("{}", failed_to_start_message(.custom_path.as_ref()))]
    FailedToStart { custom_path: Option<PathBuf> },

    #[error("encoder exited abnormally (status code {code}).")]
    AbnormalExit { code: i32 },
}

fn failed_to_start_message(custom_path: Option<&PathBuf>) -> String {
    match custom_path {
        None => "Could not start FFmpeg; it was not found in the system path. If you've installed \
                 FFmpeg already, either pass its location explicitly or add it to the system path. \
                 FFmpeg can be downloaded from https://ffmpeg.org/download.html."
            .to_owned(),
        Some(path) => format!(
            "Could not start FFmpeg; the file \"{}\" either does not exist or is not executable. \
             Pass the proper path explicitly. FFmpeg can be downloaded from \
             https://ffmpeg.org/download.html.",
            path.display()
        ),
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
