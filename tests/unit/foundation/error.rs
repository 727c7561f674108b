use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        WavescopeError::config("x")
            .to_string()
            .contains("config error:")
    );
    assert!(WavescopeError::io("x").to_string().contains("io error:"));
    assert!(
        WavescopeError::validation("x")
            .to_string()
            .contains("validation error:")
    );
}

#[test]
fn decode_error_humanizes_kind_after_prefix() {
    let err = DecodeError::new("Error creating stream: ", DecodeErrorKind::FileFormat);
    assert_eq!(err.to_string(), "Error creating stream: unsupported file format");

    let err = DecodeError::new("", DecodeErrorKind::Code(42));
    assert_eq!(err.to_string(), "error code 42");

    let wrapped = WavescopeError::from(err);
    assert!(wrapped.to_string().starts_with("decode error:"));
}

#[test]
fn decode_error_from_missing_file_is_file_open() {
    let io = std::io::Error::from(std::io::ErrorKind::NotFound);
    let err = DecodeError::from_io("Error opening file x.wav: ", &io);
    assert_eq!(err.kind, DecodeErrorKind::FileOpen);
}

#[test]
fn failed_to_start_message_depends_on_custom_path() {
    let system = SubprocessError::FailedToStart { custom_path: None }.to_string();
    assert!(system.contains("system path"));

    let custom = SubprocessError::FailedToStart {
        custom_path: Some(PathBuf::from("/opt/ff/ffmpeg")),
    }
    .to_string();
    assert!(custom.contains("/opt/ff/ffmpeg"));
    assert!(!custom.contains("system path"));
}

#[test]
fn abnormal_exit_reports_code() {
    let msg = SubprocessError::AbnormalExit { code: 3 }.to_string();
    assert!(msg.contains("status code 3"));
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = WavescopeError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
