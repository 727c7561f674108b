use super::*;
use crate::source::{MemoryProvider, MemorySource};

#[test]
fn setters_fail_fast_on_negative_lengths() {
    let err = ScopeBuilder::new().max_nudge_ms(-1.0).unwrap_err();
    assert!(err.to_string().contains("max_nudge_ms cannot be negative"));
    assert!(ScopeBuilder::new().display_window_ms(-0.5).is_err());
    assert!(ScopeBuilder::new().similarity_window_ms(f64::NAN).is_err());
    assert!(ScopeBuilder::new().drift_window_ms(-3.0).is_err());
    assert!(ScopeBuilder::new().frame_rate(0).is_err());
}

#[test]
fn milliseconds_convert_at_the_stream_rate() {
    let params = ScopeBuilder::new()
        .frame_rate(60)
        .unwrap()
        .display_window_ms(50.0)
        .unwrap()
        .max_nudge_ms(20.0)
        .unwrap()
        .drift_window_ms(2.5)
        .unwrap()
        .params_for(44_100)
        .unwrap();
    assert_eq!(params.samples_per_frame, 735);
    assert_eq!(params.window_size, 2205);
    assert_eq!(params.max_nudge, 882);
    assert_eq!(params.drift_window, 110);
}

#[test]
fn similarity_window_is_clamped_to_display_window() {
    let params = ScopeBuilder::new()
        .display_window_ms(10.0)
        .unwrap()
        .similarity_window_ms(25.0)
        .unwrap()
        .params_for(48_000)
        .unwrap();
    assert_eq!(params.window_size, 480);
    assert_eq!(params.similarity_window, 480);
}

#[test]
fn build_from_channel_uses_provider_stream() {
    let provider = MemoryProvider::silence(48_000, 3, 4800);
    let builder = ScopeBuilder::new().stereo(true).amplification(2.0);
    let mut scope = builder.build_from_channel(&provider, 2).unwrap();
    assert_eq!(scope.params().window_size, 1920);
    assert!(scope.params().stereo);
    scope.next_wave_data().unwrap();
    assert_eq!(scope.right_samples().len(), 1920);

    let err = builder.build_from_channel(&provider, 3).unwrap_err();
    assert!(err.to_string().starts_with("decode error:"));
}

#[test]
fn build_from_source_rejects_frame_rate_above_sample_rate() {
    let builder = ScopeBuilder::new().frame_rate(120).unwrap();
    let src = MemorySource::silence(100, 1, 10);
    assert!(builder.build_from_source(Box::new(src)).is_err());
}

#[test]
fn missing_midi_file_surfaces_decode_error() {
    let err = ScopeBuilder::new()
        .soundfonts(vec!["/nonexistent/font.sf2".into()])
        .build_from_midi_channel("/nonexistent/song.mid", 0)
        .unwrap_err();
    assert!(matches!(err, WavescopeError::Decode(_)));
}
