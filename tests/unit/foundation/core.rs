use super::*;

#[test]
fn canvas_rejects_zero_and_oversized_dimensions() {
    assert!(Canvas::new(0, 10).is_err());
    assert!(Canvas::new(10, 70_000).is_err());
    let c = Canvas::new(320, 240).unwrap();
    assert_eq!(c.frame_bytes(), 320 * 240 * 4);
}

#[test]
fn samples_per_frame_truncates() {
    assert_eq!(samples_per_frame(48_000, 30).unwrap(), 1600);
    assert_eq!(samples_per_frame(44_100, 60).unwrap(), 735);
    assert!(samples_per_frame(48_000, 0).is_err());
    assert!(samples_per_frame(10, 30).is_err());
}

#[test]
fn ms_to_samples_truncates_toward_zero() {
    assert_eq!(ms_to_samples(40.0, 48_000), 1920);
    assert_eq!(ms_to_samples(0.5, 44_100), 22);
    assert_eq!(ms_to_samples(-5.0, 48_000), 0);
}

#[test]
fn rgba8_parses_hex_and_arrays() {
    let c: Rgba8 = serde_json::from_str("\"#ff3366\"").unwrap();
    assert_eq!(c, Rgba8::rgb(0xff, 0x33, 0x66));

    let c: Rgba8 = serde_json::from_str("\"#0000ff80\"").unwrap();
    assert_eq!(c, Rgba8::rgba(0, 0, 255, 128));

    let c: Rgba8 = serde_json::from_str("[1, 2, 3]").unwrap();
    assert_eq!(c, Rgba8::rgb(1, 2, 3));

    assert!(serde_json::from_str::<Rgba8>("[1, 2]").is_err());
    assert!(serde_json::from_str::<Rgba8>("\"#12345\"").is_err());
}

#[test]
fn rgba8_display_roundtrips_through_from_str() {
    let c = Rgba8::rgba(10, 20, 30, 40);
    let parsed: Rgba8 = c.to_string().parse().unwrap();
    assert_eq!(parsed, c);
    assert_eq!(Rgba8::WHITE.to_string(), "#ffffff");
}

#[test]
fn premul_array_scales_color_by_alpha() {
    assert_eq!(Rgba8::rgba(255, 0, 0, 128).to_premul_array(), [128, 0, 0, 128]);
    assert_eq!(Rgba8::WHITE.to_premul_array(), [255, 255, 255, 255]);
}
