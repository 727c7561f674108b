use super::*;
use crate::config::{ChannelConfig, ChannelOrder};
use crate::foundation::core::{Canvas, Rect};
use crate::render::layout::ChannelStyle;

fn info(w: f64, h: f64, cfg: ChannelConfig) -> PaintInfo {
    PaintInfo::new(Rect::new(0.0, 0.0, w, h), ChannelStyle::from(&cfg))
}

#[test]
fn wave_path_maps_samples_into_cell() {
    let path = wave_path(&[1.0, 0.0, -2.0], 10.0, 20.0, 10.0);
    let pts: Vec<Point> = path
        .elements()
        .iter()
        .filter_map(|el| match *el {
            PathEl::MoveTo(p) | PathEl::LineTo(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(
        pts,
        vec![Point::new(0.0, 0.0), Point::new(5.0, 10.0), Point::new(10.0, 20.0)]
    );
    assert!(wave_path(&[], 10.0, 10.0, 5.0).elements().is_empty());
}

#[test]
fn mono_subframe_draws_flat_wave_on_background() {
    let cfg = ChannelConfig {
        color: Rgba8::WHITE,
        thickness: 2.0,
        draw_h_midline: false,
        draw_labels: false,
        ..ChannelConfig::default()
    };
    let frame = paint_subframe(&info(40.0, 20.0, cfg), &[0.0; 16], &[], Rgba8::BLACK, 0.0, None)
        .unwrap();
    assert_eq!((frame.width, frame.height), (40, 20));
    assert_eq!(frame.pixel(20, 10), Some([255, 255, 255, 255]));
    assert_eq!(frame.pixel(20, 2), Some([0, 0, 0, 255]));
    assert_eq!(frame.pixel(0, 19), Some([0, 0, 0, 255]));
}

#[test]
fn stereo_subframe_splits_cell_and_draws_v_midline() {
    let cfg = ChannelConfig {
        stereo: true,
        color: Rgba8::rgb(255, 0, 0),
        thickness: 2.0,
        midline_color: Rgba8::rgb(0, 255, 0),
        midline_thickness: 2.0,
        draw_h_midline: false,
        draw_v_midline: true,
        draw_labels: false,
        ..ChannelConfig::default()
    };
    let frame =
        paint_subframe(&info(40.0, 40.0, cfg), &[0.0; 8], &[0.0; 8], Rgba8::BLACK, 0.0, None)
            .unwrap();
    // waves at h/4 and 3h/4 paint over the midline
    assert_eq!(frame.pixel(5, 10), Some([255, 0, 0, 255]));
    assert_eq!(frame.pixel(5, 30), Some([255, 0, 0, 255]));
    assert_eq!(frame.pixel(20, 2), Some([0, 255, 0, 255]));
    assert_eq!(frame.pixel(5, 20), Some([0, 0, 0, 255]));
}

#[test]
fn fractional_cells_round_up() {
    let cfg = ChannelConfig {
        draw_labels: false,
        ..ChannelConfig::default()
    };
    let frame =
        paint_subframe(&info(106.6, 80.2, cfg), &[0.0; 4], &[], Rgba8::BLACK, 0.0, None).unwrap();
    assert_eq!((frame.width, frame.height), (107, 81));
}

#[test]
fn border_layer_is_transparent_outside_lines() {
    let grid = GridLayout::new(Canvas::new(40, 20).unwrap(), 4, 2, ChannelOrder::RowMajor).unwrap();
    let layer = paint_border_layer(&grid, Rgba8::WHITE, 2.0).unwrap().unwrap();
    assert_eq!(layer.pixel(5, 5), Some([0, 0, 0, 0]));
    assert_eq!(layer.pixel(20, 5), Some([255, 255, 255, 255]));
    assert_eq!(layer.pixel(5, 10), Some([255, 255, 255, 255]));

    assert!(paint_border_layer(&grid, Rgba8::WHITE, 0.0).unwrap().is_none());
    let single =
        GridLayout::new(Canvas::new(40, 20).unwrap(), 1, 1, ChannelOrder::RowMajor).unwrap();
    assert!(paint_border_layer(&single, Rgba8::WHITE, 2.0).unwrap().is_none());
}
