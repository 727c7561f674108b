use super::*;

fn canvas() -> Canvas {
    Canvas::new(1920, 1080).unwrap()
}

#[test]
fn seven_channels_in_three_columns_fill_three_rows() {
    let grid = GridLayout::new(canvas(), 7, 3, ChannelOrder::RowMajor).unwrap();
    assert_eq!((grid.rows, grid.cols), (3, 3));
    assert!((f64::from(grid.cols) * grid.cell_width - 1920.0).abs() < 1e-9);
    assert!((f64::from(grid.rows) * grid.cell_height - 1080.0).abs() < 1e-9);

    let positions: Vec<(u32, u32)> = (0..7).map(|i| grid.cell_position(i)).collect();
    assert_eq!(
        positions,
        vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2), (2, 0)]
    );
    let last = grid.cell_rect(6);
    assert_eq!((last.x0, last.y0), (0.0, 720.0));
}

#[test]
fn column_major_wraps_down_columns() {
    let grid = GridLayout::new(canvas(), 5, 2, ChannelOrder::ColumnMajor).unwrap();
    assert_eq!((grid.rows, grid.cols), (2, 3));
    assert_eq!(grid.cell_position(1), (1, 0));
    assert_eq!(grid.cell_position(2), (0, 1));
    assert_eq!(grid.cell_position(4), (0, 2));
    let r = grid.cell_rect(3);
    assert!((r.x0 - 640.0).abs() < 1e-9 && (r.y0 - 540.0).abs() < 1e-9);
}

#[test]
fn borders_cover_interior_boundaries_only() {
    let grid = GridLayout::new(canvas(), 4, 2, ChannelOrder::RowMajor).unwrap();
    let lines = grid.border_lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], (Point::new(0.0, 540.0), Point::new(1920.0, 540.0)));
    assert_eq!(lines[1], (Point::new(960.0, 0.0), Point::new(960.0, 1080.0)));

    let single = GridLayout::new(canvas(), 1, 1, ChannelOrder::RowMajor).unwrap();
    assert!(single.border_lines().is_empty());
}

#[test]
fn empty_channel_list_is_rejected() {
    assert!(GridLayout::new(canvas(), 0, 1, ChannelOrder::RowMajor).is_err());
    assert!(GridLayout::new(canvas(), 3, 0, ChannelOrder::ColumnMajor).is_err());
}

#[test]
fn label_template_expansion() {
    assert_eq!(expand_label("%n: %i", 0, 0, 0), "1: Acoustic Grand Piano");
    assert_eq!(expand_label("ch %n (%i)", 9, 25, 0), "ch 10 (TR-808 Kit)");
    assert_eq!(expand_label("100%% %x %", 2, 40, 0), "100% %x %");
    assert_eq!(expand_label("", 3, 0, 0), "");
}

#[test]
fn instrument_names_fall_back_for_unknown_values() {
    assert_eq!(instrument_name(40, 0, false), "Violin");
    assert_eq!(instrument_name(127, 3, false), "Gunshot");
    assert_eq!(instrument_name(200, 0, false), "Acoustic Grand Piano");
    assert_eq!(instrument_name(3, 0, true), "Standard Kit");
}

#[test]
fn update_label_reports_changes() {
    let style = ChannelStyle::from(&ChannelConfig {
        label_template: "%i".to_owned(),
        ..ChannelConfig::default()
    });
    let mut info = PaintInfo::new(Rect::new(0.0, 0.0, 10.0, 10.0), style);
    assert_eq!(info.label, "Acoustic Grand Piano");
    assert!(!info.update_label());
    info.program = 73;
    assert!(info.update_label());
    assert_eq!(info.label, "Flute");
}
