use kurbo::{BezPath, PathEl, Point};

use crate::foundation::core::Rgba8;
use crate::foundation::error::{WavescopeError, WavescopeResult};
use crate::render::frame::FrameRGBA;
use crate::render::layout::{GridLayout, PaintInfo};

const STROKE_TOLERANCE: f64 = 0.1;
const LABEL_INSET: f64 = 3.0;

/// Render one channel cell into its own `ceil(w) x ceil(h)` premultiplied frame.
///
/// Paint order: vertical midline, label, then horizontal midline(s) and wave(s).
pub fn paint_subframe(
    info: &PaintInfo,
    left: &[f32],
    right: &[f32],
    background: Rgba8,
    border_thickness: f64,
    font: Option<&vello_cpu::peniko::FontData>,
) -> WavescopeResult<FrameRGBA> {
    let w = info.rect.width();
    let h = info.rect.height();
    let (w_px, h_px) = (pixel_extent(w)?, pixel_extent(h)?);
    let style = &info.style;

    let mut ctx = vello_cpu::RenderContext::new(w_px, h_px);
    ctx.set_paint(background.to_cpu_color());
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(w_px),
        f64::from(h_px),
    ));

    if style.draw_v_midline {
        stroke_line(
            &mut ctx,
            Point::new(w * 0.5, 0.0),
            Point::new(w * 0.5, h),
            style.midline_color,
            style.midline_thickness,
        );
    }

    if style.draw_labels
        && let (Some(font), Some(layout)) = (font, info.label_layout.as_ref())
    {
        let inset = border_thickness * 0.5 + LABEL_INSET;
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((inset, inset)));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let brush = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                    brush.r, brush.g, brush.b, brush.a,
                ));
                let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    if style.stereo {
        if style.draw_h_midline {
            for y in [h * 0.25, h * 0.75] {
                stroke_line(
                    &mut ctx,
                    Point::new(0.0, y),
                    Point::new(w, y),
                    style.midline_color,
                    style.midline_thickness,
                );
            }
        }
        stroke_path(&mut ctx, &wave_path(left, w, h * 0.5, h * 0.25), style.color, style.thickness);
        stroke_path(&mut ctx, &wave_path(right, w, h * 0.5, h * 0.75), style.color, style.thickness);
    } else {
        if style.draw_h_midline {
            stroke_line(
                &mut ctx,
                Point::new(0.0, h * 0.5),
                Point::new(w, h * 0.5),
                style.midline_color,
                style.midline_thickness,
            );
        }
        stroke_path(&mut ctx, &wave_path(left, w, h, h * 0.5), style.color, style.thickness);
    }

    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(w_px, h_px);
    ctx.render_to_pixmap(&mut pixmap);
    Ok(FrameRGBA::from_pixmap(&pixmap))
}

/// Transparent canvas-sized layer holding the interior grid lines.
pub fn paint_border_layer(
    grid: &GridLayout,
    color: Rgba8,
    thickness: f64,
) -> WavescopeResult<Option<FrameRGBA>> {
    let lines = grid.border_lines();
    if thickness <= 0.0 || lines.is_empty() {
        return Ok(None);
    }
    let w = pixel_extent(f64::from(grid.canvas.width))?;
    let h = pixel_extent(f64::from(grid.canvas.height))?;

    let mut ctx = vello_cpu::RenderContext::new(w, h);
    for (a, b) in lines {
        stroke_line(&mut ctx, a, b, color, thickness);
    }
    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut pixmap);
    Ok(Some(FrameRGBA::from_pixmap(&pixmap)))
}

/// Polyline through `wave` spanning `width`, with +1 at `mid_y - height/2`.
pub fn wave_path(wave: &[f32], width: f64, height: f64, mid_y: f64) -> BezPath {
    let mut path = BezPath::new();
    if wave.is_empty() {
        return path;
    }
    let x_mult = if wave.len() > 1 {
        width / (wave.len() - 1) as f64
    } else {
        0.0
    };
    let y_mult = height * -0.5;
    for (i, &s) in wave.iter().enumerate() {
        let p = Point::new(
            i as f64 * x_mult,
            f64::from(s.clamp(-1.0, 1.0)) * y_mult + mid_y,
        );
        if i == 0 {
            path.move_to(p);
        } else {
            path.line_to(p);
        }
    }
    path
}

fn pixel_extent(v: f64) -> WavescopeResult<u16> {
    let px = v.ceil().max(1.0);
    if !px.is_finite() || px > f64::from(u16::MAX) {
        return Err(WavescopeError::validation(format!(
            "paint surface extent {v} exceeds u16"
        )));
    }
    Ok(px as u16)
}

fn stroke_line(
    ctx: &mut vello_cpu::RenderContext,
    a: Point,
    b: Point,
    color: Rgba8,
    thickness: f64,
) {
    let mut path = BezPath::new();
    path.move_to(a);
    path.line_to(b);
    stroke_path(ctx, &path, color, thickness);
}

fn stroke_path(ctx: &mut vello_cpu::RenderContext, path: &BezPath, color: Rgba8, thickness: f64) {
    if thickness <= 0.0 || path.elements().len() < 2 {
        return;
    }
    let outline = kurbo::stroke(
        path.elements().iter().copied(),
        &kurbo::Stroke::new(thickness),
        &kurbo::StrokeOpts::default(),
        STROKE_TOLERANCE,
    );
    ctx.set_paint(color.to_cpu_color());
    ctx.fill_path(&bezpath_to_cpu(&outline));
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/render/paint.rs"]
mod tests;
