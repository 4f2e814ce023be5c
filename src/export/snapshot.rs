use ab_glyph::{Font, FontRef, ScaleFont, point};
use image::RgbaImage;
use imageproc::drawing::{draw_filled_circle_mut, draw_text_mut};

use crate::core::db::{ApiKind, Color, Position};
use crate::export::{ExportError, ScreenExport};
use crate::intake::decode_data_uri;

pub const QUERY_COLOR: Color = Color::from_hex(0x1976d2);
pub const MUTATION_COLOR: Color = Color::from_hex(0x9c27b0);

const MARKER_RADIUS: i32 = 16;
const RING_WIDTH: i32 = 3;
const LABEL_SCALE: f32 = 12.0;

static LABEL_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Draws every marker, with its `Q<n>`/`M<n>` label, onto a copy of the
/// screen image.
pub fn render_snapshot(export: &ScreenExport) -> Result<RgbaImage, ExportError> {
    let font = FontRef::try_from_slice(LABEL_FONT)?;
    let mut canvas = decode_data_uri(&export.screen.image_url)?.to_rgba8();
    for entry in &export.apis {
        let center = marker_center(&canvas, entry.api.position_or_default());
        let fill = match entry.api.kind {
            ApiKind::Query => QUERY_COLOR,
            ApiKind::Mutation => MUTATION_COLOR,
        };
        draw_filled_circle_mut(&mut canvas, center, MARKER_RADIUS, Color::WHITE.into());
        draw_filled_circle_mut(&mut canvas, center, MARKER_RADIUS - RING_WIDTH, fill.into());
        let (x, y) = label_origin(&font, &entry.label, center);
        draw_text_mut(
            &mut canvas,
            Color::WHITE.into(),
            x,
            y,
            LABEL_SCALE,
            &font,
            &entry.label,
        );
    }
    Ok(canvas)
}

/// Origin to hand to `draw_text_mut` so the inked area of `text` is centred
/// on `center`. Lays glyphs out the same way `draw_text_mut` does.
fn label_origin(font: &FontRef<'_>, text: &str, center: (i32, i32)) -> (i32, i32) {
    let scaled = font.as_scaled(LABEL_SCALE);
    let mut caret = 0.0;
    let mut last = None;
    let mut bounds: Option<(f32, f32, f32, f32)> = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        let glyph = id.with_scale_and_position(LABEL_SCALE, point(caret, scaled.ascent()));
        caret += scaled.h_advance(id);
        let Some(outlined) = scaled.outline_glyph(glyph) else {
            continue;
        };
        if let Some(last) = last {
            caret += scaled.kern(id, last);
        }
        last = Some(id);
        let px = outlined.px_bounds();
        bounds = Some(match bounds {
            Some((min_x, min_y, max_x, max_y)) => (
                min_x.min(px.min.x),
                min_y.min(px.min.y),
                max_x.max(px.max.x),
                max_y.max(px.max.y),
            ),
            None => (px.min.x, px.min.y, px.max.x, px.max.y),
        });
    }
    match bounds {
        Some((min_x, min_y, max_x, max_y)) => (
            (center.0 as f32 - (min_x + max_x) / 2.0).round() as i32,
            (center.1 as f32 - (min_y + max_y) / 2.0).round() as i32,
        ),
        None => center,
    }
}

/// Percent position to pixel coordinates on `canvas`.
fn marker_center(canvas: &RgbaImage, position: Position) -> (i32, i32) {
    let x = position.x() / 100.0 * f64::from(canvas.width());
    let y = position.y() / 100.0 * f64::from(canvas.height());
    (x.round() as i32, y.round() as i32)
}
