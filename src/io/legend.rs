//! Colour-bar legend rendering
//!
//! Pure function from (colour map, bounds, label) to PNG bytes. Text is drawn
//! with an embedded DejaVu Sans font.

use crate::core::colormap::ColorMap;
use crate::types::{KmzError, KmzResult};
use image::{DynamicImage, ImageOutputFormat, Rgba, RgbaImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::io::Cursor;

/// Embedded font data - DejaVu Sans
const FONT_DATA: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 180;
const MARGIN_X: u32 = 60;
const BAR_TOP: u32 = 20;
const BAR_HEIGHT: u32 = 60;
const TICK_LENGTH: u32 = 10;
const TICK_FONT_SIZE: f32 = 28.0;
const LABEL_FONT_SIZE: f32 = 32.0;
const LABEL_TOP: u32 = 136;

// Semi-transparent white figure background
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 179]);
const INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Render a horizontal colour bar with ticks at vmin, midpoint and vmax and
/// `label` centred underneath
pub fn render_legend(colormap: ColorMap, vmin: f64, vmax: f64, label: &str) -> KmzResult<Vec<u8>> {
    let font = Font::try_from_bytes(FONT_DATA).ok_or_else(|| {
        KmzError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "embedded legend font could not be loaded",
        ))
    })?;

    let mut img = RgbaImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);
    let bar_width = WIDTH - 2 * MARGIN_X;
    let bar_bottom = BAR_TOP + BAR_HEIGHT;

    for dx in 0..bar_width {
        let t = dx as f64 / (bar_width - 1) as f64;
        let color = Rgba(colormap.color_at(t).to_rgba8());
        let x = (MARGIN_X + dx) as f32;
        draw_line_segment_mut(&mut img, (x, BAR_TOP as f32), (x, (bar_bottom - 1) as f32), color);
    }
    draw_hollow_rect_mut(
        &mut img,
        Rect::at(MARGIN_X as i32, BAR_TOP as i32).of_size(bar_width, BAR_HEIGHT),
        INK,
    );

    let ticks = [
        (0.0, vmin),
        (0.5, vmin / 2.0 + vmax / 2.0),
        (1.0, vmax),
    ];
    let tick_bottom = bar_bottom + TICK_LENGTH;
    let tick_scale = Scale::uniform(TICK_FONT_SIZE);
    for (t, value) in ticks {
        let x = MARGIN_X + (t * (bar_width - 1) as f64).round() as u32;
        draw_line_segment_mut(
            &mut img,
            (x as f32, bar_bottom as f32),
            (x as f32, tick_bottom as f32),
            INK,
        );
        let text = tick_label(value);
        let left = centred_left(x as i32, tick_scale, &font, &text);
        draw_text_mut(&mut img, INK, left, (tick_bottom + 6) as i32, tick_scale, &font, &text);
    }

    if !label.is_empty() {
        let label_scale = Scale::uniform(LABEL_FONT_SIZE);
        let left = centred_left((WIDTH / 2) as i32, label_scale, &font, label);
        draw_text_mut(&mut img, INK, left, LABEL_TOP as i32, label_scale, &font, label);
    }

    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)?;
    Ok(bytes)
}

/// Left edge of `text` centred on `x`, kept inside the image where it fits
fn centred_left(x: i32, scale: Scale, font: &Font, text: &str) -> i32 {
    let (text_width, _) = text_size(scale, font, text);
    (x - text_width / 2).min(WIDTH as i32 - text_width).max(0)
}

/// Up to two decimals with trailing zeros dropped; exponent notation for
/// magnitudes that would not fit under the bar
fn tick_label(v: f64) -> String {
    if v.abs() >= 1e6 {
        return format!("{:.2e}", v);
    }
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
