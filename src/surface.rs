//! Drawing surface the records paint onto.
//!
//! The host windowing layer supplies its own implementation; [`Canvas`]
//! rasterises into an `RgbaImage` for headless rendering and tests. Text is
//! not rasterised, only laid out and recorded.

use image::{Rgba, RgbaImage, imageops};
use imageproc::drawing::{Blend, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};

use crate::geometry::{Point, Rect};

/// Fixed text cell used for layout when no font backend is present.
pub const GLYPH_WIDTH: i32 = 7;
pub const GLYPH_HEIGHT: i32 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlign {
    Left,
    Center,
}

/// Builds a colour from RGB plus a 0..1 opacity.
pub fn rgba(r: u8, g: u8, b: u8, alpha: f32) -> Rgba<u8> {
    Rgba([r, g, b, (alpha.clamp(0.0, 1.0) * 255.0).round() as u8])
}

pub trait Surface {
    fn dimensions(&self) -> (i32, i32);
    /// Copies `bitmap` with its top-left corner at `(x, y)`.
    fn blit(&mut self, bitmap: &RgbaImage, x: i32, y: i32);
    /// Blends `color` over `rect` using the colour's alpha.
    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>);
    fn outline_rect(&mut self, rect: Rect, color: Rgba<u8>);
    fn line(&mut self, from: Point, to: Point, color: Rgba<u8>);
    fn measure_text(&self, text: &str) -> (i32, i32);
    fn draw_text(&mut self, text: &str, rect: Rect, align: TextAlign, color: Rgba<u8>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub rect: Rect,
    pub align: TextAlign,
    pub color: Rgba<u8>,
}

#[derive(Debug, Clone)]
pub struct Canvas {
    pub image: RgbaImage,
    pub texts: Vec<TextRun>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
            texts: Vec::new(),
        }
    }

    pub fn has_text(&self, needle: &str) -> bool {
        self.texts.iter().any(|t| t.text.contains(needle))
    }

    /// Runs `draw` against the bitmap with source-over alpha blending.
    fn blended(&mut self, draw: impl FnOnce(&mut Blend<RgbaImage>)) {
        let mut target = Blend(std::mem::take(&mut self.image));
        draw(&mut target);
        self.image = target.0;
    }
}

fn to_imageproc(rect: Rect) -> Option<imageproc::rect::Rect> {
    if rect.width() <= 0 || rect.height() <= 0 {
        return None;
    }
    Some(imageproc::rect::Rect::at(rect.left, rect.top).of_size(rect.width() as u32, rect.height() as u32))
}

impl Surface for Canvas {
    fn dimensions(&self) -> (i32, i32) {
        (self.image.width() as i32, self.image.height() as i32)
    }

    fn blit(&mut self, bitmap: &RgbaImage, x: i32, y: i32) {
        imageops::replace(&mut self.image, bitmap, i64::from(x), i64::from(y));
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        let (w, h) = self.dimensions();
        if let Some(r) = to_imageproc(rect.clamp_to(w, h)) {
            self.blended(|target| draw_filled_rect_mut(target, r, color));
        }
    }

    fn outline_rect(&mut self, rect: Rect, color: Rgba<u8>) {
        if let Some(r) = to_imageproc(rect) {
            self.blended(|target| draw_hollow_rect_mut(target, r, color));
        }
    }

    fn line(&mut self, from: Point, to: Point, color: Rgba<u8>) {
        let (start, end) = ((from.x as f32, from.y as f32), (to.x as f32, to.y as f32));
        self.blended(|target| draw_line_segment_mut(target, start, end, color));
    }

    fn measure_text(&self, text: &str) -> (i32, i32) {
        (text.chars().count() as i32 * GLYPH_WIDTH, GLYPH_HEIGHT)
    }

    fn draw_text(&mut self, text: &str, rect: Rect, align: TextAlign, color: Rgba<u8>) {
        self.texts.push(TextRun {
            text: text.to_string(),
            rect,
            align,
            color,
        });
    }
}
