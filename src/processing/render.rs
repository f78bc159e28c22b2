use image::{GenericImageView, RgbaImage, SubImage, imageops};
use thiserror::Error;

use crate::geometry::{Rect, Rotation};

use super::{filters, transform};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("source bitmap is empty")]
    EmptySource,
    #[error("crop region {0:?} has no area inside the source")]
    EmptyCrop(Rect),
}

/// Sub-region of `source` selected by `crop`, or the whole image when the
/// crop is degenerate. The crop is clipped to the source bounds first.
pub fn crop_view(source: &RgbaImage, crop: Rect) -> Result<SubImage<&RgbaImage>, RenderError> {
    let (w, h) = source.dimensions();
    if w == 0 || h == 0 {
        return Err(RenderError::EmptySource);
    }
    if crop.is_degenerate() {
        return Ok(imageops::crop_imm(source, 0, 0, w, h));
    }

    let clipped = crop.clamp_to(w as i32, h as i32);
    if clipped.width() < 1 || clipped.height() < 1 {
        return Err(RenderError::EmptyCrop(crop));
    }
    Ok(imageops::crop_imm(
        source,
        clipped.left as u32,
        clipped.top as u32,
        clipped.width() as u32,
        clipped.height() as u32,
    ))
}

/// Output size for a `view_w x view_h` region after rotation, shrunk to fit
/// the non-zero bounds. Never enlarges and never drops below 1x1.
pub fn output_size(view_w: u32, view_h: u32, rotation: Rotation, max_w: u32, max_h: u32) -> (u32, u32) {
    let (mut w, mut h) = if rotation.swaps_axes() {
        (f64::from(view_h), f64::from(view_w))
    } else {
        (f64::from(view_w), f64::from(view_h))
    };

    if max_w > 0 && w > f64::from(max_w) {
        h = h * f64::from(max_w) / w;
        w = f64::from(max_w);
    }
    if max_h > 0 && h > f64::from(max_h) {
        w = w * f64::from(max_h) / h;
        h = f64::from(max_h);
    }

    let round = |v: f64| ((v + 0.5).floor() as u32).max(1);
    (round(w), round(h))
}

/// Renders an already-cropped view at exactly `out_w x out_h`.
pub fn render_view<V>(view: &V, rotation: Rotation, grayscale: bool, out_w: u32, out_h: u32) -> RgbaImage
where
    V: GenericImageView<Pixel = image::Rgba<u8>>,
{
    let mut out = transform::rotate_scaled(view, rotation, out_w.max(1), out_h.max(1));
    if grayscale {
        filters::grayscale(&mut out);
    }
    out
}

/// Full pipeline: crop, rotate, fit into the bounds, then grayscale.
pub fn render(
    source: &RgbaImage,
    crop: Rect,
    rotation: Rotation,
    grayscale: bool,
    max_w: u32,
    max_h: u32,
) -> Result<RgbaImage, RenderError> {
    let view = crop_view(source, crop)?;
    let (vw, vh) = view.dimensions();
    let (w, h) = output_size(vw, vh, rotation, max_w, max_h);
    Ok(render_view(&*view, rotation, grayscale, w, h))
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba, RgbaImage};

    use super::*;

    fn solid(w: u32, h: u32) -> RgbaImage {
        ImageBuffer::from_pixel(w, h, Rgba([200, 100, 50, 255]))
    }

    #[test]
    fn fits_wide_source_into_square_bounds() {
        let out = render(&solid(1000, 500), Rect::default(), Rotation::None, false, 100, 100)
            .expect("render should succeed");
        assert_eq!(out.dimensions(), (100, 50));
    }

    #[test]
    fn never_enlarges() {
        assert_eq!(output_size(40, 20, Rotation::None, 100, 100), (40, 20));
    }

    #[test]
    fn unconstrained_axis_is_ignored() {
        assert_eq!(output_size(1000, 500, Rotation::None, 0, 100), (200, 100));
        assert_eq!(output_size(1000, 500, Rotation::None, 0, 0), (1000, 500));
    }

    #[test]
    fn quarter_turn_swaps_output_axes() {
        let out = render(&solid(1000, 500), Rect::default(), Rotation::Cw90, false, 100, 100)
            .expect("render should succeed");
        assert_eq!(out.dimensions(), (50, 100));
    }

    #[test]
    fn output_floors_at_one_pixel() {
        assert_eq!(output_size(10_000, 1, Rotation::None, 100, 0), (100, 1));
    }

    #[test]
    fn crop_selects_region() {
        let src: RgbaImage = ImageBuffer::from_fn(100, 100, |x, _| {
            if x < 50 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 255, 0, 255])
            }
        });
        let out = render(&src, Rect::new(60, 0, 100, 100), Rotation::None, false, 0, 0)
            .expect("render should succeed");
        assert_eq!(out.dimensions(), (40, 100));
        assert_eq!(out.get_pixel(20, 50).0, [0, 255, 0, 255]);
    }

    #[test]
    fn crop_outside_source_fails() {
        let err = render(&solid(10, 10), Rect::new(20, 20, 30, 30), Rotation::None, false, 0, 0)
            .unwrap_err();
        assert_eq!(err, RenderError::EmptyCrop(Rect::new(20, 20, 30, 30)));
    }

    #[test]
    fn empty_source_fails() {
        let err = render(&RgbaImage::new(0, 0), Rect::default(), Rotation::None, false, 0, 0)
            .unwrap_err();
        assert_eq!(err, RenderError::EmptySource);
    }

    #[test]
    fn grayscale_applies_after_resample() {
        let out = render(&solid(4, 4), Rect::default(), Rotation::Half, true, 0, 0)
            .expect("render should succeed");
        assert_eq!(out.get_pixel(1, 1).0, [116, 116, 116, 255]);
    }
}
