use image::{GenericImageView, Rgba, RgbaImage, imageops};
use imageproc::geometric_transformations::{Interpolation, Projection, warp_into};

use crate::geometry::Rotation;

/// Per-axis source walk for a rotated blit.
///
/// Output pixel `(x, y)` samples source `(s, t)` with
/// `s = sx + x*dsdx + y*dsdy` and `t = sy + x*dtdx + y*dtdy`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Deltas {
    pub sx: f64,
    pub sy: f64,
    pub dsdx: f64,
    pub dsdy: f64,
    pub dtdx: f64,
    pub dtdy: f64,
}

pub fn deltas_for(rotation: Rotation, src_w: u32, src_h: u32, out_w: u32, out_h: u32) -> Deltas {
    let sw = f64::from(src_w);
    let sh = f64::from(src_h);
    let w = f64::from(out_w.max(1));
    let h = f64::from(out_h.max(1));

    let mut d = Deltas {
        sx: if rotation != Rotation::Cw90 { sw - 1.0 } else { 0.0 },
        sy: if rotation != Rotation::Ccw90 { sh - 1.0 } else { 0.0 },
        dsdx: 0.0,
        dsdy: 0.0,
        dtdx: 0.0,
        dtdy: 0.0,
    };

    match rotation {
        Rotation::None => {
            d.sx = 0.0;
            d.sy = 0.0;
            d.dsdx = sw / w;
            d.dtdy = sh / h;
        }
        Rotation::Cw90 => {
            d.dtdx = -sh / w;
            d.dsdy = sw / h;
        }
        Rotation::Ccw90 => {
            d.dtdx = sh / w;
            d.dsdy = -sw / h;
        }
        Rotation::Half => {
            d.dsdx = -sw / w;
            d.dtdy = -sh / h;
        }
    }
    d
}

impl Deltas {
    /// Output-to-source affine map of the walk.
    fn matrix(&self) -> [f32; 9] {
        [
            self.dsdx as f32,
            self.dsdy as f32,
            self.sx as f32,
            self.dtdx as f32,
            self.dtdy as f32,
            self.sy as f32,
            0.0,
            0.0,
            1.0,
        ]
    }
}

/// Copy of `src` with a one-pixel border repeating its edge pixels.
fn pad_edges(src: &RgbaImage) -> RgbaImage {
    let (w, h) = src.dimensions();
    RgbaImage::from_fn(w + 2, h + 2, |x, y| {
        *src.get_pixel(x.saturating_sub(1).min(w - 1), y.saturating_sub(1).min(h - 1))
    })
}

/// Bilinear blit of `src` into a new `out_w x out_h` bitmap, walking the
/// source along `deltas`. Samples falling outside are clamped to the edge.
/// Returns `None` for an empty source.
pub fn delta_blit(src: &RgbaImage, out_w: u32, out_h: u32, deltas: &Deltas) -> Option<RgbaImage> {
    let (w, h) = src.dimensions();
    if w == 0 || h == 0 {
        return None;
    }
    let padded = pad_edges(src);
    // warp_into expects the source-to-output direction.
    let to_source = Projection::from_matrix(deltas.matrix())?.and_then(Projection::translate(1.0, 1.0));
    let mut out = RgbaImage::new(out_w, out_h);
    warp_into(
        &padded,
        &to_source.invert(),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
        &mut out,
    );
    Some(out)
}

/// Scales and rotates `src` into an `out_w x out_h` bitmap. The output
/// dimensions are already in rotated orientation.
///
/// Scaling happens first with a triangle filter at the unrotated size, so
/// rotated and unrotated renders are resampled the same way and the
/// rotating blit only steps whole pixels.
pub fn rotate_scaled<V>(src: &V, rotation: Rotation, out_w: u32, out_h: u32) -> RgbaImage
where
    V: GenericImageView<Pixel = Rgba<u8>>,
{
    let (pre_w, pre_h) = match rotation {
        Rotation::Cw90 | Rotation::Ccw90 => (out_h, out_w),
        Rotation::None | Rotation::Half => (out_w, out_h),
    };
    let scaled = imageops::resize(src, pre_w, pre_h, imageops::FilterType::Triangle);
    if rotation == Rotation::None {
        return scaled;
    }
    let deltas = deltas_for(rotation, pre_w, pre_h, out_w, out_h);
    delta_blit(&scaled, out_w, out_h, &deltas).unwrap_or_else(|| RgbaImage::new(out_w, out_h))
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba, RgbaImage};

    use super::*;

    // 2x1 source: red on the left, blue on the right.
    fn two_px() -> RgbaImage {
        ImageBuffer::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        })
    }

    #[test]
    fn clockwise_puts_left_column_on_top() {
        let out = rotate_scaled(&two_px(), Rotation::Cw90, 1, 2);
        assert_eq!(out.dimensions(), (1, 2));
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(0, 1).0, [0, 0, 255, 255]);
    }

    #[test]
    fn counter_clockwise_puts_left_column_at_bottom() {
        let out = rotate_scaled(&two_px(), Rotation::Ccw90, 1, 2);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(0, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn half_turn_mirrors_both_axes() {
        let out = rotate_scaled(&two_px(), Rotation::Half, 2, 1);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn delta_blit_interpolates_and_clamps_to_edge() {
        let d = deltas_for(Rotation::None, 2, 1, 4, 1);
        let out = delta_blit(&two_px(), 4, 1, &d).expect("non-empty source");
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 0).0, [127, 0, 127, 255]);
        assert_eq!(out.get_pixel(2, 0).0, [0, 0, 255, 255]);
        assert_eq!(out.get_pixel(3, 0).0, [0, 0, 255, 255]);
        assert!(delta_blit(&RgbaImage::new(0, 0), 4, 1, &d).is_none());
    }

    #[test]
    fn rotated_downscale_is_filtered() {
        // One-pixel columns alternating black and white.
        let stripes: RgbaImage = ImageBuffer::from_fn(64, 32, |x, _| {
            let v = if x % 2 == 0 { 0 } else { 255 };
            Rgba([v, v, v, 255])
        });
        let out = rotate_scaled(&stripes, Rotation::Cw90, 16, 32);
        assert_eq!(out.dimensions(), (16, 32));
        for (x, y) in [(8, 16), (4, 10), (12, 20)] {
            let v = out.get_pixel(x, y)[0];
            assert!((60..=195).contains(&v), "pixel ({x}, {y}) = {v}");
        }
    }

    #[test]
    fn deltas_walk_rotated_axes() {
        let d = deltas_for(Rotation::Cw90, 200, 100, 100, 200);
        assert_eq!(d.sx, 0.0);
        assert_eq!(d.sy, 99.0);
        assert_eq!(d.dtdx, -1.0);
        assert_eq!(d.dsdy, 1.0);
        assert_eq!(d.dsdx, 0.0);
    }
}
