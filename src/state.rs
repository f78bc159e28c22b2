use crate::geometry::{Rect, Rotation};

/// Number of colour-adjust components carried per image.
pub const COLOR_ADJUST_LEN: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Decode progress of an image's source file.
pub enum LoadState {
    #[default]
    NotLoaded,
    Decoding,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EditMode {
    #[default]
    None,
    Crop,
}

impl EditMode {
    /// Maps the integer stored in project files. Unknown codes mean no mode.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => EditMode::Crop,
            _ => EditMode::None,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            EditMode::None => 0,
            EditMode::Crop => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
/// Persisted edit parameters for one image.
pub struct EditState {
    pub rotation: Rotation,
    pub grayscale: bool,
    /// Source-pixel space, degenerate means "no crop".
    pub crop: Rect,
    pub color_adjust: [f32; COLOR_ADJUST_LEN],
    /// Set until the EXIF orientation has been folded into `rotation`.
    pub need_rot_check: bool,
}

impl EditState {
    pub fn has_crop(&self) -> bool {
        !self.crop.is_degenerate()
    }

    /// Cropped extent in source pixels; a degenerate axis falls back to the
    /// full source size.
    pub fn cropped_size(&self, src_w: i32, src_h: i32) -> (i32, i32) {
        let w = self.crop.width();
        let h = self.crop.height();
        (if w < 1 { src_w } else { w }, if h < 1 { src_h } else { h })
    }

    /// `(w, h)` swapped when the rotation turns the image on its side.
    pub fn oriented(&self, w: i32, h: i32) -> (i32, i32) {
        if self.rotation.swaps_axes() { (h, w) } else { (w, h) }
    }
}

/// `WxH` or `WxH cropped to WxH`, in the image's displayed orientation.
pub fn size_info(edit: &EditState, src_w: i32, src_h: i32) -> String {
    let (cw, ch) = edit.cropped_size(src_w, src_h);
    let (cw, ch) = edit.oriented(cw, ch);
    let (w, h) = edit.oriented(src_w, src_h);
    if cw != w || ch != h {
        format!("{w}x{h} cropped to {cw}x{ch}")
    } else {
        format!("{w}x{h}")
    }
}

const ASPECT_DENOMINATORS: [i32; 6] = [1, 2, 3, 4, 9, 10];
const ASPECT_TOLERANCE: f64 = 0.2;

/// Text shown over the crop overlay, e.g. `800x600 -- 4 : 3 -- 0.5mpix`.
///
/// `w`/`h` are the cropped dimensions in displayed orientation. Returns
/// `None` when either is zero.
pub fn crop_info(w: i32, h: i32) -> Option<String> {
    if w <= 0 || h <= 0 {
        return None;
    }
    let ratio = f64::from(w) / f64::from(h);

    let mut best_diff = ASPECT_TOLERANCE;
    let mut best: Option<(f64, i32)> = None;
    for denom in ASPECT_DENOMINATORS {
        let num = ratio * f64::from(denom);
        let diff = (num - num.round()).abs();
        if diff < best_diff {
            best_diff = diff;
            best = Some((num, denom));
        }
    }

    let (num, denom) = best.unwrap_or((ratio, 1));
    let mut num_text = format!("{num:.1}");
    if let Some(stripped) = num_text.strip_suffix(".0") {
        num_text = stripped.to_string();
    }
    let mpix = f64::from(w) * f64::from(h) / 1_000_000.0;
    Some(format!("{w}x{h} -- {num_text} : {denom} -- {mpix:.1}mpix"))
}
