//! Coordinate mapping between source-pixel space and display space.
//!
//! Crop rectangles are always stored against the unrotated source image.
//! Everything drawn on screen is scaled and rotated, so every interactive
//! edit goes through [`to_source`] and every overlay through [`to_screen`].
//! Each rotation case is spelled out separately: rounding happens per axis
//! after scaling, which a combined matrix would not reproduce.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Edge-inclusive integer rectangle (`left`/`top` inside, `right`/`bottom` outside).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn from_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub const fn width(&self) -> i32 {
        self.right - self.left
    }

    pub const fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// A degenerate crop rectangle means "no crop, use the full image".
    pub const fn is_degenerate(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub const fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }

    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.left + dx, self.top + dy, self.right + dx, self.bottom + dy)
    }

    /// Clamps every coordinate into `[0,w] x [0,h]` independently.
    pub fn clamp_to(self, w: i32, h: i32) -> Self {
        let w = w.max(0);
        let h = h.max(0);
        Self::new(
            self.left.clamp(0, w),
            self.top.clamp(0, h),
            self.right.clamp(0, w),
            self.bottom.clamp(0, h),
        )
    }

    /// Replaces a degenerate axis with the full `[0,w]` / `[0,h]` extent.
    pub fn resolve_full(self, w: i32, h: i32) -> Self {
        let mut out = self;
        if out.left >= out.right {
            out.right = w;
            if out.left >= out.right {
                out.left = 0;
            }
        }
        if out.top >= out.bottom {
            out.bottom = h;
            if out.top >= out.bottom {
                out.top = 0;
            }
        }
        out
    }
}

/// Orthogonal rotation in 90° clockwise steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Half,
    Ccw90,
}

impl Rotation {
    pub fn from_steps(steps: i64) -> Self {
        match steps.rem_euclid(4) {
            1 => Rotation::Cw90,
            2 => Rotation::Half,
            3 => Rotation::Ccw90,
            _ => Rotation::None,
        }
    }

    pub fn steps(self) -> i32 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Half => 2,
            Rotation::Ccw90 => 3,
        }
    }

    pub fn rotated(self, delta: i32) -> Self {
        Self::from_steps(i64::from(self.steps()) + i64::from(delta))
    }

    pub fn swaps_axes(self) -> bool {
        matches!(self, Rotation::Cw90 | Rotation::Ccw90)
    }

    pub fn degrees(self) -> u32 {
        self.steps() as u32 * 90
    }
}

fn round_half_up(v: f64) -> i32 {
    (v + 0.5).floor() as i32
}

/// Maps a source-space crop rectangle into a `disp_w x disp_h` rotated view.
pub fn to_screen(
    crop: Rect,
    rotation: Rotation,
    src_w: i32,
    src_h: i32,
    disp_w: i32,
    disp_h: i32,
) -> Rect {
    let r = crop.resolve_full(src_w, src_h);
    let sw = f64::from(src_w.max(1));
    let sh = f64::from(src_h.max(1));
    let w = f64::from(disp_w);
    let h = f64::from(disp_h);
    let (l, t, rr, b) = (
        f64::from(r.left),
        f64::from(r.top),
        f64::from(r.right),
        f64::from(r.bottom),
    );

    let out = match rotation {
        Rotation::None => Rect::new(
            round_half_up(l * w / sw),
            round_half_up(t * h / sh),
            round_half_up(rr * w / sw),
            round_half_up(b * h / sh),
        ),
        Rotation::Cw90 => Rect::new(
            round_half_up(w - b * w / sh),
            round_half_up(l * h / sw),
            round_half_up(w - t * w / sh),
            round_half_up(rr * h / sw),
        ),
        Rotation::Half => Rect::new(
            round_half_up(w - rr * w / sw),
            round_half_up(h - b * h / sh),
            round_half_up(w - l * w / sw),
            round_half_up(h - t * h / sh),
        ),
        Rotation::Ccw90 => Rect::new(
            round_half_up(t * w / sh),
            round_half_up(h - rr * h / sw),
            round_half_up(b * w / sh),
            round_half_up(h - l * h / sw),
        ),
    };
    out.clamp_to(disp_w, disp_h)
}

/// Inverse of [`to_screen`]: maps a display rectangle back into source pixels.
pub fn to_source(
    screen: Rect,
    rotation: Rotation,
    disp_w: i32,
    disp_h: i32,
    src_w: i32,
    src_h: i32,
) -> Rect {
    let w = f64::from(disp_w.max(1));
    let h = f64::from(disp_h.max(1));
    let sw = f64::from(src_w);
    let sh = f64::from(src_h);
    let (l, t, r, b) = (
        f64::from(screen.left),
        f64::from(screen.top),
        f64::from(screen.right),
        f64::from(screen.bottom),
    );

    let out = match rotation {
        Rotation::None => Rect::new(
            round_half_up(l * sw / w),
            round_half_up(t * sh / h),
            round_half_up(r * sw / w),
            round_half_up(b * sh / h),
        ),
        Rotation::Cw90 => Rect::new(
            round_half_up(t * sw / h),
            round_half_up(sh - r * sh / w),
            round_half_up(b * sw / h),
            round_half_up(sh - l * sh / w),
        ),
        Rotation::Half => Rect::new(
            round_half_up(sw - r * sw / w),
            round_half_up(sh - b * sh / h),
            round_half_up(sw - l * sw / w),
            round_half_up(sh - t * sh / h),
        ),
        Rotation::Ccw90 => Rect::new(
            round_half_up(sw - b * sw / h),
            round_half_up(l * sh / w),
            round_half_up(sw - t * sw / h),
            round_half_up(r * sh / w),
        ),
    };
    out.clamp_to(src_w, src_h)
}

/// Largest `w x h` with the aspect of `src_w x src_h` that fits in the
/// destination box. May enlarge; used for on-screen layout only.
pub fn fit_centered(src_w: i32, src_h: i32, dest_w: i32, dest_h: i32) -> (i32, i32) {
    let (sw, sh) = (i64::from(src_w), i64::from(src_h));
    let (dw, dh) = (i64::from(dest_w), i64::from(dest_h));
    if sw * dh > dw * sh {
        (dest_w, (dw * sh / sw.max(1)) as i32)
    } else {
        ((dh * sw / sh.max(1)) as i32, dest_h)
    }
}

/// Index of the slot nearest to `(x, y)`.
///
/// A slot containing the point wins outright; otherwise slots on the same
/// row are preferred by horizontal distance, then everything else by
/// squared Euclidean distance. Points outside `container` match nothing.
pub fn nearest_slot(container: Rect, slots: &[Rect], x: i32, y: i32) -> Option<usize> {
    if x < container.left || y < container.top || x >= container.right || y >= container.bottom {
        return None;
    }

    let mut same_row: Option<(usize, i64)> = None;
    let mut elsewhere: Option<(usize, i64)> = None;

    for (idx, r) in slots.iter().enumerate() {
        let ydiff = if y < r.top {
            r.top - y
        } else if y > r.bottom {
            y - r.bottom
        } else {
            0
        };
        let xdiff = if x < r.left {
            r.left - x
        } else if x > r.right {
            x - r.right
        } else {
            0
        };

        if ydiff == 0 {
            if xdiff == 0 {
                return Some(idx);
            }
            let d = i64::from(xdiff);
            if same_row.is_none_or(|(_, best)| d < best) {
                same_row = Some((idx, d));
            }
        } else {
            let d = i64::from(ydiff) * i64::from(ydiff) + i64::from(xdiff) * i64::from(xdiff);
            if elsewhere.is_none_or(|(_, best)| d < best) {
                elsewhere = Some((idx, d));
            }
        }
    }

    same_row.or(elsewhere).map(|(idx, _)| idx)
}

/// Insertion index for dropping the slot `own` at `(x, y)`, in terms of the
/// list as it is before the move. `None` when the point resolves to the
/// dragged slot itself or to nothing.
pub fn drop_index(container: Rect, slots: &[Rect], own: usize, x: i32, y: i32) -> Option<usize> {
    let idx = nearest_slot(container, slots, x, y)?;
    if idx == own {
        return None;
    }
    let r = slots[idx];
    if x >= r.left + r.width() / 2 {
        Some(idx + 1)
    } else {
        Some(idx)
    }
}
