use std::ops::BitOr;

use crate::geometry::{self, Point, Rect};
use crate::state::EditMode;
use crate::surface::Surface;
use crate::widget::{ButtonKind, Command, EventContext, PointerEvent, Response, Widget};

use super::ImageRecord;

/// Half-width of the grab band around each crop edge, in pixels.
const EDGE_TOLERANCE: i32 = 3;

/// Set of crop edges moved by a drag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeMask(u8);

impl EdgeMask {
    pub const NONE: EdgeMask = EdgeMask(0);
    pub const LEFT: EdgeMask = EdgeMask(1);
    pub const TOP: EdgeMask = EdgeMask(2);
    pub const RIGHT: EdgeMask = EdgeMask(4);
    pub const BOTTOM: EdgeMask = EdgeMask(8);
    pub const ALL: EdgeMask = EdgeMask(0xf);

    pub fn contains(self, other: EdgeMask) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn intersects(self, other: EdgeMask) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for EdgeMask {
    type Output = EdgeMask;

    fn bitor(self, rhs: EdgeMask) -> EdgeMask {
        EdgeMask(self.0 | rhs.0)
    }
}

/// What the record is tracking between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Capture {
    #[default]
    None,
    /// Index into the record's buttons.
    Button(usize),
    /// Dragging individual crop edges. `anchor` is the pointer's offset from
    /// the grabbed edges.
    CropEdges { mask: EdgeMask, anchor: Point },
    /// Moving the whole crop rectangle.
    CropMove { anchor: Point },
    /// Dragging the record to a new list position.
    DragImage { hover: Option<usize> },
}

impl Capture {
    pub fn is_drag_image(&self) -> bool {
        matches!(self, Capture::DragImage { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Arrow,
    Move,
    ResizeHorizontal,
    ResizeVertical,
    /// Diagonal running from top-left to bottom-right.
    ResizeNwSe,
    /// Diagonal running from top-right to bottom-left.
    ResizeNeSw,
}

fn near(v: i32, edge: i32) -> bool {
    v >= edge - EDGE_TOLERANCE && v <= edge + EDGE_TOLERANCE
}

/// Edges grabbed by a pointer at `(x, y)` against crop rectangle `cr`.
/// The interior of the rectangle, or a rectangle small enough that every
/// edge is in reach, grabs all four.
fn crop_hit(cr: Rect, x: i32, y: i32) -> EdgeMask {
    let mut mask = EdgeMask::NONE;
    let mut inside = 0;

    if y >= cr.top - EDGE_TOLERANCE && y <= cr.bottom + EDGE_TOLERANCE {
        if near(x, cr.left) {
            mask = mask | EdgeMask::LEFT;
        } else if near(x, cr.right) {
            mask = mask | EdgeMask::RIGHT;
        } else {
            inside |= 1;
        }
    }
    if x >= cr.left - EDGE_TOLERANCE && x <= cr.right + EDGE_TOLERANCE {
        if near(y, cr.top) {
            mask = mask | EdgeMask::TOP;
        } else if near(y, cr.bottom) {
            mask = mask | EdgeMask::BOTTOM;
        } else {
            inside |= 2;
        }
    }

    let every_edge = near(x, cr.left) && near(x, cr.right) && near(y, cr.top) && near(y, cr.bottom);
    if inside == 3 || every_edge {
        EdgeMask::ALL
    } else {
        mask
    }
}

/// Rounding into source pixels can collapse a dragged edge onto its
/// opposite. Pushes the edge that moved away from `prev` back so each axis
/// keeps at least one source pixel.
fn keep_one_pixel(mut crop: Rect, prev: Rect) -> Rect {
    if crop.left >= crop.right {
        if crop.left != prev.left {
            crop.left = crop.right - 1;
        } else {
            crop.right = crop.left + 1;
        }
    }
    if crop.top >= crop.bottom {
        if crop.top != prev.top {
            crop.top = crop.bottom - 1;
        } else {
            crop.bottom = crop.top + 1;
        }
    }
    crop
}

impl ImageRecord {
    fn origin(&self) -> Point {
        Point::new(self.position.left, self.position.top)
    }

    fn crop_handles_live(&self) -> bool {
        self.edit_mode == EditMode::Crop && !self.last_draw_rect.is_degenerate()
    }

    fn button_at(&self, x: i32, y: i32) -> Option<usize> {
        self.buttons.iter().position(|b| b.hit_test(x, y))
    }

    fn activate(&mut self, kind: ButtonKind) -> Response {
        match kind {
            ButtonKind::Fullscreen => Response::redraw().merge(Response::command(Command::ToggleFullscreen)),
            ButtonKind::RotateCcw => self.rotate(-1),
            ButtonKind::RotateCw => self.rotate(1),
            ButtonKind::Crop => self.toggle_crop_mode(),
            ButtonKind::Grayscale => self.toggle_grayscale(),
            ButtonKind::Remove => Response::command(Command::Remove),
        }
    }

    fn drag_crop(&mut self, mask: EdgeMask, anchor: Point, x: i32, y: i32) -> Response {
        let draw = self.last_draw_rect;
        let (dw, dh) = (draw.width(), draw.height());
        let mut r = self.crop_for_screen(dw, dh);

        if mask == EdgeMask::ALL {
            let mut dx = (x - anchor.x) - r.left - draw.left;
            if r.left + dx < 0 {
                dx = -r.left;
            } else if r.right + dx > dw {
                dx = dw - r.right;
            }
            let mut dy = (y - anchor.y) - r.top - draw.top;
            if r.top + dy < 0 {
                dy = -r.top;
            } else if r.bottom + dy > dh {
                dy = dh - r.bottom;
            }
            r = r.offset(dx, dy);
        } else {
            let ex = x - anchor.x - draw.left;
            let ey = y - anchor.y - draw.top;
            // Edges stop one pixel short of crossing their opposite.
            if mask.contains(EdgeMask::LEFT) {
                r.left = ex.min(r.right - 1);
            }
            if mask.contains(EdgeMask::RIGHT) {
                r.right = ex.max(r.left + 1);
            }
            if mask.contains(EdgeMask::TOP) {
                r.top = ey.min(r.bottom - 1);
            }
            if mask.contains(EdgeMask::BOTTOM) {
                r.bottom = ey.max(r.top + 1);
            }
        }

        let (sw, sh) = (self.source_width, self.source_height);
        let crop = geometry::to_source(r, self.edit.rotation, dw, dh, sw, sh);
        let crop = keep_one_pixel(crop, self.edit.crop.resolve_full(sw, sh));
        if self.set_crop(crop) {
            Response::edited()
        } else {
            Response::ignored()
        }
    }

    /// Double-click anywhere but a button toggles fullscreen.
    pub fn double_click(&mut self, event: PointerEvent) -> Response {
        let local = event.relative_to(self.origin());
        if self.button_at(local.x, local.y).is_some() {
            return Response::ignored();
        }
        Response::redraw().merge(Response::command(Command::ToggleFullscreen))
    }

    /// Cursor to show at `(x, y)` in container coordinates.
    pub fn cursor_at(&self, x: i32, y: i32) -> CursorShape {
        let (lx, ly) = (x - self.position.left, y - self.position.top);
        if self.button_at(lx, ly).is_some() || !self.crop_handles_live() {
            return CursorShape::Arrow;
        }

        let mask = crop_hit(self.last_crop_draw_rect, lx, ly);
        let horizontal = EdgeMask::LEFT | EdgeMask::RIGHT;
        let vertical = EdgeMask::TOP | EdgeMask::BOTTOM;
        if mask == EdgeMask::ALL {
            CursorShape::Move
        } else if mask.intersects(horizontal) && mask.intersects(vertical) {
            if mask.contains(EdgeMask::LEFT) != mask.contains(EdgeMask::TOP) {
                CursorShape::ResizeNeSw
            } else {
                CursorShape::ResizeNwSe
            }
        } else if mask.intersects(horizontal) {
            CursorShape::ResizeHorizontal
        } else if mask.intersects(vertical) {
            CursorShape::ResizeVertical
        } else {
            CursorShape::Arrow
        }
    }
}

impl Widget for ImageRecord {
    fn bounds(&self) -> Rect {
        self.position
    }

    fn pointer_down(&mut self, event: PointerEvent, ctx: &EventContext<'_>) -> Response {
        let local = event.relative_to(self.origin());

        if let Some(idx) = self.button_at(local.x, local.y) {
            self.capture = Capture::Button(idx);
            return self.buttons[idx].pointer_down(local, ctx);
        }

        if self.last_label_rect.contains(local.x, local.y) {
            return Response::command(Command::EditLabel);
        }

        if self.crop_handles_live() {
            let cr = self.last_crop_draw_rect;
            let mask = crop_hit(cr, local.x, local.y);
            if !mask.is_empty() {
                let anchor = Point::new(
                    local.x - if mask.contains(EdgeMask::LEFT) { cr.left } else { cr.right },
                    local.y - if mask.contains(EdgeMask::TOP) { cr.top } else { cr.bottom },
                );
                self.capture = if mask == EdgeMask::ALL {
                    Capture::CropMove { anchor }
                } else {
                    Capture::CropEdges { mask, anchor }
                };
                return Response::capture();
            }
        }

        if !self.fullscreen {
            self.capture = Capture::DragImage { hover: None };
            return Response::capture();
        }
        Response::ignored()
    }

    fn pointer_move(&mut self, event: PointerEvent, ctx: &EventContext<'_>) -> Response {
        let local = event.relative_to(self.origin());
        match self.capture {
            Capture::None | Capture::Button(_) => Response::ignored(),
            Capture::CropMove { anchor } => self.drag_crop(EdgeMask::ALL, anchor, local.x, local.y),
            Capture::CropEdges { mask, anchor } => self.drag_crop(mask, anchor, local.x, local.y),
            Capture::DragImage { hover } => {
                if self.fullscreen {
                    return Response::ignored();
                }
                let target = geometry::drop_index(ctx.container, ctx.slots, ctx.index, event.x, event.y);
                if target == hover {
                    return Response::ignored();
                }
                self.capture = Capture::DragImage { hover: target };
                Response::redraw().merge(Response::command(Command::HoverSlot(target)))
            }
        }
    }

    fn pointer_up(&mut self, event: PointerEvent, ctx: &EventContext<'_>) -> Response {
        let local = event.relative_to(self.origin());
        match std::mem::take(&mut self.capture) {
            Capture::None => Response::ignored(),
            Capture::Button(idx) => {
                let Some(button) = self.buttons.get_mut(idx) else {
                    return Response::ignored();
                };
                let kind = button.kind;
                if button.release(local.x, local.y) {
                    self.activate(kind)
                } else {
                    Response::redraw()
                }
            }
            Capture::CropMove { .. } | Capture::CropEdges { .. } => Response::redraw(),
            Capture::DragImage { .. } => {
                if self.fullscreen {
                    return Response::redraw();
                }
                let cleared = Response::command(Command::HoverSlot(None));
                match geometry::drop_index(ctx.container, ctx.slots, ctx.index, event.x, event.y) {
                    Some(index) => Response::redraw().merge(Response::command(Command::Drop {
                        index,
                        duplicate: event.modifiers.duplicate,
                    })),
                    None => Response::redraw().merge(cleared),
                }
            }
        }
    }

    fn paint(&mut self, surface: &mut dyn Surface, origin: Point) {
        self.paint_record(surface, origin);
    }
}
