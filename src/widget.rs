//! Node capability interface for the interactive view tree.
//!
//! The session owns records, records own their buttons. Events flow down as
//! [`PointerEvent`]s and results flow back up as [`Response`]s; structural
//! changes (remove, reorder, fullscreen) are returned as [`Command`]s for the
//! owner to apply, never performed by the node itself.

use image::Rgba;

use crate::geometry::{Point, Rect};
use crate::surface::{Surface, TextAlign, rgba};

pub const BUTTON_SIZE: i32 = 16;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Held while dropping to insert a copy instead of moving.
    pub duplicate: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PointerEvent {
    pub x: i32,
    pub y: i32,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            x,
            y,
            modifiers: Modifiers::default(),
        }
    }

    pub fn with_duplicate(mut self) -> Self {
        self.modifiers.duplicate = true;
        self
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Same event expressed relative to `origin`.
    pub fn relative_to(&self, origin: Point) -> Self {
        Self {
            x: self.x - origin.x,
            y: self.y - origin.y,
            modifiers: self.modifiers,
        }
    }
}

/// Sibling layout a record needs for drag-to-reorder.
#[derive(Debug, Clone, Copy)]
pub struct EventContext<'a> {
    pub container: Rect,
    pub slots: &'a [Rect],
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonKind {
    Fullscreen,
    RotateCcw,
    RotateCw,
    Crop,
    Grayscale,
    Remove,
}

impl ButtonKind {
    pub const ALL: [ButtonKind; 6] = [
        ButtonKind::Fullscreen,
        ButtonKind::RotateCcw,
        ButtonKind::RotateCw,
        ButtonKind::Crop,
        ButtonKind::Grayscale,
        ButtonKind::Remove,
    ];

    /// Tooltip text; `checked` is the button's current toggle state.
    pub fn tooltip(self, checked: bool) -> &'static str {
        match (self, checked) {
            (ButtonKind::Fullscreen, true) => "Leave fullscreen",
            (ButtonKind::Fullscreen, false) => "View image in fullscreen",
            (ButtonKind::RotateCcw, _) => "Rotate image counter-clockwise",
            (ButtonKind::RotateCw, _) => "Rotate image clockwise",
            (ButtonKind::Crop, true) => "Leave crop mode",
            (ButtonKind::Crop, false) => "Crop",
            (ButtonKind::Grayscale, true) => "Remove black & white",
            (ButtonKind::Grayscale, false) => "Set black & white",
            (ButtonKind::Remove, _) => "Remove image from list",
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            ButtonKind::Fullscreen => "F",
            ButtonKind::RotateCcw => "<",
            ButtonKind::RotateCw => ">",
            ButtonKind::Crop => "C",
            ButtonKind::Grayscale => "B",
            ButtonKind::Remove => "X",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ToggleFullscreen,
    Remove,
    EditLabel,
    /// Prospective insertion slot while dragging, for highlighting.
    HoverSlot(Option<usize>),
    /// Drop at `index`, counted in the list as it was before the drag.
    Drop { index: usize, duplicate: bool },
}

/// Outcome of an event delivered to a node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    /// The node wants the following move/up events.
    pub captured: bool,
    pub redraw: bool,
    /// A persisted field changed.
    pub dirty: bool,
    pub command: Option<Command>,
}

impl Response {
    pub fn ignored() -> Self {
        Self::default()
    }

    pub fn capture() -> Self {
        Self {
            captured: true,
            ..Self::default()
        }
    }

    pub fn redraw() -> Self {
        Self {
            redraw: true,
            ..Self::default()
        }
    }

    pub fn edited() -> Self {
        Self {
            redraw: true,
            dirty: true,
            ..Self::default()
        }
    }

    pub fn command(command: Command) -> Self {
        Self {
            command: Some(command),
            ..Self::default()
        }
    }

    /// Combines two responses; the later command wins.
    pub fn merge(mut self, other: Response) -> Self {
        self.captured |= other.captured;
        self.redraw |= other.redraw;
        self.dirty |= other.dirty;
        if other.command.is_some() {
            self.command = other.command;
        }
        self
    }
}

/// Interactive node. Coordinates passed in are relative to the node's parent.
pub trait Widget {
    fn bounds(&self) -> Rect;

    fn hit_test(&self, x: i32, y: i32) -> bool {
        self.bounds().contains(x, y)
    }

    fn pointer_down(&mut self, event: PointerEvent, ctx: &EventContext<'_>) -> Response;
    fn pointer_move(&mut self, event: PointerEvent, ctx: &EventContext<'_>) -> Response;
    fn pointer_up(&mut self, event: PointerEvent, ctx: &EventContext<'_>) -> Response;

    /// Paints the node; `origin` is the parent's position on the surface.
    fn paint(&mut self, surface: &mut dyn Surface, origin: Point);
}

/// Child button of a record. Activates on press plus release inside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub kind: ButtonKind,
    pub rect: Rect,
    pub visible: bool,
    pub checked: bool,
    pressed: bool,
}

impl Button {
    pub fn new(kind: ButtonKind) -> Self {
        Self {
            kind,
            rect: Rect::default(),
            visible: true,
            checked: false,
            pressed: false,
        }
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn tooltip(&self) -> &'static str {
        self.kind.tooltip(self.checked)
    }

    /// Ends a press; returns whether the release landed inside.
    pub fn release(&mut self, x: i32, y: i32) -> bool {
        let was_pressed = self.pressed;
        self.pressed = false;
        was_pressed && self.rect.contains(x, y)
    }
}

impl Widget for Button {
    fn bounds(&self) -> Rect {
        self.rect
    }

    fn hit_test(&self, x: i32, y: i32) -> bool {
        self.visible && self.rect.contains(x, y)
    }

    fn pointer_down(&mut self, event: PointerEvent, _ctx: &EventContext<'_>) -> Response {
        if !self.hit_test(event.x, event.y) {
            return Response::ignored();
        }
        self.pressed = true;
        Response::capture().merge(Response::redraw())
    }

    fn pointer_move(&mut self, _event: PointerEvent, _ctx: &EventContext<'_>) -> Response {
        Response::ignored()
    }

    fn pointer_up(&mut self, event: PointerEvent, _ctx: &EventContext<'_>) -> Response {
        self.release(event.x, event.y);
        Response::redraw()
    }

    fn paint(&mut self, surface: &mut dyn Surface, origin: Point) {
        if !self.visible {
            return;
        }
        let r = self.rect.offset(origin.x, origin.y);
        let fill: Rgba<u8> = if self.pressed || self.checked {
            rgba(64, 64, 64, 0.75)
        } else {
            rgba(255, 255, 255, 0.5)
        };
        surface.fill_rect(r, fill);
        surface.outline_rect(r, rgba(0, 0, 0, 1.0));
        surface.draw_text(self.kind.glyph(), r, TextAlign::Center, rgba(0, 0, 0, 1.0));
    }
}

/// Lays out the record's buttons for a record `width` wide, in
/// [`ButtonKind::ALL`] order. Remove sits at the top right; the rest flow
/// from the top left and wrap before reaching it.
pub fn layout_buttons(buttons: &mut [Button], width: i32) {
    let mut xpos = 6;
    let mut toppos = 2;
    for button in buttons.iter_mut() {
        if button.kind == ButtonKind::Remove {
            button.rect = Rect::new(
                width - 4 - BUTTON_SIZE,
                2,
                width - 4,
                2 + BUTTON_SIZE,
            );
            continue;
        }
        if xpos > 6 && xpos + BUTTON_SIZE >= width - 4 - BUTTON_SIZE - 4 {
            xpos = 2;
            toppos += BUTTON_SIZE + 2;
        }
        button.rect = Rect::from_size(xpos, toppos, BUTTON_SIZE, BUTTON_SIZE);
        if matches!(button.kind, ButtonKind::Fullscreen | ButtonKind::Grayscale) {
            xpos += 8;
        }
        xpos += BUTTON_SIZE + 2;
    }
}
