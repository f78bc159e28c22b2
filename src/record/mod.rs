//! One entry of the image list: persisted edit parameters, decoded
//! bitmaps, render cache and the interactive state machines.

mod interaction;
mod paint;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

use crate::cache::RenderCache;
use crate::decode::{DecodeKind, Decoded};
use crate::geometry::{self, Rect};
use crate::state::{self, EditMode, EditState, LoadState};
use crate::widget::{Button, ButtonKind, Response, layout_buttons};

pub use interaction::{Capture, CursorShape, EdgeMask};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a record for as long as the process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(u64);

impl RecordId {
    fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Label used when the user has not named an image: the file name without
/// its last extension. A leading dot is kept as part of the name.
pub fn default_title(path: &str) -> String {
    let name = match path.rfind(['/', '\\']) {
        Some(pos) => &path[pos + 1..],
        None => path,
    };
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[..dot].to_string(),
        _ => name.to_string(),
    }
}

#[derive(Debug)]
pub struct ImageRecord {
    id: RecordId,
    source_path: PathBuf,
    display_name: String,
    source_width: i32,
    source_height: i32,
    edit: EditState,
    edit_mode: EditMode,
    load_state: LoadState,
    fullscreen: bool,
    file_timestamp: Option<i64>,
    preview: Option<Arc<RgbaImage>>,
    full_image: Option<Arc<RgbaImage>>,
    cache: RenderCache,
    capture: Capture,
    /// Bounds in the container's coordinate space.
    position: Rect,
    buttons: Vec<Button>,
    // Record-local rectangles from the last paint, used for hit testing.
    last_draw_rect: Rect,
    last_crop_draw_rect: Rect,
    last_label_rect: Rect,
}

impl ImageRecord {
    /// New record for a freshly imported image file. Its EXIF orientation is
    /// applied once the first decode completes.
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let edit = EditState {
            need_rot_check: true,
            ..EditState::default()
        };
        Self::with_edit(source_path, edit)
    }

    pub fn with_edit(source_path: impl Into<PathBuf>, edit: EditState) -> Self {
        let source_path = source_path.into();
        let display_name = default_title(&source_path.to_string_lossy());
        let mut record = Self {
            id: RecordId::next(),
            source_path,
            display_name,
            source_width: 0,
            source_height: 0,
            edit,
            edit_mode: EditMode::None,
            load_state: LoadState::NotLoaded,
            fullscreen: false,
            file_timestamp: None,
            preview: None,
            full_image: None,
            cache: RenderCache::new(),
            capture: Capture::None,
            position: Rect::default(),
            buttons: ButtonKind::ALL.iter().copied().map(Button::new).collect(),
            last_draw_rect: Rect::default(),
            last_crop_draw_rect: Rect::default(),
            last_label_rect: Rect::default(),
        };
        record.sync_buttons();
        record
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns whether the name changed.
    pub fn set_display_name(&mut self, name: &str) -> bool {
        if self.display_name == name {
            return false;
        }
        self.display_name = name.to_string();
        true
    }

    pub fn source_size(&self) -> (i32, i32) {
        (self.source_width, self.source_height)
    }

    pub fn edit(&self) -> &EditState {
        &self.edit
    }

    pub fn edit_mode(&self) -> EditMode {
        self.edit_mode
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn file_timestamp(&self) -> Option<i64> {
        self.file_timestamp
    }

    pub fn set_file_timestamp(&mut self, ts: Option<i64>) {
        self.file_timestamp = ts.filter(|&t| t != 0);
    }

    pub fn preview(&self) -> Option<&Arc<RgbaImage>> {
        self.preview.as_ref()
    }

    pub fn full_image(&self) -> Option<&Arc<RgbaImage>> {
        self.full_image.as_ref()
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn position(&self) -> Rect {
        self.position
    }

    pub fn buttons(&self) -> &[Button] {
        &self.buttons
    }

    pub fn button(&self, kind: ButtonKind) -> Option<&Button> {
        self.buttons.iter().find(|b| b.kind == kind)
    }

    pub fn last_draw_rect(&self) -> Rect {
        self.last_draw_rect
    }

    pub fn last_crop_draw_rect(&self) -> Rect {
        self.last_crop_draw_rect
    }

    pub fn last_label_rect(&self) -> Rect {
        self.last_label_rect
    }

    /// Moves the record; buttons are laid out again when the size changes.
    pub fn set_position(&mut self, rect: Rect) {
        if rect.width() != self.position.width() || rect.height() != self.position.height() {
            layout_buttons(&mut self.buttons, rect.width());
        }
        self.position = rect;
    }

    fn sync_buttons(&mut self) {
        let (fullscreen, crop, gray) = (
            self.fullscreen,
            self.edit_mode == EditMode::Crop,
            self.edit.grayscale,
        );
        for b in &mut self.buttons {
            match b.kind {
                ButtonKind::Fullscreen => b.checked = fullscreen,
                ButtonKind::Crop => b.checked = crop,
                ButtonKind::Grayscale => b.checked = gray,
                ButtonKind::Remove => b.visible = !fullscreen,
                ButtonKind::RotateCcw | ButtonKind::RotateCw => {}
            }
        }
    }

    /// Sets the crop from a rectangle drawn on a `disp_w x disp_h` view.
    /// Returns whether the stored crop changed.
    pub fn set_crop_from_screen(&mut self, disp_w: i32, disp_h: i32, screen: Rect) -> bool {
        let crop = geometry::to_source(
            screen,
            self.edit.rotation,
            disp_w,
            disp_h,
            self.source_width,
            self.source_height,
        );
        if crop == self.edit.crop {
            return false;
        }
        self.edit.crop = crop;
        self.cache.invalidate();
        true
    }

    /// Current crop as it appears on a `disp_w x disp_h` view.
    pub fn crop_for_screen(&self, disp_w: i32, disp_h: i32) -> Rect {
        geometry::to_screen(
            self.edit.crop,
            self.edit.rotation,
            self.source_width,
            self.source_height,
            disp_w,
            disp_h,
        )
    }

    /// Replaces the stored crop directly, in source pixels.
    pub fn set_crop(&mut self, crop: Rect) -> bool {
        let crop = if crop.is_degenerate() {
            crop
        } else {
            crop.clamp_to(self.source_width, self.source_height)
        };
        if crop == self.edit.crop {
            return false;
        }
        self.edit.crop = crop;
        self.cache.invalidate();
        true
    }

    pub fn toggle_grayscale(&mut self) -> Response {
        self.edit.grayscale = !self.edit.grayscale;
        self.cache.invalidate();
        self.sync_buttons();
        Response::edited()
    }

    /// Rotates by `delta` quarter turns clockwise (negative turns counter-clockwise).
    pub fn rotate(&mut self, delta: i32) -> Response {
        self.edit.rotation = self.edit.rotation.rotated(delta);
        self.cache.invalidate();
        Response::edited()
    }

    pub fn toggle_crop_mode(&mut self) -> Response {
        let mode = match self.edit_mode {
            EditMode::Crop => EditMode::None,
            EditMode::None => EditMode::Crop,
        };
        self.set_edit_mode(mode);
        Response::edited()
    }

    pub fn set_edit_mode(&mut self, mode: EditMode) {
        if self.edit_mode == mode {
            return;
        }
        self.edit_mode = mode;
        if mode != EditMode::Crop {
            self.capture = Capture::None;
        }
        self.cache.invalidate();
        self.sync_buttons();
    }

    /// Returns whether the state changed. Leaving fullscreen releases the
    /// full-resolution bitmap and its cache.
    pub fn set_fullscreen(&mut self, on: bool) -> bool {
        if self.fullscreen == on {
            return false;
        }
        self.fullscreen = on;
        if !on {
            self.full_image = None;
            self.cache.discard();
        }
        if self.capture.is_drag_image() {
            self.capture = Capture::None;
        }
        self.sync_buttons();
        true
    }

    /// Fullscreen and still waiting on its full-resolution bitmap.
    pub fn wants_full_image(&self) -> bool {
        self.fullscreen && self.full_image.is_none() && self.load_state != LoadState::Failed
    }

    /// Copy sharing the persisted fields and the loaded preview. The render
    /// cache and any interaction in progress stay behind.
    pub fn duplicate(&self) -> ImageRecord {
        let mut rec = ImageRecord::with_edit(self.source_path.clone(), self.edit.clone());
        rec.display_name = self.display_name.clone();
        rec.source_width = self.source_width;
        rec.source_height = self.source_height;
        rec.file_timestamp = self.file_timestamp;
        if self.load_state == LoadState::Loaded {
            if let Some(preview) = &self.preview {
                rec.preview = Some(Arc::new(preview.as_ref().clone()));
                rec.load_state = LoadState::Loaded;
            }
        }
        rec.sync_buttons();
        rec
    }

    pub fn mark_decoding(&mut self) {
        if self.load_state == LoadState::NotLoaded {
            self.load_state = LoadState::Decoding;
        }
    }

    pub fn mark_failed(&mut self) -> Response {
        self.load_state = LoadState::Failed;
        Response::redraw()
    }

    /// Installs a finished decode. Folds in the EXIF orientation the first
    /// time the record sees one.
    pub fn install_decoded(&mut self, decoded: Decoded) -> Response {
        let mut response = Response::redraw();

        self.source_width = decoded.width as i32;
        self.source_height = decoded.height as i32;
        if decoded.modified.is_some() {
            self.set_file_timestamp(decoded.modified);
        }

        // Crops read from a list file were never checked against the image.
        if !self.edit.crop.is_degenerate() {
            let clamped = self.edit.crop.clamp_to(self.source_width, self.source_height);
            if clamped != self.edit.crop {
                self.edit.crop = clamped;
                self.cache.invalidate();
                response.dirty = true;
            }
        }

        if self.edit.need_rot_check {
            self.edit.need_rot_check = false;
            if let Some(rotation) = decoded.orientation {
                self.edit.rotation = rotation;
            }
            self.cache.invalidate();
            response.dirty = true;
        }

        match decoded.kind {
            DecodeKind::Preview => {
                self.preview = Some(Arc::new(decoded.bitmap));
            }
            DecodeKind::Full => {
                if self.fullscreen {
                    self.full_image = Some(Arc::new(decoded.bitmap));
                    self.cache.invalidate();
                } else {
                    tracing::debug!(path = %self.source_path.display(), "dropping full image, record left fullscreen");
                }
            }
        }
        self.load_state = LoadState::Loaded;
        response
    }

    /// `WxH` or `WxH cropped to WxH` for this record.
    pub fn size_info(&self) -> String {
        state::size_info(&self.edit, self.source_width, self.source_height)
    }

    /// Tooltip for a point in container coordinates. `index`/`count` give
    /// the record's place in the list for the label tooltip.
    pub fn tooltip_at(&self, x: i32, y: i32, index: usize, count: usize) -> Option<String> {
        let (lx, ly) = (x - self.position.left, y - self.position.top);
        if let Some(button) = self.buttons.iter().find(|b| b.visible && b.rect.contains(lx, ly)) {
            let mut text = button.tooltip().to_string();
            if button.kind == ButtonKind::Crop {
                text.push_str(&format!(" [image: {}]", self.size_info()));
            }
            return Some(text);
        }
        if self.last_label_rect.contains(lx, ly) {
            return Some(format!(
                "Image #{}/{} [{}], source filename: {}",
                index + 1,
                count,
                self.size_info(),
                self.source_path.display()
            ));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use image::{ImageBuffer, Rgba};

    use super::*;
    use crate::geometry::{Point, Rotation};
    use crate::surface::Canvas;
    use crate::widget::Widget;

    pub(crate) fn loaded(w: u32, h: u32) -> ImageRecord {
        let mut rec = ImageRecord::with_edit("/photos/beach.jpg", EditState::default());
        rec.install_decoded(Decoded {
            kind: DecodeKind::Preview,
            bitmap: ImageBuffer::from_pixel(w, h, Rgba([90, 120, 150, 255])),
            width: w,
            height: h,
            orientation: None,
            modified: Some(1_700_000_000),
        });
        rec
    }

    #[test]
    fn stored_crop_is_clamped_to_decoded_size() {
        let edit = EditState {
            crop: Rect::new(-20, 0, 5000, 5000),
            ..EditState::default()
        };
        let mut rec = ImageRecord::with_edit("/photos/beach.jpg", edit);
        let resp = rec.install_decoded(Decoded {
            kind: DecodeKind::Preview,
            bitmap: ImageBuffer::from_pixel(80, 60, Rgba([0, 0, 0, 255])),
            width: 80,
            height: 60,
            orientation: None,
            modified: None,
        });
        assert!(resp.dirty);
        assert_eq!(rec.edit().crop, Rect::new(0, 0, 80, 60));
        assert_eq!(rec.size_info(), "80x60");

        let mut inside = loaded(80, 60);
        inside.set_crop(Rect::new(10, 10, 40, 40));
        let resp = inside.install_decoded(Decoded {
            kind: DecodeKind::Preview,
            bitmap: ImageBuffer::from_pixel(80, 60, Rgba([0, 0, 0, 255])),
            width: 80,
            height: 60,
            orientation: None,
            modified: None,
        });
        assert!(!resp.dirty);
        assert_eq!(inside.edit().crop, Rect::new(10, 10, 40, 40));
    }

    #[test]
    fn default_title_strips_directory_and_extension() {
        assert_eq!(default_title("/a/b/IMG_001.JPG"), "IMG_001");
        assert_eq!(default_title("C:\\pics\\x.y.png"), "x.y");
        assert_eq!(default_title("noext"), "noext");
        assert_eq!(default_title("/a/.hidden"), ".hidden");
    }

    #[test]
    fn new_record_waits_for_rotation_check() {
        let rec = ImageRecord::new("/photos/beach.jpg");
        assert!(rec.edit().need_rot_check);
        assert_eq!(rec.display_name(), "beach");
        assert_eq!(rec.load_state(), LoadState::NotLoaded);
    }

    #[test]
    fn exif_orientation_applies_once() {
        let mut rec = ImageRecord::new("/photos/beach.jpg");
        let decoded = Decoded {
            kind: DecodeKind::Preview,
            bitmap: ImageBuffer::from_pixel(4, 2, Rgba([0, 0, 0, 255])),
            width: 4,
            height: 2,
            orientation: Some(Rotation::Cw90),
            modified: None,
        };
        let resp = rec.install_decoded(decoded.clone());
        assert!(resp.dirty);
        assert_eq!(rec.edit().rotation, Rotation::Cw90);
        assert!(!rec.edit().need_rot_check);

        rec.rotate(1);
        let resp = rec.install_decoded(decoded);
        assert!(!resp.dirty);
        assert_eq!(rec.edit().rotation, Rotation::Half);
    }

    #[test]
    fn crop_from_out_of_bounds_screen_rect_is_clamped() {
        let mut rec = loaded(800, 600);
        assert!(rec.set_crop_from_screen(400, 300, Rect::new(-20, 10, 200, 150)));
        let crop = rec.edit().crop;
        assert_eq!(crop.left, 0);
        assert_eq!(crop.top, 20);
        assert_eq!(crop.right, 400);
        assert_eq!(crop.bottom, 300);
        assert!(!rec.set_crop_from_screen(400, 300, Rect::new(-20, 10, 200, 150)));
    }

    #[test]
    fn crop_for_screen_resolves_no_crop_to_full_view() {
        let rec = loaded(800, 600);
        assert_eq!(rec.crop_for_screen(400, 300), Rect::new(0, 0, 400, 300));
    }

    #[test]
    fn rotation_wraps() {
        let mut rec = loaded(10, 10);
        rec.rotate(-1);
        assert_eq!(rec.edit().rotation, Rotation::Ccw90);
        rec.rotate(1);
        rec.rotate(1);
        assert_eq!(rec.edit().rotation, Rotation::Cw90);
    }

    #[test]
    fn toggles_report_dirty_and_sync_buttons() {
        let mut rec = loaded(10, 10);
        let resp = rec.toggle_grayscale();
        assert!(resp.dirty && resp.redraw);
        assert!(rec.button(ButtonKind::Grayscale).is_some_and(|b| b.checked));
        rec.toggle_crop_mode();
        assert_eq!(rec.edit_mode(), EditMode::Crop);
        assert!(rec.button(ButtonKind::Crop).is_some_and(|b| b.checked));
    }

    #[test]
    fn fullscreen_is_idempotent_and_hides_remove() {
        let mut rec = loaded(10, 10);
        assert!(rec.set_fullscreen(true));
        assert!(!rec.set_fullscreen(true));
        assert!(rec.button(ButtonKind::Remove).is_some_and(|b| !b.visible));
        assert!(rec.wants_full_image());
        assert!(rec.set_fullscreen(false));
        assert!(rec.button(ButtonKind::Remove).is_some_and(|b| b.visible));
    }

    #[test]
    fn full_image_for_record_that_left_fullscreen_is_dropped() {
        let mut rec = loaded(10, 10);
        rec.install_decoded(Decoded {
            kind: DecodeKind::Full,
            bitmap: ImageBuffer::from_pixel(10, 10, Rgba([0, 0, 0, 255])),
            width: 10,
            height: 10,
            orientation: None,
            modified: None,
        });
        assert!(rec.full_image().is_none());
    }

    #[test]
    fn duplicate_is_independent() {
        let mut original = loaded(800, 600);
        original.set_display_name("Beach day");
        original.set_crop(Rect::new(10, 10, 500, 400));
        original.toggle_crop_mode();

        let mut copy = original.duplicate();
        assert_ne!(copy.id(), original.id());
        assert_eq!(copy.display_name(), "Beach day");
        assert_eq!(copy.edit(), original.edit());
        assert_eq!(copy.edit_mode(), EditMode::None);
        assert_eq!(copy.load_state(), LoadState::Loaded);
        assert_eq!(copy.file_timestamp(), Some(1_700_000_000));
        assert!(!copy.cache().is_valid());

        copy.rotate(1);
        copy.set_crop(Rect::new(0, 0, 100, 100));
        assert_eq!(original.edit().rotation, Rotation::None);
        assert_eq!(original.edit().crop, Rect::new(10, 10, 500, 400));
    }

    #[test]
    fn size_info_reports_crop() {
        let mut rec = loaded(800, 600);
        assert_eq!(rec.size_info(), "800x600");
        rec.set_crop(Rect::new(0, 0, 400, 600));
        assert_eq!(rec.size_info(), "800x600 cropped to 400x600");
    }

    #[test]
    fn tooltips_for_buttons_and_label() {
        let mut rec = loaded(800, 600);
        rec.set_position(Rect::new(100, 100, 400, 340));
        let crop = rec.button(ButtonKind::Crop).map(|b| b.rect).unwrap_or_default();
        let tip = rec.tooltip_at(100 + crop.left + 1, 100 + crop.top + 1, 0, 3);
        assert_eq!(tip.as_deref(), Some("Crop [image: 800x600]"));
        assert_eq!(rec.tooltip_at(250, 200, 0, 3), None);

        let cw = rec.button(ButtonKind::RotateCw).map(|b| b.rect).unwrap_or_default();
        let tip = rec.tooltip_at(100 + cw.left + 1, 100 + cw.top + 1, 0, 3);
        assert_eq!(tip.as_deref(), Some("Rotate image clockwise"));

        rec.toggle_grayscale();
        let gray = rec.button(ButtonKind::Grayscale).map(|b| b.rect).unwrap_or_default();
        let tip = rec.tooltip_at(100 + gray.left + 1, 100 + gray.top + 1, 0, 3);
        assert_eq!(tip.as_deref(), Some("Remove black & white"));
    }

    #[test]
    fn label_tooltip_names_position_size_and_file() {
        let mut rec = loaded(800, 600);
        rec.set_position(Rect::new(100, 100, 400, 340));
        rec.set_crop(Rect::new(0, 0, 400, 600));
        let mut canvas = Canvas::new(500, 400);
        rec.paint(&mut canvas, Point::new(0, 0));

        let label = rec.last_label_rect();
        let (x, y) = (100 + label.left + 1, 100 + label.top + 1);
        assert_eq!(
            rec.tooltip_at(x, y, 1, 3).as_deref(),
            Some("Image #2/3 [800x600 cropped to 400x600], source filename: /photos/beach.jpg")
        );
    }
}
