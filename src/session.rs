//! The image list and everything global around it: the fullscreen record,
//! the project file and its dirty flag, background decodes and routing of
//! pointer events to the record under the pointer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::decode::DecodeKind;
use crate::geometry::{Point, Rect};
use crate::loader::{Completion, Loader};
use crate::project::{self, Entry};
use crate::record::{CursorShape, ImageRecord, RecordId};
use crate::state::{EditMode, LoadState};
use crate::surface::{Surface, rgba};
use crate::widget::{Command, EventContext, PointerEvent, Response, Widget};

pub const APP_NAME: &str = "SnapEase";

pub const CELL_WIDTH: i32 = 240;
pub const CELL_HEIGHT: i32 = 180;
pub const CELL_GAP: i32 = 8;

pub struct Session {
    records: Vec<ImageRecord>,
    fullscreen: Option<RecordId>,
    project_path: Option<PathBuf>,
    dirty: bool,
    /// Edit mode code written for lists with no fullscreen record.
    edit_mode_code: i32,
    loader: Loader,
    preview_max: u32,
    viewport: Rect,
    capture: Option<RecordId>,
    hover_slot: Option<usize>,
    label_edit: Option<RecordId>,
}

impl Session {
    pub fn new(preview_max: u32) -> Self {
        Self {
            records: Vec::new(),
            fullscreen: None,
            project_path: None,
            dirty: false,
            edit_mode_code: 0,
            loader: Loader::new(),
            preview_max,
            viewport: Rect::default(),
            capture: None,
            hover_slot: None,
            label_edit: None,
        }
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn index_of(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|r| r.id() == id)
    }

    pub fn find(&self, id: RecordId) -> Option<&ImageRecord> {
        self.records.iter().find(|r| r.id() == id)
    }

    pub fn find_mut(&mut self, id: RecordId) -> Option<&mut ImageRecord> {
        self.records.iter_mut().find(|r| r.id() == id)
    }

    pub fn fullscreen(&self) -> Option<RecordId> {
        self.fullscreen
    }

    pub fn project_path(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Prospective drop slot while a record is being dragged.
    pub fn hover_slot(&self) -> Option<usize> {
        self.hover_slot
    }

    /// Record whose label the user clicked, if any, clearing the request.
    pub fn take_label_edit(&mut self) -> Option<RecordId> {
        self.label_edit.take()
    }

    /// Unsaved changes worth prompting about: something is loaded or a
    /// project file is attached.
    pub fn needs_save(&self) -> bool {
        self.dirty && (!self.records.is_empty() || self.project_path.is_some())
    }

    pub fn caption(&self) -> String {
        match &self.project_path {
            Some(path) => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let modified = if self.dirty { " [modified]" } else { "" };
                format!("{stem}{modified} - {APP_NAME}")
            }
            None if self.needs_save() => format!("[unsaved image list] - {APP_NAME}"),
            None => APP_NAME.to_string(),
        }
    }

    /// Inserts `record` at `index` (the end when `None` or out of range) and
    /// starts decoding its preview if it has none.
    pub fn add(&mut self, mut record: ImageRecord, index: Option<usize>) -> RecordId {
        let id = record.id();
        let index = index.unwrap_or(self.records.len()).min(self.records.len());

        self.loader.register(id);
        if record.load_state() == LoadState::NotLoaded {
            self.loader.submit(
                id,
                record.source_path().to_path_buf(),
                DecodeKind::Preview,
                self.preview_max,
            );
            record.mark_decoding();
        }
        self.records.insert(index, record);
        self.dirty = true;
        self.layout();
        id
    }

    /// Adds a new record for an image file at the end of the list.
    pub fn import_path(&mut self, path: impl Into<PathBuf>) -> RecordId {
        self.add(ImageRecord::new(path), None)
    }

    pub fn remove(&mut self, id: RecordId) -> Option<ImageRecord> {
        let idx = self.index_of(id)?;
        self.loader.unregister(id);
        let record = self.records.remove(idx);
        if self.fullscreen == Some(id) {
            self.fullscreen = None;
        }
        if self.capture == Some(id) {
            self.capture = None;
            self.hover_slot = None;
        }
        if self.label_edit == Some(id) {
            self.label_edit = None;
        }
        self.dirty = true;
        self.layout();
        Some(record)
    }

    /// Moves a record so that it ends up at `new_index`.
    pub fn move_to(&mut self, id: RecordId, new_index: usize) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        let new_index = new_index.min(self.records.len() - 1);
        if new_index == idx {
            return false;
        }
        let record = self.records.remove(idx);
        self.records.insert(new_index, record);
        self.dirty = true;
        self.layout();
        true
    }

    /// Inserts a copy of a record at `new_index`.
    pub fn duplicate(&mut self, id: RecordId, new_index: usize) -> Option<RecordId> {
        let copy = self.find(id)?.duplicate();
        Some(self.add(copy, Some(new_index)))
    }

    pub fn clear(&mut self) {
        for record in &self.records {
            self.loader.unregister(record.id());
        }
        if !self.records.is_empty() {
            self.dirty = true;
        }
        self.records.clear();
        self.fullscreen = None;
        self.capture = None;
        self.hover_slot = None;
        self.label_edit = None;
    }

    /// Renames a record, marking the list dirty when the name changes.
    pub fn set_display_name(&mut self, id: RecordId, name: &str) -> bool {
        let changed = self.find_mut(id).is_some_and(|r| r.set_display_name(name));
        if changed {
            self.dirty = true;
        }
        changed
    }

    /// Runs an edit on one record and folds its response into the session.
    pub fn update<F>(&mut self, id: RecordId, edit: F) -> Option<Response>
    where
        F: FnOnce(&mut ImageRecord) -> Response,
    {
        let response = edit(self.find_mut(id)?);
        Some(self.apply(id, response))
    }

    /// Makes `target` the fullscreen record, or leaves fullscreen with `None`.
    pub fn set_fullscreen(&mut self, target: Option<RecordId>) -> bool {
        if self.fullscreen == target {
            return false;
        }
        if let Some(prev) = self.fullscreen.take() {
            if let Some(record) = self.find_mut(prev) {
                record.set_fullscreen(false);
            }
        }

        if let Some(id) = target {
            let preview_max = self.preview_max;
            let Some(record) = self.find_mut(id) else {
                self.layout();
                return true;
            };
            record.set_fullscreen(true);
            let wanted = record
                .wants_full_image()
                .then(|| record.source_path().to_path_buf());
            if let Some(path) = wanted {
                self.loader.submit(id, path, DecodeKind::Full, preview_max);
            }
            self.fullscreen = Some(id);
        }
        self.layout();
        true
    }

    /// Leaves fullscreen if anything is fullscreen, otherwise enters it on `id`.
    pub fn toggle_fullscreen(&mut self, id: RecordId) -> bool {
        if self.fullscreen.is_some() {
            self.set_fullscreen(None)
        } else {
            self.set_fullscreen(Some(id))
        }
    }

    /// Applies a record's response: dirty marking plus its command.
    pub fn apply(&mut self, id: RecordId, mut response: Response) -> Response {
        if response.dirty {
            self.dirty = true;
        }
        let Some(command) = response.command.take() else {
            return response;
        };
        match command {
            Command::ToggleFullscreen => {
                self.toggle_fullscreen(id);
            }
            Command::Remove => {
                if self.fullscreen.is_some() {
                    self.set_fullscreen(None);
                } else {
                    self.remove(id);
                }
            }
            Command::EditLabel => {
                self.label_edit = Some(id);
                response.command = Some(Command::EditLabel);
            }
            Command::HoverSlot(slot) => self.hover_slot = slot,
            Command::Drop { index, duplicate } => {
                self.hover_slot = None;
                if duplicate {
                    self.duplicate(id, index);
                } else if let Some(idx) = self.index_of(id) {
                    let target = if index > idx { index - 1 } else { index };
                    self.move_to(id, target);
                }
            }
        }
        response.redraw = true;
        response
    }

    /// Installs finished decodes without blocking. Returns how many landed.
    pub fn poll_decodes(&mut self) -> usize {
        let done = self.loader.drain();
        self.install_all(done)
    }

    /// Blocks until every pending decode has finished or `timeout` passes.
    pub fn wait_for_decodes(&mut self, timeout: Duration) -> usize {
        let done = self.loader.wait(timeout);
        self.install_all(done)
    }

    pub fn pending_decodes(&self) -> usize {
        self.loader.outstanding()
    }

    fn install_all(&mut self, done: Vec<Completion>) -> usize {
        let mut installed = 0;
        for completion in done {
            if self.install(completion) {
                installed += 1;
            }
        }
        installed
    }

    fn install(&mut self, completion: Completion) -> bool {
        let Completion { id, kind, result } = completion;
        if !self.loader.is_live(id) {
            return false;
        }
        let Some(record) = self.find_mut(id) else {
            return false;
        };
        let response = match result {
            Ok(decoded) => {
                tracing::debug!(path = %record.source_path().display(), ?kind, "decode installed");
                record.install_decoded(decoded)
            }
            Err(err) => {
                tracing::warn!(path = %record.source_path().display(), ?kind, "decode failed: {err:#}");
                record.mark_failed()
            }
        };
        if response.dirty {
            self.dirty = true;
        }
        true
    }

    fn current_edit_mode_code(&self) -> i32 {
        self.fullscreen
            .and_then(|id| self.find(id))
            .map_or(self.edit_mode_code, |r| r.edit_mode().code())
    }

    /// The list as it would be written to a project file.
    pub fn entries(&self) -> Vec<Entry> {
        let edit_mode = self.current_edit_mode_code();
        self.records
            .iter()
            .map(|r| Entry {
                path: r.source_path().to_path_buf(),
                display_name: r.display_name().to_string(),
                edit: r.edit().clone(),
                edit_mode,
                fullscreen: self.fullscreen == Some(r.id()),
                timestamp: r.file_timestamp(),
            })
            .collect()
    }

    /// Loads a list file. A fresh load replaces the current list and adopts
    /// the file as the project; `add` appends instead.
    ///
    /// A file that ends before its list is closed is an error, but the
    /// records read up to that point stay in the list.
    pub fn load_project(&mut self, path: &Path, add: bool) -> anyhow::Result<usize> {
        let parsed = project::read(path)?;

        if !add && parsed.found_list {
            self.clear();
        }

        let mut activate = None;
        let mut added = 0;
        for entry in parsed.entries {
            let mut record = ImageRecord::with_edit(entry.path, entry.edit);
            record.set_display_name(&entry.display_name);
            record.set_file_timestamp(entry.timestamp);

            let make_active = !add && entry.fullscreen && activate.is_none();
            if make_active {
                self.edit_mode_code = entry.edit_mode;
                record.set_edit_mode(EditMode::from_code(i64::from(entry.edit_mode)));
            }
            let id = self.add(record, None);
            if make_active {
                activate = Some(id);
            }
            added += 1;
        }

        if add {
            self.dirty = self.dirty || added > 0;
        } else {
            self.project_path = parsed.complete.then(|| path.to_path_buf());
            self.dirty = !parsed.complete;
        }
        self.set_fullscreen(activate);

        tracing::info!(path = %path.display(), added, complete = parsed.complete, "image list loaded");
        if !parsed.complete {
            anyhow::bail!(
                "image list {} is incomplete; {} image(s) were read",
                path.display(),
                added
            );
        }
        Ok(added)
    }

    /// Saves to `path`, or to the current project file when `None`. On
    /// failure the list stays dirty.
    pub fn save_project(&mut self, path: Option<&Path>) -> anyhow::Result<()> {
        let Some(path) = path.map(Path::to_path_buf).or_else(|| self.project_path.clone()) else {
            anyhow::bail!("no image list file to save to");
        };
        project::save(&path, &self.entries())?;
        tracing::info!(path = %path.display(), records = self.records.len(), "image list saved");
        self.project_path = Some(path);
        self.dirty = false;
        Ok(())
    }

    pub fn viewport(&self) -> Rect {
        self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Rect) {
        self.viewport = viewport;
        self.layout();
    }

    /// Positions records in a grid of fixed cells, or gives the whole
    /// viewport to the fullscreen record.
    fn layout(&mut self) {
        let vp = self.viewport;
        if let Some(fs) = self.fullscreen {
            for record in &mut self.records {
                let rect = if record.id() == fs { vp } else { Rect::default() };
                record.set_position(rect);
            }
            return;
        }
        let columns = ((vp.width() + CELL_GAP) / (CELL_WIDTH + CELL_GAP)).max(1);
        for (i, record) in self.records.iter_mut().enumerate() {
            let i = i as i32;
            let left = vp.left + (i % columns) * (CELL_WIDTH + CELL_GAP);
            let top = vp.top + (i / columns) * (CELL_HEIGHT + CELL_GAP);
            record.set_position(Rect::from_size(left, top, CELL_WIDTH, CELL_HEIGHT));
        }
    }

    fn slots(&self) -> Vec<Rect> {
        self.records.iter().map(|r| r.position()).collect()
    }

    fn record_at(&self, x: i32, y: i32) -> Option<usize> {
        self.records.iter().position(|r| r.hit_test(x, y))
    }

    fn dispatch<F>(&mut self, idx: usize, deliver: F) -> Response
    where
        F: FnOnce(&mut ImageRecord, &EventContext<'_>) -> Response,
    {
        let slots = self.slots();
        let ctx = EventContext {
            container: self.viewport,
            slots: &slots,
            index: idx,
        };
        let record = &mut self.records[idx];
        let id = record.id();
        let response = deliver(record, &ctx);
        if response.captured {
            self.capture = Some(id);
        }
        self.apply(id, response)
    }

    pub fn pointer_down(&mut self, event: PointerEvent) -> Response {
        let Some(idx) = self.record_at(event.x, event.y) else {
            return Response::ignored();
        };
        self.dispatch(idx, |r, ctx| r.pointer_down(event, ctx))
    }

    pub fn pointer_move(&mut self, event: PointerEvent) -> Response {
        let Some(idx) = self.capture.and_then(|id| self.index_of(id)) else {
            return Response::ignored();
        };
        self.dispatch(idx, |r, ctx| r.pointer_move(event, ctx))
    }

    pub fn pointer_up(&mut self, event: PointerEvent) -> Response {
        let Some(idx) = self.capture.take().and_then(|id| self.index_of(id)) else {
            return Response::ignored();
        };
        let response = self.dispatch(idx, |r, ctx| r.pointer_up(event, ctx));
        self.capture = None;
        response
    }

    pub fn double_click(&mut self, event: PointerEvent) -> Response {
        let Some(idx) = self.record_at(event.x, event.y) else {
            return Response::ignored();
        };
        self.dispatch(idx, |r, _| r.double_click(event))
    }

    pub fn tooltip_at(&self, x: i32, y: i32) -> Option<String> {
        let idx = self.record_at(x, y)?;
        self.records[idx].tooltip_at(x, y, idx, self.records.len())
    }

    pub fn cursor_at(&self, x: i32, y: i32) -> CursorShape {
        self.record_at(x, y)
            .map_or(CursorShape::Arrow, |idx| self.records[idx].cursor_at(x, y))
    }

    /// Paints every visible record and the drop marker while dragging.
    pub fn paint(&mut self, surface: &mut dyn Surface) {
        let origin = Point::new(0, 0);
        for record in &mut self.records {
            if record.position().is_degenerate() {
                continue;
            }
            record.paint(surface, origin);
        }

        let Some(slot) = self.hover_slot else {
            return;
        };
        let marker = match (self.records.get(slot), slot.checked_sub(1).and_then(|i| self.records.get(i))) {
            (Some(next), _) => {
                let r = next.position();
                Rect::new(r.left - CELL_GAP / 2 - 1, r.top, r.left - CELL_GAP / 2 + 1, r.bottom)
            }
            (None, Some(prev)) => {
                let r = prev.position();
                Rect::new(r.right + CELL_GAP / 2 - 1, r.top, r.right + CELL_GAP / 2 + 1, r.bottom)
            }
            (None, None) => return,
        };
        surface.fill_rect(marker, rgba(255, 255, 255, 1.0));
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use image::{ImageBuffer, Rgba, RgbaImage};

    use super::*;
    use crate::geometry::Rotation;
    use crate::surface::Canvas;
    use crate::widget::ButtonKind;

    const WAIT: Duration = Duration::from_secs(20);

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        let img: RgbaImage = ImageBuffer::from_fn(w, h, |x, y| Rgba([(x % 256) as u8, (y % 256) as u8, 64, 255]));
        img.save(&path).expect("write png");
        path
    }

    fn session_with(names: &[&str]) -> (Session, Vec<RecordId>) {
        let mut session = Session::new(256);
        session.set_viewport(Rect::new(0, 0, 1000, 1000));
        let ids = names
            .iter()
            .map(|n| session.import_path(format!("/nonexistent/{n}.jpg")))
            .collect();
        (session, ids)
    }

    fn names(session: &Session) -> Vec<String> {
        session.records().iter().map(|r| r.display_name().to_string()).collect()
    }

    #[test]
    fn add_remove_and_index() {
        let (mut session, ids) = session_with(&["a", "b", "c"]);
        assert_eq!(session.len(), 3);
        assert_eq!(session.index_of(ids[1]), Some(1));
        assert!(session.is_dirty());

        let removed = session.remove(ids[1]).map(|r| r.display_name().to_string());
        assert_eq!(removed.as_deref(), Some("b"));
        assert_eq!(session.index_of(ids[1]), None);
        assert_eq!(names(&session), vec!["a", "c"]);
        assert!(session.remove(ids[1]).is_none());
    }

    #[test]
    fn add_at_index_and_layout() {
        let (mut session, _) = session_with(&["a", "c"]);
        session.add(ImageRecord::new("/nonexistent/b.jpg"), Some(1));
        assert_eq!(names(&session), vec!["a", "b", "c"]);
        let positions: Vec<_> = session.records().iter().map(|r| r.position()).collect();
        assert_eq!(positions[0], Rect::new(0, 0, 240, 180));
        assert_eq!(positions[1], Rect::new(248, 0, 488, 180));
    }

    #[test]
    fn drop_indices_are_adjusted_for_the_moved_record() {
        let (mut session, ids) = session_with(&["a", "b", "c"]);
        session.apply(ids[0], Response::command(Command::Drop { index: 2, duplicate: false }));
        assert_eq!(names(&session), vec!["b", "a", "c"]);

        session.apply(ids[0], Response::command(Command::Drop { index: 3, duplicate: false }));
        assert_eq!(names(&session), vec!["b", "c", "a"]);

        session.apply(ids[0], Response::command(Command::Drop { index: 0, duplicate: false }));
        assert_eq!(names(&session), vec!["a", "b", "c"]);
    }

    #[test]
    fn drop_with_duplicate_inserts_a_copy() {
        let (mut session, ids) = session_with(&["a", "b", "c"]);
        session.set_display_name(ids[0], "first");
        session.apply(ids[0], Response::command(Command::Drop { index: 2, duplicate: true }));
        assert_eq!(names(&session), vec!["first", "b", "first", "c"]);
        assert_ne!(session.records()[2].id(), ids[0]);
    }

    #[test]
    fn dragging_onto_own_slot_is_a_no_op() {
        let (mut session, ids) = session_with(&["a", "b", "c"]);
        session.mark_clean();

        let down = session.pointer_down(PointerEvent::at(120, 90));
        assert!(down.captured);
        session.pointer_move(PointerEvent::at(125, 95));
        assert_eq!(session.hover_slot(), None);
        session.pointer_up(PointerEvent::at(125, 95));

        assert_eq!(session.index_of(ids[0]), Some(0));
        assert!(!session.is_dirty());
    }

    #[test]
    fn dragging_past_a_neighbour_reorders() {
        let (mut session, ids) = session_with(&["a", "b", "c"]);
        session.pointer_down(PointerEvent::at(120, 90));
        session.pointer_move(PointerEvent::at(400, 90));
        assert_eq!(session.hover_slot(), Some(2));
        let mut canvas = Canvas::new(1000, 400);
        session.paint(&mut canvas);

        session.pointer_up(PointerEvent::at(400, 90));
        assert_eq!(session.hover_slot(), None);
        assert_eq!(session.index_of(ids[0]), Some(1));
    }

    #[test]
    fn remove_while_fullscreen_only_leaves_fullscreen() {
        let (mut session, ids) = session_with(&["a", "b"]);
        assert!(session.set_fullscreen(Some(ids[1])));
        assert_eq!(session.records()[1].position(), Rect::new(0, 0, 1000, 1000));
        assert!(session.records()[0].position().is_degenerate());

        session.apply(ids[1], Response::command(Command::Remove));
        assert_eq!(session.fullscreen(), None);
        assert_eq!(session.len(), 2);

        session.apply(ids[1], Response::command(Command::Remove));
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn removing_fullscreen_record_clears_reference() {
        let (mut session, ids) = session_with(&["a", "b"]);
        session.set_fullscreen(Some(ids[0]));
        session.remove(ids[0]);
        assert_eq!(session.fullscreen(), None);
        assert_eq!(session.records()[0].position(), Rect::new(0, 0, 240, 180));
    }

    #[test]
    fn double_click_toggles_fullscreen() {
        let (mut session, ids) = session_with(&["a", "b"]);
        session.double_click(PointerEvent::at(300, 90));
        assert_eq!(session.fullscreen(), Some(ids[1]));
        assert!(session.find(ids[1]).is_some_and(|r| r.is_fullscreen()));

        session.double_click(PointerEvent::at(500, 500));
        assert_eq!(session.fullscreen(), None);
        assert!(session.find(ids[1]).is_some_and(|r| !r.is_fullscreen()));
    }

    #[test]
    fn fullscreen_button_switches_from_any_record() {
        let (mut session, ids) = session_with(&["a", "b"]);
        session.set_fullscreen(Some(ids[0]));
        session.apply(ids[1], Response::command(Command::ToggleFullscreen));
        assert_eq!(session.fullscreen(), None);
        session.apply(ids[1], Response::command(Command::ToggleFullscreen));
        assert_eq!(session.fullscreen(), Some(ids[1]));
        let fs = session.find(ids[1]).and_then(|r| r.button(ButtonKind::Fullscreen)).map(|b| b.checked);
        assert_eq!(fs, Some(true));
    }

    #[test]
    fn record_edits_mark_dirty_through_update() {
        let (mut session, ids) = session_with(&["a"]);
        session.mark_clean();
        session.update(ids[0], |r| r.rotate(1));
        assert!(session.is_dirty());
        assert_eq!(session.records()[0].edit().rotation, Rotation::Cw90);
    }

    #[test]
    fn caption_and_needs_save() {
        let mut session = Session::new(256);
        assert_eq!(session.caption(), "SnapEase");
        assert!(!session.needs_save());

        session.mark_dirty();
        assert!(!session.needs_save());

        session.import_path("/nonexistent/a.jpg");
        assert!(session.needs_save());
        assert_eq!(session.caption(), "[unsaved image list] - SnapEase");

        session.project_path = Some(PathBuf::from("/lists/holiday.SnapeaseList"));
        assert_eq!(session.caption(), "holiday [modified] - SnapEase");
        session.dirty = false;
        assert_eq!(session.caption(), "holiday - SnapEase");
    }

    #[test]
    fn imported_image_decodes_and_applies_rotation_check() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_png(dir.path(), "wide.png", 640, 320);
        let mut session = Session::new(256);
        let id = session.import_path(&path);
        session.mark_clean();

        assert_eq!(session.wait_for_decodes(WAIT), 1);
        let record = session.find(id).expect("record");
        assert_eq!(record.load_state(), LoadState::Loaded);
        assert_eq!(record.source_size(), (640, 320));
        assert_eq!(record.preview().map(|p| p.dimensions()), Some((256, 128)));
        assert!(!record.edit().need_rot_check);
        assert!(record.file_timestamp().is_some());
        assert!(session.is_dirty());
    }

    #[test]
    fn missing_image_ends_up_failed() {
        let (mut session, ids) = session_with(&["gone"]);
        session.wait_for_decodes(WAIT);
        assert_eq!(session.find(ids[0]).map(|r| r.load_state()), Some(LoadState::Failed));
    }

    #[test]
    fn decode_for_removed_record_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_png(dir.path(), "a.png", 64, 64);
        let mut session = Session::new(256);
        let id = session.import_path(&path);
        session.remove(id);
        assert_eq!(session.wait_for_decodes(WAIT), 0);
        assert!(session.is_empty());
    }

    #[test]
    fn fullscreen_loads_the_full_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_png(dir.path(), "big.png", 600, 400);
        let mut session = Session::new(100);
        let id = session.import_path(&path);
        session.wait_for_decodes(WAIT);
        session.set_fullscreen(Some(id));
        session.wait_for_decodes(WAIT);
        let full = session.find(id).and_then(|r| r.full_image()).map(|f| f.dimensions());
        assert_eq!(full, Some((600, 400)));

        session.set_fullscreen(None);
        assert!(session.find(id).is_some_and(|r| r.full_image().is_none()));
    }

    #[test]
    fn save_and_reload_round_trips_edits() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = write_png(dir.path(), "a.png", 80, 60);
        let b = write_png(dir.path(), "b.png", 60, 80);
        let list = dir.path().join("trip.SnapeaseList");

        let mut session = Session::new(256);
        let ida = session.import_path(&a);
        let idb = session.import_path(&b);
        session.wait_for_decodes(WAIT);
        session.update(ida, |r| r.rotate(-1));
        session.update(ida, |r| {
            r.set_crop(Rect::new(10, 5, 70, 55));
            Response::edited()
        });
        session.update(idb, |r| r.toggle_grayscale());
        session.set_display_name(idb, "Portrait \"b\"");
        session.save_project(Some(&list)).expect("save");
        assert!(!session.is_dirty());
        assert_eq!(session.caption(), "trip - SnapEase");

        let mut reloaded = Session::new(256);
        assert_eq!(reloaded.load_project(&list, false).expect("load"), 2);
        assert!(!reloaded.is_dirty());
        assert_eq!(reloaded.project_path(), Some(list.as_path()));
        for (orig, back) in session.records().iter().zip(reloaded.records()) {
            assert_eq!(back.source_path(), orig.source_path());
            assert_eq!(back.display_name(), orig.display_name());
            assert_eq!(back.edit().rotation, orig.edit().rotation);
            assert_eq!(back.edit().grayscale, orig.edit().grayscale);
            assert_eq!(back.edit().crop, orig.edit().crop);
            assert_eq!(back.file_timestamp(), orig.file_timestamp());
        }
        assert_eq!(reloaded.records()[0].edit().rotation, Rotation::Ccw90);
    }

    #[test]
    fn fresh_load_replaces_and_additive_load_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list = dir.path().join("two.SnapeaseList");
        std::fs::write(
            &list,
            "<SNAPEASE_IMAGELIST 0.0\n  IMAGE \"/nonexistent/x.jpg\" \"x\" 0 0 1 0 0 0 0\n  IMAGE_FULL \"/nonexistent/y.jpg\" \"y\" 0 0 1 0 0 0 0\n>\n",
        )
        .expect("write list");

        let (mut session, _) = session_with(&["old"]);
        session.load_project(&list, true).expect("add");
        assert_eq!(names(&session), vec!["old", "x", "y"]);
        assert_eq!(session.fullscreen(), None);
        assert!(session.is_dirty());
        assert_eq!(session.project_path(), None);

        session.load_project(&list, false).expect("load");
        assert_eq!(names(&session), vec!["x", "y"]);
        let y = session.records()[1].id();
        assert_eq!(session.fullscreen(), Some(y));
        assert_eq!(session.records()[1].edit_mode(), EditMode::Crop);
        assert_eq!(session.entries()[0].edit_mode, 1);
    }

    #[test]
    fn incomplete_list_fails_but_keeps_records() {
        let dir = tempfile::tempdir().expect("tempdir");
        let list = dir.path().join("cut.SnapeaseList");
        std::fs::write(&list, "<SNAPEASE_IMAGELIST 0.0\n  IMAGE a a 0 0 0 0 0 0 0\n").expect("write list");

        let mut session = Session::new(256);
        assert!(session.load_project(&list, false).is_err());
        assert_eq!(session.len(), 1);
        assert!(session.is_dirty());
        assert_eq!(session.project_path(), None);
    }

    #[test]
    fn failed_save_leaves_list_dirty() {
        let (mut session, _) = session_with(&["a"]);
        let bad = Path::new("/nonexistent/dir/list.SnapeaseList");
        assert!(session.save_project(Some(bad)).is_err());
        assert!(session.is_dirty());
        assert!(session.save_project(None).is_err());
    }

    #[test]
    fn label_click_requests_edit() {
        let (mut session, ids) = session_with(&["a"]);
        let mut canvas = Canvas::new(400, 300);
        session.paint(&mut canvas);
        let label = session.records()[0].last_label_rect();
        let resp = session.pointer_down(PointerEvent::at(label.left + 1, label.top + 1));
        assert_eq!(resp.command, Some(Command::EditLabel));
        assert_eq!(session.take_label_edit(), Some(ids[0]));
        assert_eq!(session.take_label_edit(), None);
    }

    impl Session {
        fn mark_clean(&mut self) {
            self.dirty = false;
        }
    }
}
