use image::RgbaImage;

/// Last full-resolution render of a record at its current display size.
///
/// Only populated from the full-resolution source. Preview renders are
/// never stored; switching back to preview discards whatever is here.
#[derive(Debug, Default)]
pub struct RenderCache {
    bitmap: Option<RgbaImage>,
    valid: bool,
    last_hit: bool,
    hits: u64,
    misses: u64,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached bitmap if it is valid and was rendered at `w x h`.
    /// Records the outcome for [`RenderCache::last_was_hit`].
    pub fn lookup(&mut self, w: u32, h: u32) -> Option<&RgbaImage> {
        let hit = self.valid
            && self
                .bitmap
                .as_ref()
                .is_some_and(|b| b.width() == w && b.height() == h);
        self.last_hit = hit;
        if hit {
            self.hits += 1;
            self.bitmap.as_ref()
        } else {
            self.misses += 1;
            None
        }
    }

    pub fn store(&mut self, bitmap: RgbaImage) {
        self.bitmap = Some(bitmap);
        self.valid = true;
    }

    /// Marks the cached pixels stale. The allocation is kept for the next store.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    pub fn discard(&mut self) {
        self.bitmap = None;
        self.valid = false;
    }

    pub fn is_valid(&self) -> bool {
        self.valid && self.bitmap.is_some()
    }

    pub fn last_was_hit(&self) -> bool {
        self.last_hit
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.bitmap.as_ref().map(|b| b.dimensions())
    }

    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
