use std::sync::Arc;

use image::{GenericImageView, RgbaImage};

use crate::geometry::{Point, Rect, fit_centered};
use crate::processing::render::{crop_view, render_view};
use crate::state::{EditMode, LoadState, crop_info};
use crate::surface::{Surface, TextAlign, rgba};
use crate::widget::Widget;

use super::ImageRecord;

const INFO_TEXT_OFFSET: i32 = 24;
const MIN_LABEL_WIDTH: i32 = 8;

impl ImageRecord {
    /// Crop scaled from source pixels onto a bitmap of `bw x bh`. Outside
    /// crop mode only; crop mode always shows the whole image.
    fn crop_on_bitmap(&self, bw: u32, bh: u32) -> Rect {
        if self.edit_mode == EditMode::Crop || self.edit.crop.is_degenerate() {
            return Rect::default();
        }
        let sw = i64::from(self.source_width.max(1));
        let sh = i64::from(self.source_height.max(1));
        let (bw, bh) = (i64::from(bw), i64::from(bh));
        let c = self.edit.crop;
        let left = i64::from(c.left) * bw / sw;
        let top = i64::from(c.top) * bh / sh;
        let width = (i64::from(c.right) * bw / sw - left).max(1);
        let height = (i64::from(c.bottom) * bh / sh - top).max(1);
        Rect::from_size(left as i32, top as i32, width as i32, height as i32)
    }

    fn placeholder_text(&self) -> &'static str {
        match self.load_state {
            LoadState::NotLoaded => "loading",
            LoadState::Decoding => "decoding",
            LoadState::Failed | LoadState::Loaded => "ERROR",
        }
    }

    pub(super) fn paint_record(&mut self, surface: &mut dyn Surface, origin: Point) {
        let r = self.position.offset(origin.x, origin.y);
        surface.outline_rect(r, rgba(32, 32, 32, 32.0 / 255.0));

        let using_full = self.full_image.is_some();
        let source: Option<Arc<RgbaImage>> = self.full_image.clone().or_else(|| self.preview.clone());

        match source {
            Some(source) => self.paint_image(surface, r, &source, using_full),
            None => {
                surface.draw_text(self.placeholder_text(), r, TextAlign::Center, rgba(255, 255, 255, 1.0));
            }
        }

        self.paint_label(surface, r);

        let button_origin = Point::new(r.left, r.top);
        for button in &mut self.buttons {
            button.paint(surface, button_origin);
        }
    }

    fn paint_image(&mut self, surface: &mut dyn Surface, r: Rect, source: &RgbaImage, using_full: bool) {
        let crop = self.crop_on_bitmap(source.width(), source.height());
        let view = match crop_view(source, crop) {
            Ok(view) => view,
            Err(err) => {
                tracing::debug!(path = %self.source_path.display(), %err, "skipping frame");
                return;
            }
        };
        let (vw, vh) = view.dimensions();
        let (src_w, src_h) = self.edit.oriented(vw as i32, vh as i32);

        let dest_w = r.width() - 4;
        let dest_h = r.height() - 4;
        if dest_w < 1 || dest_h < 1 {
            return;
        }
        let (w, h) = fit_centered(src_w, src_h, dest_w, dest_h);
        let xoffs = (dest_w - w) / 2 + r.left + 2;
        let yoffs = (dest_h - h) / 2 + r.top + 2;
        self.last_draw_rect = Rect::from_size(xoffs - r.left, yoffs - r.top, w, h);
        if w < 1 || h < 1 {
            return;
        }
        let (wu, hu) = (w as u32, h as u32);

        if using_full {
            if let Some(bitmap) = self.cache.lookup(wu, hu) {
                surface.blit(bitmap, xoffs, yoffs);
            } else {
                let bitmap = render_view(&*view, self.edit.rotation, self.edit.grayscale, wu, hu);
                surface.blit(&bitmap, xoffs, yoffs);
                self.cache.store(bitmap);
            }
        } else {
            self.cache.discard();
            let bitmap = render_view(&*view, self.edit.rotation, self.edit.grayscale, wu, hu);
            surface.blit(&bitmap, xoffs, yoffs);
        }

        if self.edit_mode == EditMode::Crop {
            self.paint_crop_overlay(surface, r, Rect::from_size(xoffs, yoffs, w, h));
        }
    }

    fn paint_crop_overlay(&mut self, surface: &mut dyn Surface, r: Rect, img: Rect) {
        let cr = self
            .crop_for_screen(img.width(), img.height())
            .offset(img.left, img.top);
        self.last_crop_draw_rect = cr.offset(-r.left, -r.top);

        let shade = rgba(0, 0, 0, 0.85);
        if cr.left > img.left {
            surface.fill_rect(Rect::new(img.left, img.top, cr.left, img.bottom), shade);
        }
        if cr.right < img.right {
            surface.fill_rect(Rect::new(cr.right, img.top, img.right, img.bottom), shade);
        }
        let band_left = img.left.max(cr.left);
        let band_right = img.right.min(cr.right);
        if cr.top > img.top {
            surface.fill_rect(Rect::new(band_left, img.top, band_right, cr.top), shade);
        }
        if cr.bottom < img.bottom {
            surface.fill_rect(Rect::new(band_left, cr.bottom, band_right, img.bottom), shade);
        }

        let guide = rgba(128, 128, 128, 0.25);
        surface.line(Point::new(cr.left, img.top), Point::new(cr.left, img.bottom), guide);
        surface.line(Point::new(cr.right, img.top), Point::new(cr.right, img.bottom), guide);
        surface.line(Point::new(img.left, cr.top), Point::new(img.right, cr.top), guide);
        surface.line(Point::new(img.left, cr.bottom), Point::new(img.right, cr.bottom), guide);

        surface.outline_rect(cr, rgba(255, 255, 255, 1.0));

        let (cw, ch) = self.edit.cropped_size(self.source_width, self.source_height);
        let (cw, ch) = self.edit.oriented(cw, ch);
        if let Some(info) = crop_info(cw, ch) {
            let (_, th) = surface.measure_text(&info);
            let tr = Rect::new(r.left, r.top + INFO_TEXT_OFFSET, r.right, r.top + INFO_TEXT_OFFSET + th);
            surface.draw_text(&info, tr, TextAlign::Center, rgba(255, 255, 255, 1.0));
        }
    }

    fn paint_label(&mut self, surface: &mut dyn Surface, r: Rect) {
        let (tw, th) = surface.measure_text(&self.display_name);
        let lw = tw.max(MIN_LABEL_WIDTH).min(r.width());
        let left = (r.left + r.right) / 2 - lw / 2;
        let tr = Rect::new(left, r.bottom - th - 2, left + lw, r.bottom - 2);
        surface.draw_text(&self.display_name, tr, TextAlign::Center, rgba(255, 255, 255, 0.5));
        self.last_label_rect = tr.offset(-r.left, -r.top);
    }
}
