use std::path::Path;

use anyhow::Context;
use image::{DynamicImage, RgbaImage};

use crate::geometry::Rotation;
use crate::metadata;

static RAW_EXTS: &[&str] = &["raf", "dng", "nef", "cr2", "arw"];
static SUPPORTED_IMAGE_EXTS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "tiff", "tif", "webp", "bmp", "raf", "dng", "nef", "cr2", "arw",
];

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    let Some(ext) = path.extension().map(|e| e.to_string_lossy()) else {
        return false;
    };
    exts.iter().any(|known| ext.eq_ignore_ascii_case(known))
}

pub fn is_raw_image(path: &Path) -> bool {
    has_extension(path, RAW_EXTS)
}

/// Returns `true` if the path has an extension the decoder accepts.
pub fn is_supported_image(path: &Path) -> bool {
    has_extension(path, SUPPORTED_IMAGE_EXTS)
}

/// Open an image, falling back to raw decoding for RAW extensions.
pub fn open_image(path: &Path) -> anyhow::Result<DynamicImage> {
    if let Ok(img) = image::open(path) {
        return Ok(img);
    }

    if !is_raw_image(path) {
        // Re-attempt to surface the original error message.
        return image::open(path).with_context(|| format!("decode failed for {}", path.display()));
    }

    let raw = rawler::decode_file(path)?;
    let develop = rawler::imgop::develop::RawDevelop::default();
    let intermediate = develop.develop_intermediate(&raw)?;
    intermediate
        .to_dynamic_image()
        .ok_or_else(|| anyhow::anyhow!("raw develop produced invalid image"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeKind {
    /// Downscaled bitmap for list display.
    Preview,
    /// Complete source bitmap for fullscreen display.
    Full,
}

/// Result of decoding one source file.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub kind: DecodeKind,
    pub bitmap: RgbaImage,
    /// Intrinsic size of the source, before any preview downscale.
    pub width: u32,
    pub height: u32,
    pub orientation: Option<Rotation>,
    /// Modification time, seconds since the Unix epoch.
    pub modified: Option<i64>,
}

pub fn decode(path: &Path, kind: DecodeKind, preview_max: u32) -> anyhow::Result<Decoded> {
    decode_with_hooks(path, kind, preview_max, open_image, metadata::orientation)
}

fn decode_with_hooks<FOpen, FOrient>(
    path: &Path,
    kind: DecodeKind,
    preview_max: u32,
    open: FOpen,
    orientation: FOrient,
) -> anyhow::Result<Decoded>
where
    FOpen: Fn(&Path) -> anyhow::Result<DynamicImage>,
    FOrient: Fn(&Path) -> anyhow::Result<Option<Rotation>>,
{
    let img = open(path)?;
    let (width, height) = (img.width(), img.height());
    if width == 0 || height == 0 {
        anyhow::bail!("{} decoded to an empty image", path.display());
    }

    let bitmap = match kind {
        DecodeKind::Preview if preview_max > 0 && (width > preview_max || height > preview_max) => {
            img.thumbnail(preview_max, preview_max).into_rgba8()
        }
        _ => img.into_rgba8(),
    };

    let orientation = match orientation(path) {
        Ok(o) => o,
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "no usable EXIF orientation");
            None
        }
    };

    Ok(Decoded {
        kind,
        bitmap,
        width,
        height,
        orientation,
        modified: metadata::modified_timestamp(path),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::path::Path;

    use image::{DynamicImage, ImageBuffer, Rgba};

    use super::*;

    fn img(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(ImageBuffer::from_pixel(w, h, Rgba([10, 20, 30, 255])))
    }

    #[test]
    fn preview_is_downscaled_but_keeps_intrinsic_size() {
        let out = decode_with_hooks(
            Path::new("/tmp/a.jpg"),
            DecodeKind::Preview,
            100,
            |_: &Path| Ok(img(400, 200)),
            |_: &Path| Ok(None),
        )
        .expect("decode should succeed");

        assert_eq!((out.width, out.height), (400, 200));
        assert_eq!(out.bitmap.dimensions(), (100, 50));
    }

    #[test]
    fn full_decode_is_not_downscaled() {
        let out = decode_with_hooks(
            Path::new("/tmp/a.jpg"),
            DecodeKind::Full,
            100,
            |_: &Path| Ok(img(400, 200)),
            |_: &Path| Ok(Some(Rotation::Cw90)),
        )
        .expect("decode should succeed");

        assert_eq!(out.bitmap.dimensions(), (400, 200));
        assert_eq!(out.orientation, Some(Rotation::Cw90));
    }

    #[test]
    fn orientation_errors_are_not_fatal() {
        let probes = Cell::new(0);
        let out = decode_with_hooks(
            Path::new("/tmp/a.png"),
            DecodeKind::Preview,
            0,
            |_: &Path| Ok(img(3, 3)),
            |_: &Path| {
                probes.set(probes.get() + 1);
                anyhow::bail!("no exif")
            },
        )
        .expect("decode should succeed");

        assert_eq!(probes.get(), 1);
        assert_eq!(out.orientation, None);
    }

    #[test]
    fn open_failure_propagates() {
        let result = decode_with_hooks(
            Path::new("/tmp/missing.jpg"),
            DecodeKind::Preview,
            0,
            |_: &Path| anyhow::bail!("not found"),
            |_: &Path| Ok(None),
        );
        assert!(result.is_err());
    }

    #[test]
    fn decodes_png_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("small.png");
        img(8, 4).save(&path).expect("write png");

        let out = decode(&path, DecodeKind::Preview, 1024).expect("decode should succeed");
        assert_eq!((out.width, out.height), (8, 4));
        assert!(out.modified.is_some());
    }

    #[test]
    fn extension_detection_is_case_insensitive() {
        assert!(is_raw_image(Path::new("/tmp/a.RAF")));
        assert!(!is_raw_image(Path::new("/tmp/a.jpg")));
        assert!(is_supported_image(Path::new("/tmp/a.JPEG")));
        assert!(!is_supported_image(Path::new("/tmp/a.txt")));
    }
}
