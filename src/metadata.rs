use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::geometry::Rotation;

/// Rotation that makes an image with the given EXIF orientation code display
/// upright. Mirrored orientations are not representable and map to `None`.
pub fn rotation_for_orientation(code: u32) -> Option<Rotation> {
    match code {
        1 => Some(Rotation::None),
        3 => Some(Rotation::Half),
        6 => Some(Rotation::Cw90),
        8 => Some(Rotation::Ccw90),
        _ => None,
    }
}

/// Reads the EXIF orientation tag from `path`.
pub fn orientation(path: &Path) -> anyhow::Result<Option<Rotation>> {
    let file = std::fs::File::open(path)?;
    let mut bufreader = std::io::BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut bufreader)?;

    Ok(exif
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .and_then(rotation_for_orientation))
}

/// Modification time of `path` in whole seconds since the Unix epoch.
pub fn modified_timestamp(path: &Path) -> Option<i64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let secs = modified.duration_since(UNIX_EPOCH).ok()?.as_secs();
    i64::try_from(secs).ok()
}
