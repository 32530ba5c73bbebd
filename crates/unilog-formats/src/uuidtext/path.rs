//! Mapping between image UUIDs and uuidtext file locations
//!
//! `logd` stores the uuidtext file for an image at `XX/YYYY...` below the
//! uuidtext root, where `XX` is the first UUID byte and `YYYY...` the other
//! fifteen, all in uppercase hex without dashes.

use super::error::{UuidTextError, UuidTextResult};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Relative path of the uuidtext file for an image UUID
pub fn uuidtext_relative_path(uuid: &Uuid) -> PathBuf {
    let hex = hex::encode_upper(uuid.as_bytes());
    let (dir, file) = hex.split_at(2);
    Path::new(dir).join(file)
}

/// Recover the image UUID from a uuidtext file path
///
/// Only the last two path components are inspected, so both relative and
/// absolute paths are accepted.
pub fn uuid_from_path(path: &Path) -> UuidTextResult<Uuid> {
    let invalid = || UuidTextError::InvalidPath(path.display().to_string());

    let file = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
    let dir = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .ok_or_else(invalid)?;

    if dir.len() != 2 || file.len() != 30 {
        return Err(invalid());
    }

    let bytes = hex::decode(format!("{dir}{file}")).map_err(|_| invalid())?;
    let bytes: [u8; 16] = bytes.try_into().map_err(|_| invalid())?;
    Ok(Uuid::from_bytes(bytes))
}
