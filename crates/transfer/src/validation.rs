use std::path::{Component, Path};

use crate::TransferError;

/// Checks a target filename before it goes on the wire.
///
/// Controllers store uploads relative to their storage root, so the name
/// must be a non-empty relative path that cannot climb out of it.
pub fn validate_filename(filename: &str) -> Result<(), TransferError> {
    if filename.trim().is_empty() {
        return Err(TransferError::InvalidFilename("empty filename".into()));
    }
    if filename.ends_with('/') || filename.ends_with('\\') {
        return Err(TransferError::InvalidFilename(format!(
            "not a file name: {filename}"
        )));
    }

    let path = Path::new(filename);
    if path.is_absolute() {
        return Err(TransferError::InvalidFilename(format!(
            "absolute path not allowed: {filename}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidFilename(format!(
                    "parent directory traversal not allowed: {filename}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidFilename(format!(
                    "absolute path not allowed: {filename}"
                )));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}
