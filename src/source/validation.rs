//! Up-front checks that a path can be tailed.
//!
//! The engine itself tolerates a missing file (it keeps retrying), so these checks
//! are for front ends that want to fail fast on a typo or a directory.

use crate::error::{Result, TailscanError};
use std::fs::File;
use std::path::Path;

/// Validate that a path exists, is a regular file and can be opened for reading.
///
/// An empty file is accepted: a freshly rotated log starts empty and fills up while
/// it is being watched.
pub fn validate_file_path(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(TailscanError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let metadata = std::fs::metadata(path)
        .map_err(|e| TailscanError::file_error("Failed to read file metadata", e))?;

    if !metadata.is_file() {
        return Err(TailscanError::NotAFile {
            path: path.to_path_buf(),
        });
    }

    File::open(path).map_err(|e| TailscanError::file_error("Cannot open file for reading", e))?;

    Ok(())
}
