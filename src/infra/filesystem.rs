//! Filesystem operations
//!
//! Handles file and directory operations.

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Write content to a file, creating parent directories
pub fn write_file(path: &Path, content: impl AsRef<[u8]>) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Replace a file in one step: write a uniquely named sibling temp file, then persist over
///
/// Readers see either the old or the new content, never a partial write.
pub fn write_atomic(path: &Path, content: impl AsRef<[u8]>) -> Result<(), FilesystemError> {
    let write_error = |error: String| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir).map_err(|e| write_error(e.to_string()))?;
    temp.write_all(content.as_ref())
        .map_err(|e| write_error(e.to_string()))?;
    temp.persist(path).map_err(|e| write_error(e.error.to_string()))?;
    Ok(())
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read a file that may not exist yet
pub fn read_optional(path: &Path) -> Result<Option<String>, FilesystemError> {
    if path.is_file() {
        read_file(path).map(Some)
    } else {
        Ok(None)
    }
}

/// Recursively copy a directory tree
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    let copy_error = |error: String| FilesystemError::Copy {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        error,
    };

    for entry in WalkDir::new(from).follow_links(true) {
        let entry = entry.map_err(|e| copy_error(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| copy_error(e.to_string()))?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target).map_err(|e| copy_error(e.to_string()))?;
        }
    }
    Ok(())
}
