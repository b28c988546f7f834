//! Filesystem operations
//!
//! Handles file and directory operations.

use std::path::Path;

use crate::error::FilesystemError;

/// Create a directory and all parent directories
pub fn create_dir_all(path: &Path) -> Result<(), FilesystemError> {
    std::fs::create_dir_all(path).map_err(|e| FilesystemError::CreateDir {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Remove a directory and all its contents
pub fn remove_dir_all(path: &Path) -> Result<(), FilesystemError> {
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(|e| FilesystemError::RemoveDir {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Write content to a file
pub fn write_file(path: &Path, content: &str) -> Result<(), FilesystemError> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    std::fs::write(path, content).map_err(|e| FilesystemError::WriteFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// Read content from a file
pub fn read_file(path: &Path) -> Result<String, FilesystemError> {
    std::fs::read_to_string(path).map_err(|e| FilesystemError::ReadFile {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

/// True if a directory exists and contains at least one entry
pub fn dir_has_entries(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }
    walkdir::WalkDir::new(path)
        .min_depth(1)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .next()
        .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_has_entries() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!dir_has_entries(dir.path()));

        std::fs::write(dir.path().join("f"), "x").unwrap();
        assert!(dir_has_entries(dir.path()));
    }

    #[test]
    fn test_dir_has_entries_missing_path() {
        assert!(!dir_has_entries(Path::new("/nonexistent/extroot-test-path")));
    }

    #[test]
    fn test_write_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c.txt");
        write_file(&nested, "content").unwrap();
        assert_eq!(read_file(&nested).unwrap(), "content");
    }
}
