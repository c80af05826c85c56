//! Atomic file replacement.
//!
//! K_i: A rename within one directory is atomic on POSIX and NTFS, so a
//! reader (or a restarted process) only ever sees the old file or the
//! complete new one, never a truncated intermediate.

use crate::models::{GlossfillError, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Write `bytes` to `path` via a sibling temp file and an atomic rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_path(path);

    {
        let file = File::create(&tmp)
            .map_err(|e| GlossfillError::io(format!("creating {}", tmp.display()), e))?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(bytes)
            .map_err(|e| GlossfillError::io(format!("writing {}", tmp.display()), e))?;
        writer
            .flush()
            .map_err(|e| GlossfillError::io(format!("flushing {}", tmp.display()), e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| GlossfillError::io(format!("syncing {}", tmp.display()), e))?;
    }

    fs::rename(&tmp, path)
        .map_err(|e| GlossfillError::io(format!("renaming {} over {}", tmp.display(), path.display()), e))
}

/// Sibling temp path: `table.csv` → `table.csv.tmp`. Same directory, so
/// the final rename cannot cross a filesystem boundary.
fn temp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");

        write_atomic(&path, b"hello").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_replaces_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.txt");
        fs::write(&path, "old contents").unwrap();

        write_atomic(&path, b"new contents").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new contents");
    }

    #[test]
    fn test_failed_write_leaves_original() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.txt");

        // Parent directory does not exist, so the temp create fails
        assert!(write_atomic(&path, b"data").is_err());
        assert!(!path.exists());
    }
}
