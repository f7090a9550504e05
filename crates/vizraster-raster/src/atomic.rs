//! Output files that appear at their final path only once fully written.
//!
//! Tile outputs double as resume markers, so a partial file must never sit
//! at the destination. Content goes to a temporary file in the destination
//! directory and is renamed into place.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Fill a temporary file next to `path` with `fill`, then rename it to `path`.
///
/// On error the temporary file is removed and `path` is left untouched.
pub fn persist_with<E, F>(path: &Path, fill: F) -> Result<(), E>
where
    E: From<io::Error>,
    F: FnOnce(&mut File) -> Result<(), E>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    fill(tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(io::Error::from)?;
    Ok(())
}

/// Write `bytes` to `path` atomically.
pub fn write_file_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    persist_with(path, |file| file.write_all(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_replaces_existing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tile.png");
        std::fs::write(&path, b"old").unwrap();

        write_file_atomic(&path, b"new content").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new content");
        assert_eq!(entries(tmp.path()), 1);
    }

    #[test]
    fn test_failed_fill_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tile.tif");

        let result: io::Result<()> = persist_with(&path, |file| {
            file.write_all(b"II*\0")?;
            Err(io::Error::new(io::ErrorKind::Other, "encoder failed"))
        });
        assert!(result.is_err());
        assert!(!path.exists());
        assert_eq!(entries(tmp.path()), 0);
    }
}
