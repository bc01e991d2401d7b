use crate::{Error, Result};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

#[derive(Clone, Copy, Debug, Default)]
pub struct AtomicWriteOptions {
    pub sync: bool,
}

impl AtomicWriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }
}

/// Writes `content` to a unique temporary file next to `path` and renames
/// it over `path`. Readers observe either the old content or the new one.
pub fn atomic_write(
    path: impl AsRef<Path>,
    content: &[u8],
    options: AtomicWriteOptions,
) -> Result<()> {
    let path = path.as_ref();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let write_err = |source: io::Error| Error::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".nwpfetch.")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(write_err)?;

    tmp.write_all(content).map_err(write_err)?;

    if options.sync {
        tmp.as_file().sync_all().map_err(write_err)?;
    }

    // the temporary file is removed by tempfile when persist fails
    tmp.persist(path).map_err(|e| Error::Rename {
        from:   e.file.path().to_path_buf(),
        to:     path.to_path_buf(),
        source: e.error,
    })?;

    Ok(())
}

/// Removes a file, treating an already missing file as success.
///
/// Returns whether a file was actually removed.
pub fn remove_if_exists(path: impl AsRef<Path>) -> Result<bool> {
    let path = path.as_ref();
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::Remove {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.txt");
        atomic_write(&path, b"hello world", AtomicWriteOptions::new()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_atomic_write_leaves_no_temporaries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.txt");
        atomic_write(&path, b"one", AtomicWriteOptions::new().sync(true)).unwrap();
        atomic_write(&path, b"two", AtomicWriteOptions::new()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("list.txt")]);
        assert_eq!(fs::read(&path).unwrap(), b"two");
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gone.txt");
        assert!(!remove_if_exists(&path).unwrap());
        fs::write(&path, "x").unwrap();
        assert!(remove_if_exists(&path).unwrap());
        assert!(!path.exists());
    }
}
