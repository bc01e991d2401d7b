use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::{Error, Result, remove_if_exists};

/// Suffix appended to the destination file name to form the staging path.
pub const STAGING_SUFFIX: &str = ".tmp";

/// A file being materialized next to its final destination.
///
/// Content is written to `<destination>.tmp`; [`StagedFile::commit`] renames
/// it into place, which is the only point where the destination changes.
/// An uncommitted staging file is removed on drop.
#[derive(Debug)]
pub struct StagedFile {
    staging_path:     PathBuf,
    destination_path: PathBuf,
    committed:        bool,
}

impl StagedFile {
    pub fn new(destination: impl AsRef<Path>) -> Result<Self> {
        Self::with_suffix(destination, STAGING_SUFFIX)
    }

    pub fn with_suffix(destination: impl AsRef<Path>, suffix: &str) -> Result<Self> {
        let destination_path = destination.as_ref().to_path_buf();
        let file_name = destination_path
            .file_name()
            .ok_or_else(|| Error::NoFileName(destination_path.clone()))?;

        let mut staged_name = file_name.to_os_string();
        staged_name.push(suffix);
        let staging_path = destination_path.with_file_name(staged_name);

        if let Some(parent) = destination_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| Error::CreateDir {
                path:   parent.to_path_buf(),
                source: e,
            })?;
        }

        Ok(Self {
            staging_path,
            destination_path,
            committed: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.staging_path
    }

    pub fn destination(&self) -> &Path {
        &self.destination_path
    }

    /// Removes whatever currently sits at the staging path.
    ///
    /// A writer that was abandoned earlier may still be appending to the
    /// file; removal unlinks the name and any later writes are lost with it.
    pub fn clear(&self) -> Result<bool> {
        remove_if_exists(&self.staging_path)
    }

    /// Size of the staged file, `None` if nothing was written.
    pub fn size(&self) -> Result<Option<u64>> {
        match fs::metadata(&self.staging_path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Read {
                path:   self.staging_path.clone(),
                source: e,
            }),
        }
    }

    /// Renames the staged file over the destination.
    pub fn commit(mut self) -> Result<PathBuf> {
        fs::rename(&self.staging_path, &self.destination_path).map_err(|e| Error::Rename {
            from:   self.staging_path.clone(),
            to:     self.destination_path.clone(),
            source: e,
        })?;
        self.committed = true;
        Ok(self.destination_path.clone())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.staging_path);
        }
    }
}
