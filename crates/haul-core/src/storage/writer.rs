//! Positional writer for `.part` files.

use anyhow::{Context, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

use crate::throttle::WriteTarget;

/// Shared handle to a temp file. Clones write to the same file; each
/// `write_at` carries its own offset, so clones never race on a cursor.
#[derive(Clone)]
pub struct StorageWriter {
    file: Arc<File>,
    temp_path: PathBuf,
}

impl StorageWriter {
    pub(crate) fn from_file_and_path(file: File, temp_path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            temp_path,
        }
    }

    /// Open an existing temp file without truncating it (resumed fetches).
    pub fn open_existing(temp_path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .open(temp_path)
            .with_context(|| format!("failed to open existing temp file: {}", temp_path.display()))?;
        Ok(Self::from_file_and_path(file, temp_path.to_path_buf()))
    }

    /// Write all of `data` at `offset`.
    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, offset)
    }

    /// Seek + write on non-Unix; callers must not share the handle across tasks.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = (*self.file).try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
    }

    /// Current on-disk length (resume point for an interrupted fetch).
    pub fn len(&self) -> Result<u64> {
        let meta = self.file.metadata().context("storage metadata failed")?;
        Ok(meta.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Truncate or extend to exactly `size` bytes.
    pub fn set_len(&self, size: u64) -> Result<()> {
        self.file
            .set_len(size)
            .with_context(|| format!("failed to resize {}", self.temp_path.display()))
    }

    pub fn sync(&self) -> Result<()> {
        self.file.sync_all().context("storage sync failed")?;
        Ok(())
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Rename the temp file onto `final_path` and close it. Same-filesystem only.
    pub fn finalize(self, final_path: &Path) -> Result<()> {
        let temp_path = self.temp_path.clone();
        drop(self.file);
        std::fs::rename(&temp_path, final_path).with_context(|| {
            format!(
                "failed to rename {} to {}",
                temp_path.display(),
                final_path.display()
            )
        })?;
        Ok(())
    }
}

impl WriteTarget for StorageWriter {
    fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        StorageWriter::write_at(self, offset, data)
    }
}
