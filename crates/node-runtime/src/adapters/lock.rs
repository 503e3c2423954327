//! Exclusive lock on the data directory, so only one process writes to it.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, info};

use crate::error::{NodeError, NodeResult};

pub const LOCK_FILE: &str = "node.lock";

/// Held for the lifetime of the node; the lock is released on drop.
#[derive(Debug)]
pub struct DataDirLock {
    file: File,
    path: PathBuf,
}

impl DataDirLock {
    /// Create `dir` if needed and take the lock without blocking.
    pub fn acquire(dir: &Path) -> NodeResult<Self> {
        std::fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;

        file.try_lock_exclusive()
            .map_err(|_| NodeError::DirectoryLocked {
                path: dir.display().to_string(),
            })?;
        info!("Locked data directory {}", dir.display());
        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DataDirLock {
    fn drop(&mut self) {
        if self.file.unlock().is_ok() {
            debug!("Released {}", self.path.display());
        }
    }
}

fn io_error(path: &Path, source: std::io::Error) -> NodeError {
    NodeError::Io {
        path: path.display().to_string(),
        source,
    }
}
