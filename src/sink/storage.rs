//! Local storage provider.
//!
//! Abstracts the platform storage the session log is written to, so the
//! log sink can be exercised against failing or in-memory storage.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// A writable destination for session logs.
pub trait StorageProvider: Send + Sync {
    /// Check whether storage is mounted and writable.
    fn is_available(&self) -> bool;

    /// Create a log file named `file_name`.
    ///
    /// An existing file with the same name is truncated.
    fn create_log(&self, file_name: &str) -> io::Result<Box<dyn Write + Send>>;

    /// Human-readable location, used in status and log messages.
    fn location(&self) -> String;
}

/// Filesystem-backed storage rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// Create storage rooted at `root`. The directory is created on demand.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl StorageProvider for FsStorage {
    fn is_available(&self) -> bool {
        if let Err(e) = std::fs::create_dir_all(&self.root) {
            debug!("Cannot create log directory {:?}: {}", self.root, e);
            return false;
        }

        std::fs::metadata(&self.root)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false)
    }

    fn create_log(&self, file_name: &str) -> io::Result<Box<dyn Write + Send>> {
        let path = self.root.join(file_name);
        let file: File = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;

        debug!("Created session log {:?}", path);

        Ok(Box::new(BufWriter::new(file)))
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}
