use primserve_core::{Error, Result};
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// Tells an external driver process which event is about to be served.
///
/// Whenever the first part of an event goes out, its index is written as a
/// 4-byte little-endian integer. The target is usually a FIFO the driver
/// reads from, but any writable file works.
#[derive(Debug)]
pub struct DriverPipe {
    path: PathBuf,
    file: File,
}

impl DriverPipe {
    /// Opens `path` for appending, creating a regular file if nothing exists
    /// there. Opening a FIFO blocks until its reader is connected.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the path cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| Error::InvalidConfig {
                reason: format!("cannot open driver pipe {}: {e}", path.display()),
            })?;
        tracing::info!("Assigned driver pipe {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the index of the event whose first part is being served.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if the write fails.
    pub fn signal_event_start(&mut self, event_index: i32) -> Result<()> {
        self.file
            .write_all(&event_index.to_le_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| Error::ChannelError {
                context: format!("driver pipe {}: {e}", self.path.display()),
            })
    }
}
