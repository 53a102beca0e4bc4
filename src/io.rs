//! Shared random-access file handles with positional read/write.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::error::{Result, TransferError};

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        let n = file.seek_read(buf, offset)?;
        if n == 0 {
            return Err(std::io::ErrorKind::UnexpectedEof.into());
        }
        buf = &mut buf[n..];
        offset += n as u64;
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        let n = file.seek_write(buf, offset)?;
        buf = &buf[n..];
        offset += n as u64;
    }
    Ok(())
}

/// Registry of open local file handles shared by concurrent part transfers.
///
/// A handle is opened lazily on the first read or write of a path, at most
/// once per path for the lifetime of a run. All I/O is positional, so
/// concurrent operations against disjoint ranges of one handle are safe;
/// nothing is buffered beyond a single call.
///
/// Handles are reference-counted by outstanding operations: `close` drops
/// the registry's reference and in-flight operations finish against their
/// own clone.
#[derive(Debug, Default)]
pub struct RandomFileAccess {
    handles: Mutex<HashMap<PathBuf, Arc<File>>>,
}

impl RandomFileAccess {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<File>>> {
        self.handles
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch or lazily open the handle for `path`.
    ///
    /// Download targets need `for_write` (created if absent); upload
    /// sources are opened read-only.
    fn handle(&self, path: &Path, for_write: bool) -> Result<Arc<File>> {
        let mut handles = self.lock();
        if let Some(file) = handles.get(path) {
            return Ok(Arc::clone(file));
        }
        let file = if for_write {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?
        } else {
            File::open(path)?
        };
        let file = Arc::new(file);
        handles.insert(path.to_path_buf(), Arc::clone(&file));
        Ok(file)
    }

    /// Read exactly `length` bytes at `offset` from `path`.
    ///
    /// Fails with an I/O error on a short read or OS error.
    pub async fn read(self: &Arc<Self>, path: &Path, offset: u64, length: usize) -> Result<Bytes> {
        let this = Arc::clone(self);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let file = this.handle(&path, false)?;
            let mut buf = vec![0u8; length];
            read_exact_at(&file, &mut buf, offset)?;
            Ok(Bytes::from(buf))
        })
        .await
        .map_err(|e| TransferError::Io(std::io::Error::other(e)))?
    }

    /// Write `bytes` at `offset` into `path`, creating the file if absent.
    pub async fn write_at(self: &Arc<Self>, path: &Path, offset: u64, bytes: Bytes) -> Result<()> {
        let this = Arc::clone(self);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            let file = this.handle(&path, true)?;
            write_all_at(&file, &bytes, offset)?;
            Ok(())
        })
        .await
        .map_err(|e| TransferError::Io(std::io::Error::other(e)))?
    }

    /// Release the handle for `path`; idempotent.
    pub fn close(&self, path: &Path) {
        self.lock().remove(path);
    }

    /// Release every handle; called on pipeline teardown.
    pub fn close_all(&self) {
        self.lock().clear();
    }

    /// Number of handles currently open.
    pub fn open_count(&self) -> usize {
        self.lock().len()
    }
}
