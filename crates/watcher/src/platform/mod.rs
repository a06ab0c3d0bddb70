//! Native change-notification layer
//!
//! A [`NativeBackend`] opens one [`NativeHandle`] per watched root. Each handle
//! exposes its pending raw records through a crossbeam receiver, which lets the
//! worker thread block on every handle plus the stop signal at once through a
//! [`WaitSet`].
//!
//! [`NotifyBackend`] is the OS backend (`notify`'s recommended watcher:
//! inotify, FSEvents or ReadDirectoryChangesW depending on the target).
//! Unit tests swap in `ManualBackend`, which never touches the OS and lets
//! them inject records directly.

#[cfg(test)]
pub mod manual;
pub mod native;
pub mod wait;

#[cfg(test)]
pub use manual::ManualBackend;
pub use native::NotifyBackend;
pub use wait::{StopSignal, WaitOutcome, WaitSet};

use crossbeam_channel::{Receiver, TryRecvError};
use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};

/// One raw record as produced by the native layer
pub type RawRecord = notify::Result<notify::Event>;

/// Source of native watch handles
pub trait NativeBackend: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Whether `open(.., true)` is honored natively
    fn supports_recursion(&self) -> bool;

    /// Attach a watch to `root`
    fn open(&self, root: &Path, recursive: bool) -> notify::Result<NativeHandle>;
}

/// Why `read_pending` stopped early
#[derive(Debug)]
pub enum ReadError {
    /// The native layer delivered an error record
    Native(notify::Error),
    /// The producing side of the handle is gone
    Disconnected,
}

/// Native watch on one root
///
/// Holds the record receiver and whatever keeps the native watch alive.
/// Closing drops the latter; it is idempotent.
pub struct NativeHandle {
    root: PathBuf,
    records: Receiver<RawRecord>,
    guard: Option<Box<dyn Any + Send>>,
}

impl NativeHandle {
    /// Wrap a receiver; `guard` is dropped on close
    pub fn new(root: impl Into<PathBuf>, records: Receiver<RawRecord>, guard: impl Any + Send) -> Self {
        Self {
            root: root.into(),
            records,
            guard: Some(Box::new(guard)),
        }
    }

    /// Root this handle watches
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Receiver that becomes ready when records are pending
    pub fn receiver(&self) -> &Receiver<RawRecord> {
        &self.records
    }

    /// Move every pending record into `out` without blocking
    ///
    /// Returns how many records were read. On error, records read before it
    /// are already in `out`.
    pub fn read_pending(&self, out: &mut Vec<notify::Event>) -> Result<usize, ReadError> {
        let mut count = 0;
        loop {
            match self.records.try_recv() {
                Ok(Ok(event)) => {
                    out.push(event);
                    count += 1;
                }
                Ok(Err(e)) => return Err(ReadError::Native(e)),
                Err(TryRecvError::Empty) => return Ok(count),
                Err(TryRecvError::Disconnected) => {
                    if count > 0 {
                        // Report what was read; the next call sees the disconnect
                        return Ok(count);
                    }
                    return Err(ReadError::Disconnected);
                }
            }
        }
    }

    /// Release the native watch
    pub fn close(&mut self) {
        self.guard.take();
    }

    pub fn is_closed(&self) -> bool {
        self.guard.is_none()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("root", &self.root)
            .field("pending", &self.records.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
