//! In-process backend driven by the caller
//!
//! Nothing here touches the OS. Callers inject raw records (or errors) per
//! root, which makes coalescing, lifecycle and failure propagation testable
//! without relying on native watcher timing.

use super::{NativeBackend, NativeHandle, RawRecord};
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type OpenRoots = Arc<Mutex<HashMap<PathBuf, Sender<RawRecord>>>>;

/// Deterministic backend for tests and simulations
#[derive(Debug, Default)]
pub struct ManualBackend {
    recursion: bool,
    open: OpenRoots,
    refused: Mutex<HashSet<PathBuf>>,
    opened: Mutex<Vec<PathBuf>>,
}

impl ManualBackend {
    /// Backend that accepts recursive watches
    pub fn new() -> Self {
        Self {
            recursion: true,
            ..Self::default()
        }
    }

    /// Backend that rejects recursive watches
    pub fn without_recursion() -> Self {
        Self::default()
    }

    /// Make the next `open` of `root` fail
    pub fn refuse(&self, root: &Path) {
        self.refused.lock().insert(key(root));
    }

    /// Inject a raw event for `root`; false when the root is not open
    pub fn emit(&self, root: &Path, event: notify::Event) -> bool {
        self.send(root, Ok(event))
    }

    /// Inject a native error for `root`
    pub fn fail(&self, root: &Path, error: notify::Error) -> bool {
        self.send(root, Err(error))
    }

    /// Drop the producing side of `root`'s handle, as if the OS revoked it
    pub fn sever(&self, root: &Path) -> bool {
        self.open.lock().remove(&key(root)).is_some()
    }

    /// Whether a live (unclosed) handle exists for `root`
    pub fn is_open(&self, root: &Path) -> bool {
        self.open.lock().contains_key(&key(root))
    }

    /// Every root passed to `open`, in call order
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().clone()
    }

    fn send(&self, root: &Path, record: RawRecord) -> bool {
        match self.open.lock().get(&key(root)) {
            Some(tx) => tx.send(record).is_ok(),
            None => false,
        }
    }
}

impl NativeBackend for ManualBackend {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn supports_recursion(&self) -> bool {
        self.recursion
    }

    fn open(&self, root: &Path, _recursive: bool) -> notify::Result<NativeHandle> {
        let root = key(root);
        self.opened.lock().push(root.clone());

        if self.refused.lock().remove(&root) {
            return Err(notify::Error::generic("watch refused").add_path(root));
        }

        let (tx, rx) = crossbeam_channel::unbounded();
        self.open.lock().insert(root.clone(), tx);

        let guard = ManualGuard {
            root: root.clone(),
            open: Arc::clone(&self.open),
        };
        Ok(NativeHandle::new(root, rx, guard))
    }
}

/// Unregisters the root when the handle is closed
struct ManualGuard {
    root: PathBuf,
    open: OpenRoots,
}

impl Drop for ManualGuard {
    fn drop(&mut self) {
        self.open.lock().remove(&self.root);
    }
}

/// Roots are keyed by canonical path when it resolves
fn key(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{EventKind, ModifyKind};
    use tempfile::TempDir;

    #[test]
    fn test_emit_reaches_open_handle() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ManualBackend::new();
        let handle = backend.open(temp_dir.path(), false).unwrap();

        let event = notify::Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(temp_dir.path().join("a"));
        assert!(backend.emit(temp_dir.path(), event));

        let mut out = Vec::new();
        assert_eq!(handle.read_pending(&mut out).unwrap(), 1);
    }

    #[test]
    fn test_close_unregisters_root() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ManualBackend::new();
        let mut handle = backend.open(temp_dir.path(), false).unwrap();
        assert!(backend.is_open(temp_dir.path()));

        handle.close();
        assert!(!backend.is_open(temp_dir.path()));
        assert!(!backend.emit(
            temp_dir.path(),
            notify::Event::new(EventKind::Any)
        ));
    }

    #[test]
    fn test_refused_root_fails_once() {
        let temp_dir = TempDir::new().unwrap();
        let backend = ManualBackend::without_recursion();
        assert!(!backend.supports_recursion());

        backend.refuse(temp_dir.path());
        assert!(backend.open(temp_dir.path(), false).is_err());
        assert!(backend.open(temp_dir.path(), false).is_ok());
        assert_eq!(backend.opened().len(), 2);
    }
}
