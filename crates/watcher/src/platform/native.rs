//! OS backend built on `notify`'s recommended watcher

use super::{NativeBackend, NativeHandle, RawRecord};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use tracing::debug;

/// Backend that attaches one OS watcher per root
///
/// Every supported platform watcher handles recursion natively, so recursive
/// roots never need a manual directory walk.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl NotifyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl NativeBackend for NotifyBackend {
    fn name(&self) -> &'static str {
        "notify"
    }

    fn supports_recursion(&self) -> bool {
        true
    }

    fn open(&self, root: &Path, recursive: bool) -> notify::Result<NativeHandle> {
        let (tx, rx) = crossbeam_channel::unbounded::<RawRecord>();

        // The callback runs on notify's own thread; a closed receiver only
        // means the session is shutting down.
        let mut watcher = notify::recommended_watcher(move |record: RawRecord| {
            let _ = tx.send(record);
        })?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(root, mode)?;

        debug!("Attached {:?} watch to {}", mode, root.display());

        Ok(NativeHandle::new(root, rx, WatchGuard { _watcher: watcher }))
    }
}

/// Keeps the OS watcher alive until the handle is closed
struct WatchGuard {
    _watcher: RecommendedWatcher,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    #[test]
    fn test_open_missing_root_fails() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        assert!(NotifyBackend::new().open(&missing, false).is_err());
    }

    #[test]
    fn test_records_arrive_on_receiver() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().canonicalize().unwrap();
        let handle = NotifyBackend::new().open(&root, false).unwrap();

        fs::write(root.join("a.txt"), b"hello").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut out = Vec::new();
        while out.is_empty() && Instant::now() < deadline {
            if handle
                .receiver()
                .recv_timeout(Duration::from_millis(100))
                .map(|record| out.push(record.unwrap()))
                .is_err()
            {
                continue;
            }
            handle.read_pending(&mut out).unwrap();
        }

        assert!(out
            .iter()
            .any(|event| event.paths.iter().any(|p| p.ends_with("a.txt"))));
    }
}
