//! One watched root: native handle, normalization and the latency window
//!
//! Batches use a fixed window: the first change ingested into an empty batch
//! opens it, and the batch is due `latency` later no matter how much activity
//! follows. This bounds the delay of every event to roughly one window.

use crate::coalesce::Coalescer;
use crate::config::WatcherConfig;
use crate::error::{Result, WatchError};
use crate::event::{Event, EventType};
use crate::filter::PathFilter;
use crate::platform::{NativeBackend, NativeHandle, ReadError, WaitOutcome, WaitSet};
use notify::event::{ModifyKind, RenameMode};
use notify::EventKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, warn};

/// Map one native record to normalized (path, type) pairs
///
/// Policy for native kinds without an exact counterpart:
/// - access (open, read, close) is not a mutation and yields nothing
/// - a rename with unknown direction is `RenamedNew` if the path exists now,
///   `RenamedOld` otherwise
/// - `Any`, `Other` and every non-rename modify become `Modified`
///
/// Renames are always two events: the source path as `RenamedOld`, the
/// destination as `RenamedNew`.
pub fn classify(event: &notify::Event) -> Vec<(PathBuf, EventType)> {
    let uniform = |kind: EventType| -> Vec<(PathBuf, EventType)> {
        event.paths.iter().map(|p| (p.clone(), kind)).collect()
    };

    match event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => uniform(EventType::Created),
        EventKind::Remove(_) => uniform(EventType::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => uniform(EventType::RenamedOld),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => uniform(EventType::RenamedNew),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = event.paths.iter();
            let mut out = Vec::with_capacity(event.paths.len());
            if let Some(from) = paths.next() {
                out.push((from.clone(), EventType::RenamedOld));
            }
            out.extend(paths.map(|to| (to.clone(), EventType::RenamedNew)));
            out
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                let kind = if p.exists() {
                    EventType::RenamedNew
                } else {
                    EventType::RenamedOld
                };
                (p.clone(), kind)
            })
            .collect(),
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => uniform(EventType::Modified),
    }
}

/// Watch on a single root directory
#[derive(Debug)]
pub struct WatchSession {
    root: PathBuf,
    recursive: bool,
    latency: Duration,
    filter: Option<PathFilter>,
    handle: NativeHandle,
    batch: Coalescer,
    /// When the current batch's window opened
    window_opened: Option<Instant>,
    /// Reused read buffer
    scratch: Vec<notify::Event>,
}

impl WatchSession {
    /// Validate `root` and attach a native watch to it
    ///
    /// The root is canonicalized; every event path is reported under the
    /// canonical form.
    pub fn open(root: &Path, config: &WatcherConfig, backend: &dyn NativeBackend) -> Result<Self> {
        let root = validate_root(root)?;

        if config.recursive() && !backend.supports_recursion() {
            return Err(WatchError::UnsupportedConfiguration {
                backend: backend.name(),
            });
        }

        let filter = PathFilter::build(&root, config.ignore())?;

        let handle = backend
            .open(&root, config.recursive())
            .map_err(|e| WatchError::setup(&root, e.to_string()))?;

        debug!(
            "Watching {} (recursive: {}, latency: {:?}, backend: {})",
            root.display(),
            config.recursive(),
            config.latency(),
            backend.name()
        );

        Ok(Self {
            root,
            recursive: config.recursive(),
            latency: config.latency(),
            filter,
            handle,
            batch: Coalescer::new(),
            window_opened: None,
            scratch: Vec::new(),
        })
    }

    /// Canonical root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Native handle, for multiplexed waits
    pub fn handle(&self) -> &NativeHandle {
        &self.handle
    }

    /// Drain pending native records into the current batch
    ///
    /// Returns how many normalized changes were recorded. Records read before
    /// a failure stay in the batch.
    pub fn ingest(&mut self) -> Result<usize> {
        let now = Instant::now();
        let observed = SystemTime::now();

        let mut records = std::mem::take(&mut self.scratch);
        let read = self.handle.read_pending(&mut records);

        let mut recorded = 0;
        for record in records.drain(..) {
            recorded += self.absorb(&record, observed);
        }
        self.scratch = records;

        if self.window_opened.is_none() && !self.batch.is_untouched() {
            self.window_opened = Some(now);
        }

        match read {
            Ok(_) => {}
            Err(ReadError::Native(e)) => return Err(WatchError::native(&self.root, e)),
            Err(ReadError::Disconnected) => {
                return Err(WatchError::HandleInvalidated {
                    path: self.root.clone(),
                })
            }
        }

        if !self.root.is_dir() {
            return Err(WatchError::RootRemoved {
                path: self.root.clone(),
            });
        }

        Ok(recorded)
    }

    /// When the current batch is due, if one is open
    ///
    /// A window too long to represent never expires; the batch then waits for
    /// `take_batch` on shutdown.
    pub fn flush_deadline(&self) -> Option<Instant> {
        self.window_opened
            .and_then(|opened| opened.checked_add(self.latency))
    }

    /// Take the batch if its window has expired at `now`
    ///
    /// A due batch may be empty when all its changes cancelled out.
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<Event>> {
        match self.flush_deadline() {
            Some(deadline) if deadline <= now => Some(self.take_batch()),
            _ => None,
        }
    }

    /// Take the current batch regardless of its window
    pub fn take_batch(&mut self) -> Vec<Event> {
        self.window_opened = None;
        self.batch.drain()
    }

    /// Block until the next non-empty batch is due
    ///
    /// Returns `Ok(None)` once `waits` is stopped; the partial batch is left
    /// in place for `take_batch`.
    pub fn next_batch(&mut self, waits: &WaitSet) -> Result<Option<Vec<Event>>> {
        loop {
            match waits.wait([&self.handle], self.flush_deadline()) {
                WaitOutcome::Stopped => return Ok(None),
                WaitOutcome::Ready(_) => {
                    self.ingest()?;
                }
                WaitOutcome::TimedOut => {}
            }

            if let Some(batch) = self.take_due(Instant::now()) {
                if !batch.is_empty() {
                    return Ok(Some(batch));
                }
            }
        }
    }

    /// Release the native handle; safe to call more than once
    pub fn close(&mut self) {
        if !self.handle.is_closed() {
            self.handle.close();
            debug!("Closed watch on {}", self.root.display());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    fn absorb(&mut self, record: &notify::Event, observed: SystemTime) -> usize {
        if record.need_rescan() {
            // Native queue overflowed; anything under the root may have changed
            warn!("Native event queue overflowed under {}", self.root.display());
            self.batch.record(&self.root, EventType::Modified, observed);
            return 1;
        }

        let mut recorded = 0;
        for (path, kind) in classify(record) {
            if !self.in_scope(&path) {
                continue;
            }
            if path == self.root && matches!(kind, EventType::Removed | EventType::RenamedOld) {
                // Surfaced as RootRemoved by ingest
                continue;
            }
            if self.filter.as_ref().map_or(false, |f| f.is_ignored(&path)) {
                continue;
            }

            self.batch.record(&path, kind, observed);
            recorded += 1;
        }
        recorded
    }

    /// Non-recursive sessions report the root and its direct children only
    fn in_scope(&self, path: &Path) -> bool {
        if self.recursive {
            path.starts_with(&self.root)
        } else {
            path == self.root || path.parent() == Some(self.root.as_path())
        }
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn validate_root(root: &Path) -> Result<PathBuf> {
    let canonical = root
        .canonicalize()
        .map_err(|e| WatchError::setup(root, e.to_string()))?;

    if !canonical.is_dir() {
        return Err(WatchError::setup(root, "not a directory"));
    }

    Ok(canonical)
}
