//! Per-batch event coalescing
//!
//! Raw changes recorded within one latency window are folded into at most one
//! event per path. The first occurrence of a path fixes its position in the
//! batch and its timestamp; later occurrences only change the kind:
//!
//! | earlier               | later                              | result       |
//! |-----------------------|------------------------------------|--------------|
//! | `Created`             | `Removed`, `RenamedOld`            | (no event)   |
//! | `Created`             | anything else                      | `Created`    |
//! | `Removed`, `RenamedOld` | `Created`, `RenamedNew`, `Modified` | `Modified` |
//! | `RenamedNew`          | `Modified`                         | `RenamedNew` |
//! | any                   | any other                          | later kind   |
//!
//! When a path cancels out, a later change for it starts a fresh entry at the
//! end of the batch.

use crate::event::{Event, EventType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Fold `next` into `prev`; `None` means the two cancel out
pub fn merge(prev: EventType, next: EventType) -> Option<EventType> {
    use EventType::*;

    match (prev, next) {
        (Created, Removed | RenamedOld) => None,
        (Created, _) => Some(Created),
        (Removed | RenamedOld, Created | RenamedNew | Modified) => Some(Modified),
        (RenamedNew, Modified) => Some(RenamedNew),
        (_, next) => Some(next),
    }
}

#[derive(Debug, Clone)]
struct Pending {
    path: PathBuf,
    kind: EventType,
    observed: SystemTime,
}

/// Accumulates one batch worth of changes
#[derive(Debug, Default)]
pub struct Coalescer {
    /// Detection order; `None` marks a cancelled entry
    entries: Vec<Option<Pending>>,
    /// Live path -> index into `entries`
    index: HashMap<PathBuf, usize>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one raw change
    pub fn record(&mut self, path: &Path, kind: EventType, observed: SystemTime) {
        if let Some(&slot) = self.index.get(path) {
            let merged = self.entries[slot]
                .as_ref()
                .and_then(|pending| merge(pending.kind, kind));

            match merged {
                Some(kind) => {
                    if let Some(pending) = self.entries[slot].as_mut() {
                        pending.kind = kind;
                    }
                }
                None => {
                    self.entries[slot] = None;
                    self.index.remove(path);
                }
            }
            return;
        }

        self.index.insert(path.to_path_buf(), self.entries.len());
        self.entries.push(Some(Pending {
            path: path.to_path_buf(),
            kind,
            observed,
        }));
    }

    /// True when nothing at all was recorded since the last drain,
    /// including changes that cancelled out
    pub fn is_untouched(&self) -> bool {
        self.entries.is_empty()
    }

    /// Emit the batch in detection order and reset
    pub fn drain(&mut self) -> Vec<Event> {
        self.index.clear();
        self.entries
            .drain(..)
            .flatten()
            .map(|pending| Event::new(pending.path, pending.kind, pending.observed))
            .collect()
    }
}
