//! Normalized change events delivered to consumers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Kind of change observed for a path
///
/// The set is closed. Native notifications that do not describe a mutation
/// (reads, closes) are dropped by the session; anything else that has no
/// exact counterpart is reported as `Modified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    /// Path came into existence
    Created,
    /// Contents or metadata changed
    Modified,
    /// Path was deleted
    Removed,
    /// Path was the source of a rename
    RenamedOld,
    /// Path was the destination of a rename
    RenamedNew,
}

impl EventType {
    /// Stable lowercase name, used by `Display`
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Created => "created",
            EventType::Modified => "modified",
            EventType::Removed => "removed",
            EventType::RenamedOld => "renamed-old",
            EventType::RenamedNew => "renamed-new",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed (and coalesced) change
///
/// Renders as `"<type> <path>"`, for example `created /tmp/w/a.txt`.
/// Two events are equal when path, type and timestamp all match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Event {
    path: PathBuf,
    kind: EventType,
    timestamp: SystemTime,
}

impl Event {
    /// Create an event observed at `timestamp`
    pub fn new(path: impl Into<PathBuf>, kind: EventType, timestamp: SystemTime) -> Self {
        Self {
            path: path.into(),
            kind,
            timestamp,
        }
    }

    /// Path that changed (absolute, under the canonical watch root)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Type of change
    pub fn kind(&self) -> EventType {
        self.kind
    }

    /// Wall-clock time the first raw change for this path was ingested
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.path.display())
    }
}
