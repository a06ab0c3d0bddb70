//! Error taxonomy for the watch service
//!
//! Setup errors (`Setup`, `UnsupportedConfiguration`, `AlreadyStarted`,
//! `InvalidConfiguration`, `Spawn`) are returned synchronously from
//! `Service::start`.
//! Runtime errors are raised on the worker thread, stored by the service and
//! handed back through `Service::rethrow`. Every variant is `Clone` so the
//! same stored failure can be returned any number of times.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type for watch operations
pub type Result<T> = std::result::Result<T, WatchError>;

/// Errors raised by sessions and the service
#[derive(Debug, Clone, Error)]
pub enum WatchError {
    /// A configured path is missing, not a directory, or refused by the native layer
    #[error("cannot watch {}: {reason}", .path.display())]
    Setup { path: PathBuf, reason: String },

    /// Recursive watching requested from a backend that cannot provide it
    #[error("recursive watching is not supported by the {backend} backend")]
    UnsupportedConfiguration { backend: &'static str },

    /// `start()` called on a service that is not idle
    #[error("watch service already started")]
    AlreadyStarted,

    /// Configuration values out of range or malformed
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration file could not be read
    #[error("failed to read configuration {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// Configuration file is not valid TOML for `WatcherConfig`
    #[error("failed to parse configuration: {0}")]
    ConfigParse(String),

    /// The native layer reported an error for a live watch
    #[error("native watch on {} failed: {source}", .path.display())]
    Native {
        path: PathBuf,
        #[source]
        source: Arc<notify::Error>,
    },

    /// The native handle went away while the session still owned it
    #[error("native watch handle for {} was closed unexpectedly", .path.display())]
    HandleInvalidated { path: PathBuf },

    /// The watched root itself was deleted or moved away
    #[error("watched root {} was removed", .path.display())]
    RootRemoved { path: PathBuf },

    /// The worker thread could not be spawned
    #[error("failed to spawn watch worker: {0}")]
    Spawn(#[source] Arc<io::Error>),

    /// The worker thread panicked
    #[error("watch worker panicked: {0}")]
    WorkerPanicked(String),
}

impl WatchError {
    /// Build a setup error for `path`
    pub fn setup(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        WatchError::Setup {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a native error raised while watching `path`
    pub fn native(path: impl Into<PathBuf>, source: notify::Error) -> Self {
        WatchError::Native {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    /// True for failures raised on the worker thread after a successful start
    pub fn is_runtime(&self) -> bool {
        matches!(
            self,
            WatchError::Native { .. }
                | WatchError::HandleInvalidated { .. }
                | WatchError::RootRemoved { .. }
                | WatchError::WorkerPanicked(_)
        )
    }
}
