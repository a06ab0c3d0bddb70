//! Background directory watching
//!
//! A [`Service`] watches one or more directory roots on a worker thread and
//! delivers latency-batched, coalesced change [`Event`]s through a thread-safe
//! queue:
//! - Native notifications via `notify` (inotify, FSEvents, ReadDirectoryChangesW)
//! - Per-root batching window, opened by the first change
//! - Per-path coalescing (create+modify is a create, create+remove is nothing)
//! - Gitignore-style ignore patterns
//! - Worker failures captured and re-raised on the caller's thread
//!
//! ```no_run
//! use dirwatch::{Service, WatcherConfig};
//! use std::time::Duration;
//!
//! let mut service = Service::new(["."], WatcherConfig::default());
//! service.start()?;
//! for event in service.wait_and_pop(Duration::from_secs(1)) {
//!     println!("{}", event);
//! }
//! service.stop()?;
//! # Ok::<(), dirwatch::WatchError>(())
//! ```

pub mod coalesce;
pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod platform;
pub mod queue;
pub mod service;
pub mod session;

pub use config::WatcherConfig;
pub use error::{Result, WatchError};
pub use event::{Event, EventType};
pub use queue::EventQueue;
pub use service::{Service, ServiceState};
pub use session::WatchSession;
