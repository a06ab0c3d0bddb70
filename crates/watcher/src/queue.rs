//! Thread-safe handoff of event batches from the worker to the consumer
//!
//! The queue is unbounded. Keeping up with growth is the consumer's job.

use crate::event::Event;
use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Ordered buffer of events shared by the worker (producer) and the consumer
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<Vec<Event>>,
    ready: Condvar,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a batch in order and wake any waiter
    ///
    /// Empty batches are ignored and wake nobody.
    pub fn push_batch(&self, batch: Vec<Event>) {
        if batch.is_empty() {
            return;
        }

        let mut events = self.events.lock();
        events.extend(batch);
        drop(events);

        self.ready.notify_all();
    }

    /// Block until the queue is non-empty or `timeout` elapses
    ///
    /// Returns whether events are available. With a single consumer a `true`
    /// result guarantees the next `pop_events` is non-empty.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        let mut events = self.events.lock();
        if events.is_empty() {
            self.ready
                .wait_while_for(&mut events, |events| events.is_empty(), timeout);
        }
        !events.is_empty()
    }

    /// Drain everything buffered, leaving the queue empty. Never blocks.
    pub fn pop_events(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Wait up to `timeout` for events and drain them under the same lock
    pub fn wait_and_pop(&self, timeout: Duration) -> Vec<Event> {
        let mut events = self.events.lock();
        if events.is_empty() {
            self.ready
                .wait_while_for(&mut events, |events| events.is_empty(), timeout);
        }
        std::mem::take(&mut *events)
    }

    /// Number of buffered events
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}
