//! Multiplexed wait across native handles and a stop signal

use super::NativeHandle;
use crossbeam_channel::{Receiver, Select, Sender, TryRecvError};
use std::cell::Cell;
use std::time::Instant;

/// Result of one [`WaitSet::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Handle at this position has pending records (or was disconnected)
    Ready(usize),
    /// The stop signal fired, or its sender was dropped
    Stopped,
    /// The deadline passed first
    TimedOut,
}

/// Stop signal plus the logic to block on it together with any handles
///
/// The stop signal always takes part in the wait, so a stop request wakes a
/// blocked worker immediately instead of after a polling interval.
#[derive(Debug)]
pub struct WaitSet {
    stop: Receiver<()>,
    stopped: Cell<bool>,
}

impl WaitSet {
    /// Create a wait set and the sender that stops it
    pub fn channel() -> (StopSignal, Self) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let waits = Self {
            stop: rx,
            stopped: Cell::new(false),
        };
        (StopSignal { tx }, waits)
    }

    /// Block until a handle is ready, stop is signalled, or `deadline` passes
    ///
    /// `None` waits without a deadline. When stop and a handle are ready at
    /// the same time, stop wins.
    pub fn wait<'h, I>(&self, handles: I, deadline: Option<Instant>) -> WaitOutcome
    where
        I: IntoIterator<Item = &'h NativeHandle>,
    {
        if self.is_stopped() {
            return WaitOutcome::Stopped;
        }

        let mut select = Select::new();
        let stop_index = select.recv(&self.stop);
        let mut positions = Vec::new();
        for handle in handles {
            positions.push(select.recv(handle.receiver()));
        }

        loop {
            let ready = match deadline {
                Some(deadline) => match select.ready_deadline(deadline) {
                    Ok(index) => index,
                    Err(_) => return WaitOutcome::TimedOut,
                },
                None => select.ready(),
            };

            // Readiness may be spurious; the stop channel is checked for real
            if self.is_stopped() {
                return WaitOutcome::Stopped;
            }
            if ready == stop_index {
                continue;
            }

            if let Some(position) = positions.iter().position(|&index| index == ready) {
                return WaitOutcome::Ready(position);
            }
        }
    }

    /// Whether stop was signalled, without blocking
    ///
    /// Stop is sticky: once seen it keeps reporting true.
    pub fn is_stopped(&self) -> bool {
        if self.stopped.get() {
            return true;
        }
        match self.stop.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                self.stopped.set(true);
                true
            }
            Err(TryRecvError::Empty) => false,
        }
    }
}

/// Sending half of a [`WaitSet`]'s stop signal
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Sender<()>,
}

impl StopSignal {
    /// Request stop; repeated calls are harmless
    pub fn stop(&self) {
        // A full channel already carries a pending stop
        let _ = self.tx.try_send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::RawRecord;
    use std::thread;
    use std::time::Duration;

    fn handle() -> (Sender<RawRecord>, NativeHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (tx, NativeHandle::new("/w", rx, ()))
    }

    #[test]
    fn test_times_out_without_activity() {
        let (_signal, waits) = WaitSet::channel();
        let (_tx, h) = handle();

        let outcome = waits.wait([&h], Some(Instant::now() + Duration::from_millis(30)));
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[test]
    fn test_reports_ready_position() {
        let (_signal, waits) = WaitSet::channel();
        let (_tx0, h0) = handle();
        let (tx1, h1) = handle();

        tx1.send(Err(notify::Error::generic("x"))).unwrap();
        assert_eq!(waits.wait([&h0, &h1], None), WaitOutcome::Ready(1));
    }

    #[test]
    fn test_stop_wakes_blocked_wait() {
        let (signal, waits) = WaitSet::channel();
        let (_tx, h) = handle();

        let stopper = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            signal.stop();
            signal.stop();
        });

        let start = Instant::now();
        assert_eq!(waits.wait([&h], None), WaitOutcome::Stopped);
        assert!(start.elapsed() < Duration::from_secs(5));
        stopper.join().unwrap();

        // Sticky
        assert!(waits.is_stopped());
        assert_eq!(waits.wait([&h], None), WaitOutcome::Stopped);
    }

    #[test]
    fn test_stop_readiness_without_message_is_not_a_stop() {
        let (signal, waits) = WaitSet::channel();
        let (_tx, h) = handle();

        // A second receiver competes for the stop message. Whoever loses may
        // still have seen the channel as ready.
        let thief = waits.stop.clone();
        let racer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            signal.stop();
            let stolen = thief.recv_timeout(Duration::from_millis(100)).is_ok();
            (signal, stolen)
        });

        let outcome = waits.wait([&h], Some(Instant::now() + Duration::from_millis(300)));
        let (_signal, stolen) = racer.join().unwrap();

        if stolen {
            assert_eq!(outcome, WaitOutcome::TimedOut);
            assert!(!waits.is_stopped());
        } else {
            assert_eq!(outcome, WaitOutcome::Stopped);
        }
    }

    #[test]
    fn test_dropped_signal_counts_as_stop() {
        let (signal, waits) = WaitSet::channel();
        drop(signal);

        let none: [&NativeHandle; 0] = [];
        assert_eq!(waits.wait(none, None), WaitOutcome::Stopped);
    }

    #[test]
    fn test_stop_wins_over_ready_handle() {
        let (signal, waits) = WaitSet::channel();
        let (tx, h) = handle();

        tx.send(Err(notify::Error::generic("x"))).unwrap();
        signal.stop();
        assert_eq!(waits.wait([&h], None), WaitOutcome::Stopped);
    }
}
