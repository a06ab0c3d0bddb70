//! Watch loop: start the service, print batches, stop and report failures

use crate::output::{self, Format};
use anyhow::{Context, Result};
use dirwatch::{Event, Service, WatcherConfig};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const POLL: Duration = Duration::from_millis(250);

pub fn run(
    paths: Vec<PathBuf>,
    config: WatcherConfig,
    format: Format,
    duration: Option<Duration>,
) -> Result<()> {
    let mut service = Service::new(paths, config);
    service.start().context("Failed to start watching")?;

    let deadline = duration.map(|d| Instant::now() + d);
    let stdout = io::stdout();
    let mut printed = 0usize;

    while service.is_running() {
        if deadline.map_or(false, |d| Instant::now() >= d) {
            debug!("Duration elapsed, stopping");
            break;
        }

        let events = service.wait_and_pop(POLL);
        printed += print(&mut stdout.lock(), &events, format)?;
    }

    // Stop flushes partial batches into the queue before the worker exits
    let outcome = service.stop();
    printed += print(&mut stdout.lock(), &service.pop_events(), format)?;
    info!("Printed {} events", printed);

    outcome.context("Watching failed")
}

fn print(out: &mut impl Write, events: &[Event], format: Format) -> Result<usize> {
    for event in events {
        writeln!(out, "{}", output::render(event, format)?)?;
    }
    out.flush()?;
    Ok(events.len())
}
