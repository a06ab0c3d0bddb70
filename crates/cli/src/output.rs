//! Event formatting

use anyhow::Result;
use dirwatch::{Event, EventType};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::time::UNIX_EPOCH;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Human,
    Json,
}

/// One line of `--json` output
#[derive(Debug, Serialize)]
struct JsonEvent {
    kind: EventType,
    path: String,
    timestamp_ms: u64,
}

pub fn render(event: &Event, format: Format) -> Result<String> {
    match format {
        Format::Human => Ok(human(event)),
        Format::Json => json(event),
    }
}

fn human(event: &Event) -> String {
    let path = event.path().display().to_string();
    let tag = format!("{:<12}", event.kind().as_str());
    let tag = match event.kind() {
        EventType::Created => tag.green().to_string(),
        EventType::Modified => tag.yellow().to_string(),
        EventType::Removed => tag.red().to_string(),
        EventType::RenamedOld | EventType::RenamedNew => tag.cyan().to_string(),
    };
    format!("{} {}", tag, path)
}

fn json(event: &Event) -> Result<String> {
    let timestamp_ms = event
        .timestamp()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0);

    let line = JsonEvent {
        kind: event.kind(),
        path: event.path().display().to_string(),
        timestamp_ms,
    };
    Ok(serde_json::to_string(&line)?)
}
