//! Commands read from stdin.

use nodeflow_core::ExecutionId;
use nodeflow_trigger::Event;
use serde::Deserialize;

/// One input line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Cancel a live run: `{"cancel": "<execution ulid>"}`.
    Cancel { cancel: ExecutionId },
    /// Dispatch an event.
    Event(Event),
}

/// Parses one input line. Blank lines yield `None`.
///
/// # Errors
///
/// Returns the JSON error if the line is neither a cancel request nor an
/// event.
pub fn parse_line(line: &str) -> Result<Option<Command>, serde_json::Error> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}
