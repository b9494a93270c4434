//! Event Logger
//!
//! Append-only JSONL event logging.

use bevy_ecs::prelude::*;
use econ_events::{generate_event_id, Event, EventKind, SimTimestamp};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Resource for logging events to a JSONL file
#[derive(Resource)]
pub struct EventLogger {
    writer: Option<BufWriter<File>>,
    event_count: u64,
    next_event_id: u64,
}

impl EventLogger {
    /// Create a new event logger writing to the specified path
    pub fn new(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(Self {
            writer: Some(BufWriter::new(file)),
            event_count: 0,
            next_event_id: 1,
        })
    }

    /// Create a logger that discards events (for testing)
    pub fn null() -> Self {
        Self {
            writer: None,
            event_count: 0,
            next_event_id: 1,
        }
    }

    /// Generate the next event ID
    pub fn next_id(&mut self) -> String {
        let id = generate_event_id(self.next_event_id);
        self.next_event_id += 1;
        id
    }

    pub fn event_count(&self) -> u64 {
        self.event_count
    }

    /// Log an event to the file
    pub fn log(&mut self, event: &Event) -> std::io::Result<()> {
        self.event_count += 1;
        if let Some(ref mut writer) = self.writer {
            let json = event.to_jsonl()?;
            writeln!(writer, "{}", json)?;
        }
        Ok(())
    }

    /// Builds and logs an event about one agent. Write failures are
    /// reported and otherwise ignored.
    pub fn record(&mut self, timestamp: SimTimestamp, agent_id: &str, agent_name: &str, kind: EventKind) {
        let id = self.next_id();
        let event = Event::new(id, timestamp, agent_id, kind).with_agent_name(agent_name);
        if let Err(e) = self.log(&event) {
            tracing::warn!(event = event.kind.name(), "failed to log event: {}", e);
        }
    }

    /// Flush the buffer to disk
    pub fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut writer) = self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

impl Drop for EventLogger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            eprintln!("Warning: Failed to flush event logger: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::BufRead;

    #[test]
    fn test_event_logging() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        let mut logger = EventLogger::new(&path).unwrap();
        logger.record(
            SimTimestamp::start(),
            "agent_0001",
            "Ashford",
            EventKind::PlanAborted {
                reason: "stale stack".to_string(),
            },
        );
        logger.flush().unwrap();

        let file = File::open(&path).unwrap();
        let lines: Vec<String> = std::io::BufReader::new(file).lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines.len(), 1);

        let parsed: Event = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(parsed.event_id, "evt_00000001");
        assert_eq!(parsed.agent_id, "agent_0001");
        assert_eq!(parsed.agent_name, "Ashford");
    }

    #[test]
    fn test_null_logger_counts() {
        let mut logger = EventLogger::null();
        logger.record(
            SimTimestamp::start(),
            "agent_1",
            "",
            EventKind::AgentPerished {
                cause: "health depleted".to_string(),
            },
        );
        assert_eq!(logger.event_count(), 1);
    }

    #[test]
    fn test_event_id_generation() {
        let mut logger = EventLogger::null();

        assert_eq!(logger.next_id(), "evt_00000001");
        assert_eq!(logger.next_id(), "evt_00000002");
        assert_eq!(logger.next_id(), "evt_00000003");
    }
}
