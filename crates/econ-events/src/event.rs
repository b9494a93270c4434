//! Event Types
//!
//! Records emitted by the host as agents plan, act, produce and perish.
//! Written as one JSON object per line.

use serde::{Deserialize, Serialize};

use crate::SimTimestamp;

/// Generates an event ID with the given sequence number.
pub fn generate_event_id(sequence: u64) -> String {
    format!("evt_{:08}", sequence)
}

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// An agent entered the world.
    AgentSpawned { mobility: String, population: f32 },
    /// A planner produced a new plan for the agent.
    PlanCreated {
        planner: String,
        steps: Vec<String>,
    },
    /// One plan step was applied to the live state.
    ActionExecuted {
        action: String,
        description: String,
        time: f32,
    },
    /// The remainder of a plan was discarded.
    PlanAborted { reason: String },
    /// A deferred production finished and its outputs were collected.
    ProductionCompleted { recipe: String },
    /// Goods changed hands between two co-located agents.
    TradeCompleted {
        partner_id: String,
        gave: String,
        received: String,
    },
    /// The agent reached a terminal state.
    AgentPerished { cause: String },
    /// Another settlement was absorbed into this one.
    SettlementsMerged { absorbed_id: String },
}

impl EventKind {
    /// Short snake_case name of the variant.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::AgentSpawned { .. } => "agent_spawned",
            EventKind::PlanCreated { .. } => "plan_created",
            EventKind::ActionExecuted { .. } => "action_executed",
            EventKind::PlanAborted { .. } => "plan_aborted",
            EventKind::ProductionCompleted { .. } => "production_completed",
            EventKind::TradeCompleted { .. } => "trade_completed",
            EventKind::AgentPerished { .. } => "agent_perished",
            EventKind::SettlementsMerged { .. } => "settlements_merged",
        }
    }
}

/// A single logged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier (e.g., "evt_00000042")
    pub event_id: String,
    /// When the event occurred
    pub timestamp: SimTimestamp,
    /// Agent the event is about
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_name: String,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl Event {
    pub fn new(
        event_id: impl Into<String>,
        timestamp: SimTimestamp,
        agent_id: impl Into<String>,
        kind: EventKind,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            timestamp,
            agent_id: agent_id.into(),
            agent_name: String::new(),
            kind,
        }
    }

    pub fn with_agent_name(mut self, name: impl Into<String>) -> Self {
        self.agent_name = name.into();
        self
    }

    /// Serializes the event as a single JSONL line (no trailing newline).
    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_format() {
        assert_eq!(generate_event_id(42), "evt_00000042");
    }

    #[test]
    fn test_event_serializes_flat_kind() {
        let event = Event::new(
            generate_event_id(1),
            SimTimestamp::start(),
            "agent_0001",
            EventKind::AgentPerished {
                cause: "starvation".to_string(),
            },
        )
        .with_agent_name("Ashford");

        let line = event.to_jsonl().unwrap();
        assert!(line.contains("\"type\":\"agent_perished\""));
        assert!(line.contains("\"date\":\"year_1.spring.day_1\""));

        let back: Event = serde_json::from_str(&line).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_empty_agent_name_is_omitted() {
        let event = Event::new(
            generate_event_id(2),
            SimTimestamp::start(),
            "agent_0002",
            EventKind::PlanAborted {
                reason: "stale stack".to_string(),
            },
        );
        let line = event.to_jsonl().unwrap();
        assert!(!line.contains("agent_name"));
        assert_eq!(event.kind.name(), "plan_aborted");
    }
}
