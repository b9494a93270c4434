//! Snapshot Types
//!
//! Point-in-time summaries of agents, plus the manifest describing a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::SimTimestamp;

/// Generates a snapshot ID with the given sequence number.
pub fn generate_snapshot_id(sequence: u64) -> String {
    format!("snap_{:06}", sequence)
}

/// Summary of one agent's economic state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub name: String,
    /// "traveller" or "settlement"
    pub mobility: String,
    pub population: f32,
    pub health: f32,
    pub happiness: f32,
    /// Need label -> current value
    #[serde(default)]
    pub needs: BTreeMap<String, f32>,
    /// Item label -> total held amount
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub holdings: BTreeMap<String, f32>,
    /// Cells the agent occupies (one for travellers)
    #[serde(default)]
    pub cells: Vec<u32>,
}

/// All living agents at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub snapshot_id: String,
    pub timestamp: SimTimestamp,
    pub agents: Vec<AgentSnapshot>,
}

impl WorldSnapshot {
    pub fn new(sequence: u64, timestamp: SimTimestamp, agents: Vec<AgentSnapshot>) -> Self {
        Self {
            snapshot_id: generate_snapshot_id(sequence),
            timestamp,
            agents,
        }
    }

    /// Total population over all agents.
    pub fn total_population(&self) -> f32 {
        self.agents.iter().map(|a| a.population).sum()
    }
}

/// Parameters a run was started with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub seed: u64,
    pub planner: String,
    pub ticks: u64,
    pub tick_delta: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalogue: Option<String>,
}

impl RunManifest {
    pub fn new(seed: u64, planner: impl Into<String>, ticks: u64, tick_delta: f32) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            seed,
            planner: planner.into(),
            ticks,
            tick_delta,
            catalogue: None,
        }
    }
}
