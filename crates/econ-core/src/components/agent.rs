//! Agent Components
//!
//! An agent entity carries its identity, its economic state, the cells it
//! occupies and the plan it is working through.

use bevy_ecs::prelude::*;
use econ_events::AgentSnapshot;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::chooser::ActionDescriptor;
use crate::need::NeedKind;
use crate::planner::Plan;
use crate::state::{AgentState, Mobility};
use crate::terrain::{AgentKey, CellId, Terrain};

/// Marker component identifying an entity as an agent
#[derive(Component, Debug, Clone, Default)]
pub struct Agent;

/// Unique identifier for an agent
#[derive(Component, Debug, Clone, PartialEq, Eq, Hash)]
pub struct AgentId(pub String);

/// Human-readable name for an agent
#[derive(Component, Debug, Clone)]
pub struct AgentName(pub String);

/// Key other agents use to address this one in trades
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentHandle(pub AgentKey);

/// The agent's live economic state
#[derive(Component, Debug, Clone)]
pub struct Economy(pub AgentState);

/// Cells the agent occupies. A traveller occupies exactly one.
#[derive(Component, Debug, Clone, PartialEq)]
pub struct Territory {
    pub cells: Vec<CellId>,
}

impl Territory {
    pub fn single(cell: CellId) -> Self {
        Self { cells: vec![cell] }
    }

    pub fn position(&self) -> Option<CellId> {
        self.cells.first().copied()
    }

    pub fn move_to(&mut self, cell: CellId) {
        self.cells = vec![cell];
    }

    pub fn occupy(&mut self, cell: CellId) {
        if !self.cells.contains(&cell) {
            self.cells.push(cell);
        }
    }

    /// Zone of influence: a traveller's own cell, or a settlement's
    /// territory plus every neighbouring cell. Territory cells come first.
    pub fn zone(&self, mobility: Mobility, terrain: &dyn Terrain) -> Vec<CellId> {
        if mobility == Mobility::Traveller {
            return self.cells.clone();
        }
        let mut seen: BTreeSet<CellId> = self.cells.iter().copied().collect();
        let mut zone = self.cells.clone();
        for cell in &self.cells {
            for neighbor in terrain.neighbors(*cell) {
                if seen.insert(neighbor) {
                    zone.push(neighbor);
                }
            }
        }
        zone
    }

    /// Whether any cell of `other` lies in or next to this territory.
    pub fn touches(&self, other: &Territory, terrain: &dyn Terrain) -> bool {
        let zone = self.zone(Mobility::Settlement, terrain);
        other.cells.iter().any(|c| zone.contains(c))
    }
}

/// Remaining steps of the agent's current plan
#[derive(Component, Debug, Clone, Default)]
pub struct ActivePlan {
    pub steps: VecDeque<ActionDescriptor>,
    /// The agent is busy with its last action until this time
    pub busy_until: f32,
}

impl ActivePlan {
    pub fn replace(&mut self, plan: Plan) {
        self.steps = plan.steps.into();
    }

    pub fn is_idle(&self, now: f32) -> bool {
        now >= self.busy_until
    }

    pub fn needs_plan(&self, now: f32) -> bool {
        self.steps.is_empty() && self.is_idle(now)
    }

    /// Drops the remaining steps; returns how many were dropped.
    pub fn abort(&mut self) -> usize {
        let dropped = self.steps.len();
        self.steps.clear();
        dropped
    }
}

/// Point-in-time summary of an agent for snapshots.
pub fn snapshot_agent(id: &AgentId, name: &AgentName, state: &AgentState, territory: &Territory) -> AgentSnapshot {
    let catalogue = state.catalogue();
    let needs = NeedKind::ALL
        .iter()
        .map(|kind| (kind.label().to_string(), state.need(*kind).value()))
        .collect();
    let holdings: BTreeMap<String, f32> = state
        .held_items()
        .into_iter()
        .map(|item| (catalogue.item(item).label.clone(), state.total(item)))
        .collect();
    AgentSnapshot {
        agent_id: id.0.clone(),
        name: name.0.clone(),
        mobility: state.mobility().to_string(),
        population: state.population(),
        health: state.health(),
        happiness: state.happiness(),
        needs,
        holdings,
        cells: territory.cells.iter().map(|c| c.0).collect(),
    }
}
