//! World Resources
//!
//! Shared resources the systems read and write: the clock, the map, the
//! catalogue, tuning, planners and run statistics.

use bevy_ecs::prelude::*;
use econ_events::SimulationClock;
use std::sync::Arc;

use crate::catalogue::Catalogue;
use crate::config::EngineConfig;
use crate::planner::{build_planner, Planner, PlannerKind};
use crate::state::Mobility;
use crate::terrain::HexMap;

/// Host-owned simulated time
#[derive(Resource, Debug, Clone, Default)]
pub struct Clock(pub SimulationClock);

/// The terrain all agents live on
#[derive(Resource, Debug, Clone)]
pub struct WorldMap(pub HexMap);

#[derive(Resource, Debug, Clone)]
pub struct SharedCatalogue(pub Arc<Catalogue>);

#[derive(Resource, Debug, Clone, Default)]
pub struct Tuning(pub EngineConfig);

/// One planner per mobility, both of the same kind.
#[derive(Resource)]
pub struct Planners {
    pub kind: PlannerKind,
    traveller: Box<dyn Planner + Send + Sync>,
    settlement: Box<dyn Planner + Send + Sync>,
}

impl Planners {
    pub fn new(kind: PlannerKind, config: &EngineConfig) -> Self {
        Self {
            kind,
            traveller: build_planner(kind, Mobility::Traveller, config),
            settlement: build_planner(kind, Mobility::Settlement, config),
        }
    }

    pub fn for_mobility(&self, mobility: Mobility) -> &dyn Planner {
        match mobility {
            Mobility::Traveller => self.traveller.as_ref(),
            Mobility::Settlement => self.settlement.as_ref(),
        }
    }
}

/// Counters reported at the end of a run
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub plans: u64,
    pub actions_executed: u64,
    pub plans_aborted: u64,
    pub productions_completed: u64,
    pub trades: u64,
    pub perished: u64,
    pub merges: u64,
}
