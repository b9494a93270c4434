//! World initialization: map generation and the shared resources every
//! system expects.

use bevy_ecs::prelude::*;
use econ_events::SimulationClock;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::catalogue::Catalogue;
use crate::components::{Clock, Planners, RunStats, SharedCatalogue, Tuning, WorldMap};
use crate::config::EngineConfig;
use crate::events::EventLogger;
use crate::planner::PlannerKind;
use crate::terrain::{CellId, HexMap};
use crate::SimRng;

use super::AgentCounter;

/// Random map sized by the simulation config, with deposits for every
/// resource in the catalogue.
pub fn create_world_map<R: Rng + ?Sized>(config: &EngineConfig, catalogue: &Catalogue, rng: &mut R) -> HexMap {
    HexMap::generate(
        config.simulation.map_width,
        config.simulation.map_height,
        catalogue,
        rng,
    )
}

/// Cells agents can stand on.
pub fn land_cells(map: &HexMap) -> Vec<CellId> {
    map.cells()
        .iter()
        .map(|c| c.id)
        .filter(|id| map.is_land(*id))
        .collect()
}

/// A world holding every resource the schedule needs, without agents.
pub fn init_world(
    config: EngineConfig,
    catalogue: Arc<Catalogue>,
    planner: PlannerKind,
    seed: u64,
    logger: EventLogger,
) -> World {
    let mut rng = SmallRng::seed_from_u64(seed);
    let map = create_world_map(&config, &catalogue, &mut rng);

    let mut world = World::new();
    world.insert_resource(Clock(SimulationClock::new(config.simulation.season_duration)));
    world.insert_resource(WorldMap(map));
    world.insert_resource(SharedCatalogue(catalogue));
    world.insert_resource(Planners::new(planner, &config));
    world.insert_resource(Tuning(config));
    world.insert_resource(SimRng(rng));
    world.insert_resource(RunStats::default());
    world.insert_resource(AgentCounter::default());
    world.insert_resource(logger);
    world
}
