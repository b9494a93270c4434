//! Agent Spawning
//!
//! Places settlements and travellers on the map. A settlement founded next
//! to an existing one absorbs it.

use bevy_ecs::prelude::*;
use econ_events::EventKind;
use rand::{Rng, RngCore};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::components::{
    ActivePlan, Agent, AgentHandle, AgentId, AgentName, Clock, Economy, RunStats, SharedCatalogue, Territory,
    Tuning, WorldMap,
};
use crate::events::EventLogger;
use crate::need::{generate_needs, Need, NeedKind};
use crate::random::pick;
use crate::state::{AgentState, Mobility};
use crate::terrain::{AgentKey, CellId};

use super::land_cells;

const NAME_STARTS: [&str; 14] = [
    "Ash", "Bram", "Cold", "Elm", "Fern", "Gray", "Hollow", "Iron", "Kings", "Marsh", "Oak", "Stone", "Thorn",
    "Wil",
];
const NAME_ENDS: [&str; 8] = ["ford", "wick", "by", "stead", "holm", "ton", "mere", "dale"];

/// Attempts at finding a free cell for a new settlement
const PLACEMENT_TRIES: u32 = 64;

/// Source of agent ids and trade keys
#[derive(Resource, Debug, Clone, Default)]
pub struct AgentCounter {
    pub spawned: u64,
}

impl AgentCounter {
    fn next(&mut self) -> (AgentId, AgentKey) {
        self.spawned += 1;
        (AgentId(format!("agent_{:04}", self.spawned)), AgentKey(self.spawned))
    }
}

/// Count of spawned agents by mobility
#[derive(Debug, Clone, Default)]
pub struct SpawnSummary {
    pub total_agents: usize,
    pub by_mobility: BTreeMap<String, usize>,
}

fn random_name(rng: &mut dyn RngCore) -> String {
    let start = NAME_STARTS[rng.gen_range(0..NAME_STARTS.len())];
    let end = NAME_ENDS[rng.gen_range(0..NAME_ENDS.len())];
    format!("{}{}", start, end)
}

fn new_state(world: &World, mobility: Mobility, founder: Option<&[Need; NeedKind::COUNT]>, rng: &mut dyn RngCore) -> AgentState {
    let config = &world.resource::<Tuning>().0;
    let catalogue = Arc::clone(&world.resource::<SharedCatalogue>().0);
    let needs = generate_needs(rng, &config.needs, config.simulation.season_duration, founder);
    let population = match mobility {
        Mobility::Settlement => config.population.settlement_start,
        Mobility::Traveller => config.population.traveller_start,
    };
    AgentState::new(catalogue, mobility, population, needs, &config.population)
}

fn spawn_agent(world: &mut World, name: String, state: AgentState, territory: Territory) -> Entity {
    let (id, key) = world.resource_mut::<AgentCounter>().next();
    let timestamp = world.resource::<Clock>().0.timestamp();
    let kind = EventKind::AgentSpawned {
        mobility: state.mobility().to_string(),
        population: state.population(),
    };
    world
        .resource_mut::<EventLogger>()
        .record(timestamp, &id.0, &name, kind);
    tracing::debug!(agent = %id.0, name = %name, mobility = %state.mobility(), "agent spawned");

    world
        .spawn((
            Agent,
            id,
            AgentName(name),
            AgentHandle(key),
            Economy(state),
            territory,
            ActivePlan::default(),
        ))
        .id()
}

/// Settlements as (entity, territory, population).
fn settlements(world: &mut World) -> Vec<(Entity, Territory, f32)> {
    let mut query = world.query::<(Entity, &Territory, &Economy)>();
    query
        .iter(world)
        .filter(|(_, _, econ)| econ.0.mobility() == Mobility::Settlement)
        .map(|(e, t, econ)| (e, t.clone(), econ.0.population()))
        .collect()
}

/// Founds a settlement on `cell`, absorbing any settlement next to it.
/// Returns `None` when the cell already belongs to a settlement.
pub fn spawn_settlement(
    world: &mut World,
    cell: CellId,
    founder: Option<&[Need; NeedKind::COUNT]>,
    rng: &mut dyn RngCore,
) -> Option<Entity> {
    let existing = settlements(world);
    if existing.iter().any(|(_, t, _)| t.cells.contains(&cell)) {
        tracing::warn!(%cell, "tried to found a settlement inside another");
        return None;
    }

    let territory = Territory::single(cell);
    let neighbours: Vec<(Entity, f32)> = {
        let map = &world.resource::<WorldMap>().0;
        existing
            .iter()
            .filter(|(_, t, _)| territory.touches(t, map))
            .map(|(e, _, pop)| (*e, *pop))
            .collect()
    };

    let state = new_state(world, Mobility::Settlement, founder, rng);
    let name = random_name(rng);
    let entity = spawn_agent(world, name, state, territory);
    for (other, _) in neighbours {
        merge_settlements(world, entity, other);
    }
    Some(entity)
}

/// Spawns a traveller on `cell`, inheriting needs from `founder` if given.
pub fn spawn_traveller(
    world: &mut World,
    cell: CellId,
    founder: Option<&[Need; NeedKind::COUNT]>,
    rng: &mut dyn RngCore,
) -> Entity {
    let state = new_state(world, Mobility::Traveller, founder, rng);
    let name = format!("{} wanderers", random_name(rng));
    spawn_agent(world, name, state, Territory::single(cell))
}

/// Moves `absorbed` into `survivor`: holdings, population and cells. The
/// survivor keeps the name of the larger of the two.
pub fn merge_settlements(world: &mut World, survivor: Entity, absorbed: Entity) {
    if survivor == absorbed {
        return;
    }
    let Some((absorbed_id, absorbed_name, economy, territory)) = ({
        let entity = world.get_entity(absorbed);
        entity.and_then(|e| {
            Some((
                e.get::<AgentId>()?.clone(),
                e.get::<AgentName>()?.clone(),
                e.get::<Economy>()?.clone(),
                e.get::<Territory>()?.clone(),
            ))
        })
    }) else {
        return;
    };
    let Some(mut entity) = world.get_entity_mut(survivor) else {
        return;
    };

    let larger = entity
        .get::<Economy>()
        .map_or(true, |e| economy.0.population() > e.0.population());
    if larger {
        if let Some(mut name) = entity.get_mut::<AgentName>() {
            name.0 = absorbed_name.0.clone();
        }
    }
    if let Some(mut own) = entity.get_mut::<Territory>() {
        for cell in territory.cells {
            own.occupy(cell);
        }
    }
    if let Some(mut own) = entity.get_mut::<Economy>() {
        own.0.merge(economy.0);
    }
    let survivor_id = entity.get::<AgentId>().map(|id| id.0.clone()).unwrap_or_default();
    let survivor_name = entity.get::<AgentName>().map(|n| n.0.clone()).unwrap_or_default();

    world.despawn(absorbed);
    world.resource_mut::<RunStats>().merges += 1;
    let timestamp = world.resource::<Clock>().0.timestamp();
    world.resource_mut::<EventLogger>().record(
        timestamp,
        &survivor_id,
        &survivor_name,
        EventKind::SettlementsMerged {
            absorbed_id: absorbed_id.0,
        },
    );
    tracing::info!(survivor = %survivor_id, absorbed = %absorbed_name.0, "settlements merged");
}

/// Founds `settlements` settlements on free land, then places `travellers`
/// travellers, each on the cell of a random settlement whose needs it
/// inherits (or on random land when there is none).
pub fn spawn_initial_agents(
    world: &mut World,
    rng: &mut dyn RngCore,
    settlements_wanted: u32,
    travellers: u32,
) -> SpawnSummary {
    let land = land_cells(&world.resource::<WorldMap>().0);
    if land.is_empty() {
        tracing::warn!("map has no land; no agents spawned");
        return SpawnSummary::default();
    }

    for _ in 0..settlements_wanted {
        for _ in 0..PLACEMENT_TRIES {
            let Some(&cell) = pick(rng, &land) else {
                break;
            };
            if spawn_settlement(world, cell, None, rng).is_some() {
                break;
            }
        }
    }

    for _ in 0..travellers {
        let homes = settlements(world);
        let home = pick(rng, &homes).map(|(e, t, _)| (*e, t.position()));
        let (cell, founder) = match home {
            Some((entity, Some(cell))) => {
                let needs = world.get::<Economy>(entity).map(|e| *e.0.needs());
                (cell, needs)
            }
            _ => match pick(rng, &land) {
                Some(&cell) => (cell, None),
                None => break,
            },
        };
        spawn_traveller(world, cell, founder.as_ref(), rng);
    }

    spawn_summary(world)
}

pub fn spawn_summary(world: &mut World) -> SpawnSummary {
    let mut query = world.query::<&Economy>();
    let mut summary = SpawnSummary::default();
    for econ in query.iter(world) {
        summary.total_agents += 1;
        *summary
            .by_mobility
            .entry(econ.0.mobility().to_string())
            .or_insert(0) += 1;
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::CatalogueBuilder;
    use crate::config::EngineConfig;
    use crate::planner::PlannerKind;
    use crate::setup::init_world;
    use crate::terrain::HexMap;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn flat_world() -> World {
        let catalogue = Arc::new(CatalogueBuilder::new(60.0).build().unwrap());
        let mut world = init_world(
            EngineConfig::default(),
            catalogue,
            PlannerKind::Greedy,
            1,
            EventLogger::null(),
        );
        world.insert_resource(WorldMap(HexMap::flat(6, 6)));
        world
    }

    #[test]
    fn test_settlement_cannot_share_a_cell() {
        let mut world = flat_world();
        let mut rng = SmallRng::seed_from_u64(3);
        assert!(spawn_settlement(&mut world, CellId(0), None, &mut rng).is_some());
        assert!(spawn_settlement(&mut world, CellId(0), None, &mut rng).is_none());
    }

    #[test]
    fn test_adjacent_settlements_merge() {
        let mut world = flat_world();
        let mut rng = SmallRng::seed_from_u64(3);
        spawn_settlement(&mut world, CellId(14), None, &mut rng).unwrap();
        let second = spawn_settlement(&mut world, CellId(15), None, &mut rng).unwrap();

        let summary = spawn_summary(&mut world);
        assert_eq!(summary.total_agents, 1);
        let territory = world.get::<Territory>(second).unwrap();
        assert_eq!(territory.cells, vec![CellId(15), CellId(14)]);
        let economy = world.get::<Economy>(second).unwrap();
        assert_eq!(economy.0.population(), 100.0);
        assert_eq!(world.resource::<RunStats>().merges, 1);
    }

    #[test]
    fn test_initial_agents_follow_request() {
        let mut world = flat_world();
        let mut rng = SmallRng::seed_from_u64(9);
        let summary = spawn_initial_agents(&mut world, &mut rng, 1, 3);
        assert_eq!(summary.by_mobility.get("settlement"), Some(&1));
        assert_eq!(summary.by_mobility.get("traveller"), Some(&3));
    }
}
