//! Planning System
//!
//! Idle agents without remaining steps get a fresh plan. Settlements see
//! every agent inside their zone of influence as a trade partner.

use bevy_ecs::prelude::*;
use econ_events::EventKind;

use crate::chooser::describe_action;
use crate::components::{ActivePlan, AgentHandle, AgentId, AgentName, Clock, Economy, Planners, RunStats, SharedCatalogue, Territory, WorldMap};
use crate::events::EventLogger;
use crate::state::Mobility;
use crate::terrain::{CellId, EnvironmentContext, TradePartner};
use crate::SimRng;

#[allow(clippy::too_many_arguments)]
pub fn plan_agents(
    clock: Res<Clock>,
    map: Res<WorldMap>,
    catalogue: Res<SharedCatalogue>,
    planners: Res<Planners>,
    mut rng: ResMut<SimRng>,
    mut logger: ResMut<EventLogger>,
    mut stats: ResMut<RunStats>,
    mut agents: Query<(Entity, &AgentId, &AgentName, &AgentHandle, &Economy, &Territory, &mut ActivePlan)>,
) {
    let now = clock.0.now();
    let timestamp = clock.0.timestamp();

    let waiting: Vec<Entity> = agents
        .iter()
        .filter(|(_, _, _, _, economy, _, plan)| !economy.0.is_terminal() && plan.needs_plan(now))
        .map(|(entity, ..)| entity)
        .collect();
    if waiting.is_empty() {
        return;
    }
    let occupants: Vec<(Entity, Vec<CellId>)> = agents
        .iter()
        .filter(|(_, _, _, _, economy, _, _)| !economy.0.is_terminal())
        .map(|(entity, _, _, _, _, territory, _)| (entity, territory.cells.clone()))
        .collect();

    for entity in waiting {
        let Ok((_, id, name, _, economy, territory, _)) = agents.get(entity) else {
            continue;
        };
        let mobility = economy.0.mobility();
        let zone = territory.zone(mobility, &map.0);

        let partners = if mobility == Mobility::Settlement {
            occupants
                .iter()
                .filter(|(other, cells)| *other != entity && cells.iter().any(|c| zone.contains(c)))
                .filter_map(|(other, _)| agents.get(*other).ok())
                .map(|(_, _, _, handle, other_economy, _, _)| TradePartner {
                    key: handle.0,
                    state: other_economy.0.clone(),
                })
                .collect()
        } else {
            Vec::new()
        };
        let env = EnvironmentContext::new(zone).with_partners(partners);

        let planner = planners.for_mobility(mobility);
        let plan = planner.plan(&economy.0, &env, &map.0, &mut rng.0);
        if plan.is_empty() {
            continue;
        }

        let steps = plan.steps.iter().map(|s| describe_action(s, &catalogue.0)).collect();
        logger.record(
            timestamp.clone(),
            &id.0,
            &name.0,
            EventKind::PlanCreated {
                planner: planner.name().to_string(),
                steps,
            },
        );
        tracing::debug!(agent = %id.0, steps = plan.len(), fitness = plan.fitness, "new plan");
        stats.plans += 1;

        if let Ok((.., mut active)) = agents.get_mut(entity) {
            active.replace(plan);
        }
    }
}
