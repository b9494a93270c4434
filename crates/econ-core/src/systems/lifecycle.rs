//! Lifecycle System
//!
//! Handles what agent states report about themselves: finished production,
//! resources put back into the map, and death.

use bevy_ecs::prelude::*;
use econ_events::EventKind;

use crate::components::{AgentId, AgentName, Clock, Economy, RunStats, SharedCatalogue, WorldMap};
use crate::events::EventLogger;
use crate::state::StateEvent;

/// System: Drain state events into the log, the map and despawns
#[allow(clippy::too_many_arguments)]
pub fn process_state_events(
    mut commands: Commands,
    clock: Res<Clock>,
    catalogue: Res<SharedCatalogue>,
    mut map: ResMut<WorldMap>,
    mut logger: ResMut<EventLogger>,
    mut stats: ResMut<RunStats>,
    mut agents: Query<(Entity, &AgentId, &AgentName, &mut Economy)>,
) {
    let timestamp = clock.0.timestamp();

    for (entity, id, name, mut economy) in &mut agents {
        for event in economy.0.take_events() {
            match event {
                StateEvent::ProductionCompleted { recipe, amount } => {
                    stats.productions_completed += 1;
                    let label = catalogue
                        .0
                        .get_recipe(recipe)
                        .map_or_else(|| format!("{:?}", recipe), |r| r.label.clone());
                    let recipe = if amount > 1 { format!("{} x{}", label, amount) } else { label };
                    logger.record(timestamp.clone(), &id.0, &name.0, EventKind::ProductionCompleted { recipe });
                }
                StateEvent::DepositReplenished { cell, item, amount } => {
                    map.0.replenish(cell, item, amount, &catalogue.0);
                }
                StateEvent::Terminal { cause } => {
                    tracing::info!(agent = %id.0, name = %name.0, %cause, "agent perished");
                    logger.record(
                        timestamp.clone(),
                        &id.0,
                        &name.0,
                        EventKind::AgentPerished {
                            cause: cause.to_string(),
                        },
                    );
                    stats.perished += 1;
                    commands.entity(entity).despawn();
                }
            }
        }
    }
}
