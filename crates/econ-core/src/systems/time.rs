//! Time-driven systems: the clock, deposit regrowth, agent ageing and
//! completion of deferred production.

use bevy_ecs::prelude::*;

use crate::components::{Clock, Economy, Territory, Tuning, WorldMap};

/// System: Advance the simulation clock by one tick
pub fn advance_clock(mut clock: ResMut<Clock>, tuning: Res<Tuning>) {
    clock.0.advance(tuning.0.simulation.tick_delta);
}

/// System: Logistic regrowth of every resource deposit
pub fn regrow_resources(mut map: ResMut<WorldMap>, tuning: Res<Tuning>) {
    map.0.regrow(tuning.0.simulation.tick_delta);
}

/// System: Needs and stacks decay, settlements grow, recipes refresh
pub fn decay_agents(
    tuning: Res<Tuning>,
    map: Res<WorldMap>,
    mut agents: Query<(&mut Economy, &Territory)>,
) {
    let delta = tuning.0.simulation.tick_delta;
    for (mut economy, territory) in &mut agents {
        if economy.0.is_terminal() {
            continue;
        }
        let zone = territory.zone(economy.0.mobility(), &map.0);
        economy.0.advance(delta, &zone, &map.0);
    }
}

/// System: Complete production whose time has come
pub fn drain_production(clock: Res<Clock>, mut agents: Query<&mut Economy>) {
    let now = clock.0.now();
    for mut economy in &mut agents {
        if economy.0.next_completion().is_some_and(|t| t <= now) {
            economy.0.drain_completed(now);
        }
    }
}
