//! ECS Systems
//!
//! One host tick: advance the clock, regrow deposits, age every agent,
//! complete due production, plan for idle agents, execute plan steps, then
//! react to what the states report.

pub mod execution;
pub mod lifecycle;
pub mod planning;
pub mod time;

pub use execution::execute_plans;
pub use lifecycle::process_state_events;
pub use planning::plan_agents;
pub use time::{advance_clock, decay_agents, drain_production, regrow_resources};

use bevy_ecs::prelude::*;
use bevy_ecs::schedule::ExecutorKind;

/// The tick schedule. Runs single-threaded so a seed reproduces a run.
pub fn build_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.set_executor_kind(ExecutorKind::SingleThreaded);
    schedule.add_systems(
        (
            advance_clock,
            regrow_resources,
            decay_agents,
            drain_production,
            plan_agents,
            execute_plans,
            process_state_events,
        )
            .chain(),
    );
    schedule
}
