//! Planners
//!
//! A planner clones the live state, searches over action sequences with the
//! [`ActionChooser`], and returns the best sequence it found as a [`Plan`].
//! Nothing a planner does touches the live state.

pub mod greedy;
pub mod mcts;

pub use greedy::GreedyPlanner;
pub use mcts::{MctsPlanner, RootStats};

use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chooser::{ActionChooser, ActionDescriptor};
use crate::config::EngineConfig;
use crate::state::{AgentState, Mobility};
use crate::terrain::{EnvironmentContext, Terrain};
use crate::valuation::refresh_valuation;

/// Ordered, timed actions to execute against the live state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub steps: Vec<ActionDescriptor>,
    pub fitness: f32,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn total_time(&self) -> f32 {
        self.steps.iter().map(|s| s.time).sum()
    }
}

pub trait Planner {
    fn name(&self) -> &'static str;

    fn plan(
        &self,
        live: &AgentState,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> Plan;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    #[default]
    Greedy,
    Mcts,
}

impl fmt::Display for PlannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannerKind::Greedy => f.write_str("greedy"),
            PlannerKind::Mcts => f.write_str("mcts"),
        }
    }
}

impl FromStr for PlannerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "greedy" => Ok(PlannerKind::Greedy),
            "mcts" => Ok(PlannerKind::Mcts),
            other => Err(format!("unknown planner '{}' (expected greedy or mcts)", other)),
        }
    }
}

/// Planner of the given kind for an agent of the given mobility.
pub fn build_planner(kind: PlannerKind, mobility: Mobility, config: &EngineConfig) -> Box<dyn Planner + Send + Sync> {
    match kind {
        PlannerKind::Greedy => Box::new(GreedyPlanner::new(mobility, &config.greedy, &config.chooser)),
        PlannerKind::Mcts => Box::new(MctsPlanner::new(mobility, &config.mcts, &config.chooser)),
    }
}

/// Simulated copy of `live` with fresh recipes and prices.
pub(crate) fn planning_base(live: &AgentState, env: &EnvironmentContext, terrain: &dyn Terrain) -> AgentState {
    let mut base = live.clone_for_planning();
    base.find_possible_recipes(&env.zone, terrain);
    refresh_valuation(&mut base);
    base
}

/// Context the simulated agent plans from. `moved` is set once a planned
/// travel step has taken it away from where the planning call started.
pub(crate) fn located<'a>(env: &'a EnvironmentContext, moved: &'a Option<EnvironmentContext>) -> &'a EnvironmentContext {
    moved.as_ref().unwrap_or(env)
}

/// Applies the position change of `step`, if it has one.
pub(crate) fn follow_step(env: &EnvironmentContext, moved: &mut Option<EnvironmentContext>, step: &ActionDescriptor) {
    if let Some(cell) = step.destination() {
        *moved = Some(env.moved_to(cell));
    }
}

/// Draws until a feasible action applies, giving up after `max_rerolls`
/// infeasible draws.
pub(crate) fn feasible_step(
    chooser: &ActionChooser,
    state: &mut AgentState,
    env: &EnvironmentContext,
    terrain: &dyn Terrain,
    rng: &mut dyn RngCore,
    max_rerolls: u32,
) -> Option<ActionDescriptor> {
    for _ in 0..=max_rerolls {
        if let Ok(descriptor) = chooser.choose_and_apply(state, env, terrain, rng) {
            return Some(descriptor);
        }
    }
    None
}

/// Current wellbeing plus 1.5 times the wellbeing after a further
/// `horizon` of idle decay. Dead states score `dead_fitness`.
pub fn fitness(state: &AgentState, horizon: f32, dead_fitness: f32) -> f32 {
    if state.is_terminal() {
        return dead_fitness;
    }
    let (health, happiness) = state.projected_wellbeing(horizon);
    state.health() + state.happiness() + 1.5 * (health + happiness)
}
