//! Greedy stochastic planner: many independent random rollouts, keep the
//! fittest.

use rand::RngCore;

use super::{feasible_step, fitness, follow_step, located, planning_base, Plan, Planner};
use crate::chooser::ActionChooser;
use crate::config::{ChooserConfig, GreedyConfig};
use crate::state::{AgentState, Mobility};
use crate::terrain::{EnvironmentContext, Terrain};

#[derive(Debug, Clone)]
pub struct GreedyPlanner {
    config: GreedyConfig,
    chooser: ActionChooser,
}

impl GreedyPlanner {
    pub fn new(mobility: Mobility, config: &GreedyConfig, chooser: &ChooserConfig) -> Self {
        Self {
            config: config.clone(),
            chooser: ActionChooser::new(mobility, chooser),
        }
    }

    fn rollout(
        &self,
        base: &AgentState,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> Plan {
        let mut state = base.clone();
        let mut steps = Vec::with_capacity(self.config.steps as usize);
        let mut moved = None;

        for _ in 0..self.config.steps {
            let here = located(env, &moved);
            let Some(step) = feasible_step(&self.chooser, &mut state, here, terrain, rng, self.config.max_rerolls)
            else {
                break;
            };
            follow_step(env, &mut moved, &step);
            let time = step.time;
            steps.push(step);
            if !state.advance(time, &located(env, &moved).zone, terrain) {
                break;
            }
        }

        Plan {
            steps,
            fitness: fitness(&state, self.config.fitness_horizon, self.config.dead_fitness),
        }
    }
}

impl Planner for GreedyPlanner {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn plan(
        &self,
        live: &AgentState,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> Plan {
        if live.is_terminal() {
            return Plan::default();
        }
        let base = planning_base(live, env, terrain);
        let mut best: Option<Plan> = None;

        for _ in 0..self.config.rollouts {
            let candidate = self.rollout(&base, env, terrain, rng);
            if best.as_ref().map_or(true, |b| candidate.fitness > b.fitness) {
                best = Some(candidate);
            }
        }

        let best = best.unwrap_or_default();
        tracing::debug!(
            planner = "greedy",
            rollouts = self.config.rollouts,
            steps = best.len(),
            fitness = best.fitness,
            "plan ready"
        );
        best
    }
}
