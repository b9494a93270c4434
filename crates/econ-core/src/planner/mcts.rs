//! Monte Carlo tree search planner.
//!
//! Nodes live in an arena and refer to each other by index. Each iteration
//! descends with UCB1, expands one untried action, plays random feasible
//! actions to the depth limit and backs the score up to the root. The final
//! plan follows the child with the best mean reward at every depth.

use rand::{Rng, RngCore};

use super::{feasible_step, fitness, follow_step, located, planning_base, Plan, Planner};
use crate::chooser::{ActionChooser, ActionDescriptor};
use crate::config::{ChooserConfig, MctsConfig};
use crate::state::{AgentState, Mobility};
use crate::terrain::{EnvironmentContext, Terrain};

#[derive(Debug, Clone)]
struct Node {
    state: AgentState,
    /// Set once a travel step on the path here moved the agent
    moved: Option<EnvironmentContext>,
    action: Option<ActionDescriptor>,
    parent: Option<usize>,
    children: Vec<usize>,
    visits: f32,
    reward: f32,
    depth: u32,
    terminal: bool,
    /// Expansion attempts ran out; only descend from here
    saturated: bool,
}

impl Node {
    fn mean_reward(&self) -> f32 {
        self.reward / self.visits
    }
}

/// Visit statistics of one root child.
#[derive(Debug, Clone, PartialEq)]
pub struct RootStats {
    pub action: ActionDescriptor,
    pub visits: f32,
    pub mean_reward: f32,
}

#[derive(Debug, Clone)]
pub struct MctsPlanner {
    config: MctsConfig,
    chooser: ActionChooser,
}

impl MctsPlanner {
    pub fn new(mobility: Mobility, config: &MctsConfig, chooser: &ChooserConfig) -> Self {
        Self {
            config: config.clone(),
            chooser: ActionChooser::new(mobility, chooser),
        }
    }

    /// Runs the search and returns the plan with the root children's
    /// statistics.
    pub fn search(
        &self,
        live: &AgentState,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> (Plan, Vec<RootStats>) {
        if live.is_terminal() {
            return (Plan::default(), Vec::new());
        }
        let mut nodes = vec![Node {
            state: planning_base(live, env, terrain),
            moved: None,
            action: None,
            parent: None,
            children: Vec::new(),
            visits: 1.0,
            reward: 0.0,
            depth: 0,
            terminal: false,
            saturated: false,
        }];

        for _ in 0..self.config.iterations {
            let leaf = self.select(&mut nodes, env, terrain, rng);
            let score = self.simulate(&nodes[leaf], env, terrain, rng);
            back_propagate(&mut nodes, leaf, score);
        }

        let plan = extract_plan(&nodes);
        let stats = nodes[0]
            .children
            .iter()
            .filter_map(|&c| {
                let node = &nodes[c];
                node.action.clone().map(|action| RootStats {
                    action,
                    visits: node.visits,
                    mean_reward: node.mean_reward(),
                })
            })
            .collect();

        tracing::debug!(
            planner = "mcts",
            iterations = self.config.iterations,
            nodes = nodes.len(),
            steps = plan.len(),
            fitness = plan.fitness,
            "plan ready"
        );
        (plan, stats)
    }

    fn select(
        &self,
        nodes: &mut Vec<Node>,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> usize {
        let mut current = 0;
        loop {
            let node = &nodes[current];
            if node.terminal || node.depth >= self.config.max_depth {
                return current;
            }

            if node.children.is_empty() {
                if let Some(child) = self.expand(nodes, current, env, terrain, rng) {
                    return child;
                }
                nodes[current].saturated = true;
                return current;
            }

            let fully_expanded = node.saturated || node.children.len() >= self.config.max_branching;
            let exploit = rng.gen::<f32>() < self.config.exploit_probability;
            if !exploit && !fully_expanded {
                if let Some(child) = self.expand(nodes, current, env, terrain, rng) {
                    return child;
                }
                nodes[current].saturated = true;
            }

            match best_child(nodes, current, self.config.exploration, rng) {
                Some(child) => current = child,
                None => {
                    tracing::warn!(node = current, "selection reached a node without children");
                    return current;
                }
            }
        }
    }

    /// Adds one child for an action not yet tried from `parent`.
    fn expand(
        &self,
        nodes: &mut Vec<Node>,
        parent: usize,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> Option<usize> {
        let parent_moved = nodes[parent].moved.clone();
        for _ in 0..self.config.expansion_attempts {
            let mut state = nodes[parent].state.clone();
            let here = located(env, &parent_moved);
            let Ok(descriptor) = self.chooser.choose_and_apply(&mut state, here, terrain, rng) else {
                continue;
            };
            let tried = nodes[parent].children.iter().any(|&c| {
                nodes[c]
                    .action
                    .as_ref()
                    .is_some_and(|a| a.same_choice(&descriptor))
            });
            if tried {
                continue;
            }

            let mut moved = parent_moved.clone();
            follow_step(env, &mut moved, &descriptor);
            let alive = state.advance(descriptor.time, &located(env, &moved).zone, terrain);
            let index = nodes.len();
            let depth = nodes[parent].depth + 1;
            nodes.push(Node {
                state,
                moved,
                action: Some(descriptor),
                parent: Some(parent),
                children: Vec::new(),
                visits: 1.0,
                reward: 0.0,
                depth,
                terminal: !alive,
                saturated: false,
            });
            nodes[parent].children.push(index);
            return Some(index);
        }
        None
    }

    /// Random feasible playout to the depth limit, scored and scaled down
    /// the deeper the leaf sits.
    fn simulate(
        &self,
        leaf: &Node,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> f32 {
        let mut state = leaf.state.clone();
        let mut moved = leaf.moved.clone();
        let mut depth = leaf.depth;
        while depth < self.config.max_depth && !state.is_terminal() {
            let here = located(env, &moved);
            let Some(step) = feasible_step(&self.chooser, &mut state, here, terrain, rng, self.config.max_rerolls)
            else {
                break;
            };
            follow_step(env, &mut moved, &step);
            depth += 1;
            if !state.advance(step.time, &located(env, &moved).zone, terrain) {
                break;
            }
        }

        let max_depth = self.config.max_depth as f32;
        let scale = ((max_depth - leaf.depth as f32) / max_depth).powi(2);
        fitness(&state, self.config.fitness_horizon, self.config.dead_fitness) * scale
    }
}

impl Planner for MctsPlanner {
    fn name(&self) -> &'static str {
        "mcts"
    }

    fn plan(
        &self,
        live: &AgentState,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> Plan {
        self.search(live, env, terrain, rng).0
    }
}

/// UCB1 over the children of `parent`; ties are broken uniformly.
fn best_child(nodes: &[Node], parent: usize, exploration: f32, rng: &mut dyn RngCore) -> Option<usize> {
    let children = &nodes[parent].children;
    if children.is_empty() {
        return None;
    }
    let log_visits = nodes[parent].visits.ln();
    let ucb = |c: usize| {
        let child = &nodes[c];
        child.mean_reward() + exploration * (2.0 * log_visits / child.visits).sqrt()
    };

    let best = children.iter().map(|&c| ucb(c)).fold(f32::NEG_INFINITY, f32::max);
    let tied: Vec<usize> = children.iter().copied().filter(|&c| ucb(c) == best).collect();
    if tied.is_empty() {
        // NaN scores
        return children.first().copied();
    }
    Some(tied[rng.gen_range(0..tied.len())])
}

fn back_propagate(nodes: &mut [Node], leaf: usize, score: f32) {
    let mut current = Some(leaf);
    while let Some(index) = current {
        let node = &mut nodes[index];
        node.visits += 1.0;
        node.reward += score;
        current = node.parent;
    }
}

/// Child of `parent` with the best mean reward. Ties go to the child
/// expanded first.
fn best_mean_child(nodes: &[Node], parent: usize) -> Option<usize> {
    nodes[parent].children.iter().copied().fold(None, |best, c| match best {
        Some(b) if nodes[c].mean_reward().total_cmp(&nodes[b].mean_reward()).is_le() => Some(b),
        _ => Some(c),
    })
}

/// Follows [`best_mean_child`] from the root.
fn extract_plan(nodes: &[Node]) -> Plan {
    let mut plan = Plan::default();
    let mut current = 0;
    let mut first = true;

    while let Some(best) = best_mean_child(nodes, current) {
        if first {
            plan.fitness = nodes[best].mean_reward();
            first = false;
        }
        if let Some(action) = &nodes[best].action {
            plan.steps.push(action.clone());
        }
        current = best;
    }
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CatalogueBuilder, ItemSpec, RecipeSpec};
    use crate::config::PopulationConfig;
    use crate::need::{Need, NeedKind};
    use crate::terrain::{CellId, HexMap};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn hungry_settlement() -> AgentState {
        let mut b = CatalogueBuilder::new(100.0);
        let food = b
            .push_item(ItemSpec::ware("food").satisfies(NeedKind::Hunger, 30.0))
            .unwrap();
        b.push_recipe(RecipeSpec::new("gather food", 2.0).product(food, 1.0))
            .unwrap();
        let mut state = AgentState::new(
            Arc::new(b.build().unwrap()),
            Mobility::Settlement,
            2.0,
            [Need::new(1.0, 1.0); NeedKind::COUNT],
            &PopulationConfig::default(),
        );
        state.set_need_value(NeedKind::Hunger, 60.0);
        state
    }

    fn small_config() -> MctsConfig {
        MctsConfig {
            iterations: 60,
            max_depth: 5,
            ..MctsConfig::default()
        }
    }

    #[test]
    fn test_search_respects_branching_and_depth() {
        let state = hungry_settlement();
        let planner = MctsPlanner::new(Mobility::Settlement, &small_config(), &ChooserConfig::default());
        let env = EnvironmentContext::new(vec![CellId(0)]);
        let mut rng = SmallRng::seed_from_u64(21);

        let (plan, stats) = planner.search(&state, &env, &HexMap::flat(2, 2), &mut rng);
        assert!(!stats.is_empty());
        assert!(stats.len() <= small_config().max_branching);
        assert!(plan.len() <= 5);
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_first_step_has_best_mean_reward() {
        let state = hungry_settlement();
        let planner = MctsPlanner::new(Mobility::Settlement, &small_config(), &ChooserConfig::default());
        let env = EnvironmentContext::new(vec![CellId(0)]);
        let mut rng = SmallRng::seed_from_u64(5);

        let (plan, stats) = planner.search(&state, &env, &HexMap::flat(2, 2), &mut rng);
        let first = &plan.steps[0];
        let chosen = stats.iter().find(|s| &s.action == first).unwrap();
        for sibling in &stats {
            assert!(chosen.mean_reward >= sibling.mean_reward);
        }
    }

    #[test]
    fn test_plan_takes_first_of_tied_children() {
        let state = hungry_settlement();
        let node = |parent: Option<usize>, visits: f32, reward: f32, children: Vec<usize>| Node {
            state: state.clone(),
            moved: None,
            action: None,
            parent,
            children,
            visits,
            reward,
            depth: 1,
            terminal: false,
            saturated: false,
        };
        let nodes = vec![
            node(None, 9.0, 0.0, vec![1, 2, 3]),
            node(Some(0), 2.0, 4.0, Vec::new()),
            node(Some(0), 4.0, 12.0, Vec::new()),
            node(Some(0), 3.0, 9.0, Vec::new()),
        ];
        assert_eq!(best_mean_child(&nodes, 0), Some(2));
        assert_eq!(best_mean_child(&nodes, 1), None);
        assert_eq!(extract_plan(&nodes).fitness, 3.0);
    }

    #[test]
    fn test_ucb_prefers_unexplored_child() {
        let state = hungry_settlement();
        let leaf = |visits: f32, reward: f32| Node {
            state: state.clone(),
            moved: None,
            action: None,
            parent: Some(0),
            children: Vec::new(),
            visits,
            reward,
            depth: 1,
            terminal: false,
            saturated: false,
        };
        let mut root = leaf(11.0, 0.0);
        root.parent = None;
        root.children = vec![1, 2];
        let nodes = vec![root, leaf(9.0, 45.0), leaf(1.0, 4.0)];
        let mut rng = SmallRng::seed_from_u64(0);
        // 5.0 + 0.707 * sqrt(2 ln 11 / 9) vs 4.0 + 0.707 * sqrt(2 ln 11)
        assert_eq!(
            best_child(&nodes, 0, std::f32::consts::FRAC_1_SQRT_2, &mut rng),
            Some(2)
        );
        assert_eq!(best_child(&nodes, 0, 0.0, &mut rng), Some(1));
    }
}
