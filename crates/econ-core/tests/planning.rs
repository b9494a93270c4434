//! Planner scenarios
//!
//! Plans are built on copies of a live state and must hold up when they are
//! executed against the live state afterwards.

use econ_core::catalogue::{Catalogue, CatalogueBuilder, ItemSpec, RecipeSpec, VehicleKind};
use econ_core::chooser::{Action, ActionChooser, ActionKind};
use econ_core::config::{ChooserConfig, GreedyConfig, MctsConfig, PopulationConfig};
use econ_core::execute::{execute, ActionExecutor, Delivery, TradeOffer};
use econ_core::need::{Need, NeedKind};
use econ_core::planner::{fitness, GreedyPlanner, MctsPlanner, Plan, Planner};
use econ_core::recipe::Harvest;
use econ_core::state::{AgentState, Mobility};
use econ_core::terrain::{CellId, EnvironmentContext, HexMap, ResourceDeposit, Terrain};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::sync::Arc;

/// One ware that feeds, one recipe that makes it from nothing in 2 units.
fn gather_catalogue() -> Arc<Catalogue> {
    let mut b = CatalogueBuilder::new(100.0);
    let food = b
        .push_item(ItemSpec::ware("food").satisfies(NeedKind::Hunger, 30.0))
        .unwrap();
    b.push_recipe(RecipeSpec::new("gather food", 2.0).product(food, 1.0))
        .unwrap();
    Arc::new(b.build().unwrap())
}

/// Population 1, nothing held, only hunger depletes (1 per unit of time).
fn hungry_traveller() -> AgentState {
    let mut needs = [Need::new(0.0, 1.0); NeedKind::COUNT];
    needs[NeedKind::Hunger.index()] = Need::new(1.0, 1.0);
    let mut state = AgentState::new(
        gather_catalogue(),
        Mobility::Traveller,
        1.0,
        needs,
        &PopulationConfig::default(),
    );
    state.set_need_value(NeedKind::Hunger, 50.0);
    state
}

/// Only production and consumption are drawn.
fn local_chooser() -> ChooserConfig {
    ChooserConfig {
        trade_weight: 0.0,
        travel_weight: 0.0,
        relinquish_weight: 0.0,
        ..ChooserConfig::default()
    }
}

/// Host stand-in with no partners and nowhere to go.
struct Stay<'a> {
    map: &'a HexMap,
}

impl ActionExecutor for Stay<'_> {
    fn terrain(&self) -> &dyn Terrain {
        self.map
    }

    fn travel(&mut self, _destination: CellId, _hops: u32) -> Option<f32> {
        None
    }

    fn trade(&mut self, _offer: &TradeOffer) -> Option<Delivery> {
        None
    }

    fn harvest(&mut self, _harvest: &Harvest) {}
}

#[test]
fn test_greedy_gathers_before_eating() {
    let live = hungry_traveller();
    let config = GreedyConfig {
        rollouts: 200,
        steps: 3,
        ..GreedyConfig::default()
    };
    let planner = GreedyPlanner::new(Mobility::Traveller, &config, &local_chooser());
    let env = EnvironmentContext::new(vec![CellId(0)]);
    let map = HexMap::flat(2, 2);
    let mut rng = SmallRng::seed_from_u64(21);

    let plan = planner.plan(&live, &env, &map, &mut rng);
    assert!(!plan.is_empty());

    let first_produce = plan.steps.iter().position(|s| s.kind() == ActionKind::Produce);
    let first_consume = plan.steps.iter().position(|s| s.kind() == ActionKind::Consume);
    let first_consume = first_consume.expect("a hungry agent should plan to eat");
    let first_produce = first_produce.expect("food has to be gathered first");
    assert!(first_produce < first_consume);

    // Doing nothing for the same time scores worse.
    let mut idle = live.clone_for_planning();
    idle.decay(plan.total_time());
    let idle_fitness = fitness(&idle, config.fitness_horizon, config.dead_fitness);
    assert!(
        plan.fitness > idle_fitness,
        "plan {} vs idle {}",
        plan.fitness,
        idle_fitness
    );
}

#[test]
fn test_plan_replays_against_live_copy() {
    let live = hungry_traveller();
    let config = GreedyConfig {
        rollouts: 100,
        steps: 4,
        ..GreedyConfig::default()
    };
    let planner = GreedyPlanner::new(Mobility::Traveller, &config, &local_chooser());
    let zone = vec![CellId(0)];
    let env = EnvironmentContext::new(zone.clone());
    let map = HexMap::flat(2, 2);
    let mut rng = SmallRng::seed_from_u64(8);
    let plan = planner.plan(&live, &env, &map, &mut rng);
    assert!(!plan.is_empty());

    // Drive the copy the way the host does: execute, age, finish production.
    let mut replay = live.clone();
    replay.find_possible_recipes(&zone, &map);
    let mut host = Stay { map: &map };
    let mut now = 0.0;
    for step in &plan.steps {
        let time = execute(&mut replay, step, &mut host, now)
            .unwrap_or_else(|e| panic!("step {:?} failed: {}", step.action, e));
        now += time;
        replay.advance(time, &zone, &map);
        replay.drain_completed(now);
    }
    assert_eq!(replay.pending_productions(), 0);
    assert!(replay.need(NeedKind::Hunger).value() > 50.0 - now);
}

#[test]
fn test_mcts_plans_first_step_with_best_mean() {
    let live = hungry_traveller();
    let config = MctsConfig {
        iterations: 150,
        max_depth: 4,
        ..MctsConfig::default()
    };
    let planner = MctsPlanner::new(Mobility::Traveller, &config, &local_chooser());
    let env = EnvironmentContext::new(vec![CellId(0)]);
    let map = HexMap::flat(2, 2);
    let mut rng = SmallRng::seed_from_u64(5);

    let (plan, roots) = planner.search(&live, &env, &map, &mut rng);
    assert!(!plan.is_empty());
    assert!(plan.len() <= 4);
    let best = roots
        .iter()
        .map(|r| r.mean_reward)
        .fold(f32::NEG_INFINITY, f32::max);
    assert!(roots
        .iter()
        .filter(|r| r.action.same_choice(&plan.steps[0]))
        .any(|r| r.mean_reward == best));
}

#[test]
fn test_trade_without_partners_never_planned() {
    let mut live = hungry_traveller();
    let food = live.catalogue().item_id("food").unwrap();
    live.collect(food, 3.0, 100.0);

    let trade_only = ChooserConfig {
        consume_weight: 0.0,
        produce_weight: 0.0,
        relinquish_weight: 0.0,
        travel_weight: 0.0,
        trade_weight: 1.0,
        ..ChooserConfig::default()
    };
    let env = EnvironmentContext::new(vec![CellId(0)]);
    let map = HexMap::flat(2, 2);
    let mut rng = SmallRng::seed_from_u64(13);

    let chooser = ActionChooser::new(Mobility::Settlement, &trade_only);
    for _ in 0..20 {
        let mut state = live.clone_for_planning();
        assert!(chooser
            .apply_kind(ActionKind::Trade, &mut state, &env, &map, &mut rng)
            .is_err());
    }

    let planner = GreedyPlanner::new(
        Mobility::Settlement,
        &GreedyConfig {
            rollouts: 10,
            ..GreedyConfig::default()
        },
        &trade_only,
    );
    let plan = planner.plan(&live, &env, &map, &mut rng);
    assert!(plan.steps.iter().all(|s| s.kind() != ActionKind::Trade));
}

/// Grain grows on every cell; reaping one unit gives one food.
fn grain_world() -> (Arc<Catalogue>, HexMap) {
    let mut b = CatalogueBuilder::new(100.0);
    let grain = b
        .push_item(ItemSpec::resource("grain", 0.0).max_amount(100.0))
        .unwrap();
    let food = b
        .push_item(ItemSpec::ware("food").satisfies(NeedKind::Hunger, 30.0))
        .unwrap();
    b.push_recipe(RecipeSpec::new("reap", 1.0).ingredient(grain, 1.0).product(food, 1.0))
        .unwrap();
    let mut map = HexMap::flat(7, 7);
    for i in 0..map.len() as u32 {
        map.add_deposit(CellId(i), ResourceDeposit::new(grain, 50.0, 100.0, 0.0));
    }
    (Arc::new(b.build().unwrap()), map)
}

/// Host stand-in that moves the agent and deducts harvests.
struct Walk {
    map: HexMap,
    position: CellId,
    speeds: [f32; VehicleKind::COUNT],
}

impl ActionExecutor for Walk {
    fn terrain(&self) -> &dyn Terrain {
        &self.map
    }

    fn travel(&mut self, destination: CellId, _hops: u32) -> Option<f32> {
        let time = self.map.time_cost(self.position, destination, &self.speeds)?;
        self.position = destination;
        Some(time)
    }

    fn trade(&mut self, _offer: &TradeOffer) -> Option<Delivery> {
        None
    }

    fn harvest(&mut self, harvest: &Harvest) {
        self.map.harvest(harvest.cell, harvest.item, harvest.amount);
    }
}

/// Executes `plan` from `start`. Returns how many produce steps ran after
/// the agent had left its starting cell.
fn replay_walking(plan: &Plan, live: &AgentState, map: &HexMap, start: CellId) -> usize {
    let mut replay = live.clone();
    replay.find_possible_recipes(&[start], map);
    let mut host = Walk {
        map: map.clone(),
        position: start,
        speeds: *replay.speed_multipliers(),
    };
    let mut now = 0.0;
    let mut produced_away = 0;

    for step in &plan.steps {
        if let Action::Produce { order } = &step.action {
            assert!(
                order.deposits.iter().all(|c| c.cell == host.position),
                "harvest planned at {:?} while standing on {:?}",
                order.deposits,
                host.position
            );
            if host.position != start {
                produced_away += 1;
            }
        }
        let time = execute(&mut replay, step, &mut host, now)
            .unwrap_or_else(|e| panic!("step {:?} failed: {}", step.action, e));
        if step.kind() == ActionKind::Travel {
            assert!((time - step.time).abs() < 1e-4, "travel took {} not {}", time, step.time);
        }
        now += time;
        replay.advance(time, &[host.position], &host.map);
        replay.drain_completed(now);
    }
    produced_away
}

#[test]
fn test_travelling_plans_replay_from_where_the_agent_stands() {
    let (catalogue, map) = grain_world();
    let start = map.cell_at(3, 3).unwrap();
    let mut live = AgentState::new(
        catalogue,
        Mobility::Traveller,
        1.0,
        [Need::new(1.0, 1.0); NeedKind::COUNT],
        &PopulationConfig::default(),
    );
    live.set_need_value(NeedKind::Hunger, 60.0);

    let walking = ChooserConfig {
        consume_weight: 1.0,
        produce_weight: 1.0,
        travel_weight: 1.0,
        trade_weight: 0.0,
        relinquish_weight: 0.0,
        ..ChooserConfig::default()
    };
    let greedy = GreedyPlanner::new(
        Mobility::Traveller,
        &GreedyConfig {
            rollouts: 40,
            steps: 5,
            ..GreedyConfig::default()
        },
        &walking,
    );
    let mcts = MctsPlanner::new(
        Mobility::Traveller,
        &MctsConfig {
            iterations: 80,
            max_depth: 5,
            ..MctsConfig::default()
        },
        &walking,
    );
    let env = EnvironmentContext::new(vec![start]);

    let mut produced_away = 0;
    for seed in 0..20 {
        let mut rng = SmallRng::seed_from_u64(seed);
        for planner in [&greedy as &dyn Planner, &mcts] {
            let plan = planner.plan(&live, &env, &map, &mut rng);
            produced_away += replay_walking(&plan, &live, &map, start);
        }
    }
    assert!(produced_away > 0, "no plan produced after travelling");
}
