//! Action Chooser
//!
//! Stochastic single-step policy. Picks an action kind by weight, resolves a
//! concrete target and quantity, and applies it to the (cloned) state. An
//! action that cannot be resolved comes back as [`Infeasible`]; callers
//! re-roll.

use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::catalogue::{Catalogue, ItemId, RecipeId};
use crate::config::ChooserConfig;
use crate::random::{gaussian, pick, weighted_index};
use crate::recipe::{Portion, RecipeOrder};
use crate::stack::StackId;
use crate::state::{AgentState, Mobility};
use crate::terrain::{AgentKey, CellId, EnvironmentContext, Terrain};
use crate::valuation::value_of;

/// Planning clones complete production on the spot, so any time will do.
const PLANNING_NOW: f32 = 0.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Consume,
    Produce,
    Trade,
    Relinquish,
    Travel,
}

impl ActionKind {
    pub const COUNT: usize = 5;
    pub const ALL: [ActionKind; ActionKind::COUNT] = [
        ActionKind::Consume,
        ActionKind::Produce,
        ActionKind::Trade,
        ActionKind::Relinquish,
        ActionKind::Travel,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionKind::Consume => "consume",
            ActionKind::Produce => "produce",
            ActionKind::Trade => "trade",
            ActionKind::Relinquish => "relinquish",
            ActionKind::Travel => "travel",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A resolved action with its target and quantities.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Consume {
        stack: StackId,
        item: ItemId,
        amount: f32,
    },
    Produce {
        order: RecipeOrder,
    },
    /// Both sides exchange: `give` leaves this agent, `take` arrives.
    Trade {
        partner: AgentKey,
        give: Portion,
        give_item: ItemId,
        take: Portion,
        take_item: ItemId,
    },
    Relinquish {
        stack: StackId,
        item: ItemId,
        amount: f32,
    },
    Travel {
        destination: CellId,
        hops: u32,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Consume { .. } => ActionKind::Consume,
            Action::Produce { .. } => ActionKind::Produce,
            Action::Trade { .. } => ActionKind::Trade,
            Action::Relinquish { .. } => ActionKind::Relinquish,
            Action::Travel { .. } => ActionKind::Travel,
        }
    }

    /// Same kind, quantity and target identity. Used to tell whether a
    /// freshly drawn action was already tried from a search node.
    pub fn same_choice(&self, other: &Action) -> bool {
        match (self, other) {
            (
                Action::Consume { item: a, amount: x, .. },
                Action::Consume { item: b, amount: y, .. },
            )
            | (
                Action::Relinquish { item: a, amount: x, .. },
                Action::Relinquish { item: b, amount: y, .. },
            ) => a == b && x == y,
            (Action::Produce { order: a }, Action::Produce { order: b }) => {
                a.recipe == b.recipe && a.amount == b.amount
            }
            (
                Action::Trade {
                    partner: pa,
                    give: ga,
                    give_item: gia,
                    take: ta,
                    take_item: tia,
                },
                Action::Trade {
                    partner: pb,
                    give: gb,
                    give_item: gib,
                    take: tb,
                    take_item: tib,
                },
            ) => pa == pb && gia == gib && tia == tib && ga.amount == gb.amount && ta.amount == tb.amount,
            (Action::Travel { destination: a, .. }, Action::Travel { destination: b, .. }) => a == b,
            _ => false,
        }
    }
}

/// An applied action and the simulated time it takes.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDescriptor {
    pub action: Action,
    pub time: f32,
}

impl ActionDescriptor {
    pub fn kind(&self) -> ActionKind {
        self.action.kind()
    }

    pub fn same_choice(&self, other: &ActionDescriptor) -> bool {
        self.action.same_choice(&other.action)
    }

    /// Where the agent stands after a travel step.
    pub fn destination(&self) -> Option<CellId> {
        match self.action {
            Action::Travel { destination, .. } => Some(destination),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Infeasible {
    #[error("{kind} is infeasible: {reason}")]
    Action { kind: ActionKind, reason: &'static str },
    /// Every action weight is zero for this mobility
    #[error("no action kind is enabled")]
    NothingEnabled,
}

impl Infeasible {
    fn new(kind: ActionKind, reason: &'static str) -> Self {
        Self::Action { kind, reason }
    }

    /// The action kind that failed to resolve.
    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            Infeasible::Action { kind, .. } => Some(*kind),
            Infeasible::NothingEnabled => None,
        }
    }
}

/// Single-step policy with weights fixed per mobility.
#[derive(Debug, Clone)]
pub struct ActionChooser {
    weights: [f32; ActionKind::COUNT],
    config: ChooserConfig,
}

impl ActionChooser {
    pub fn new(mobility: Mobility, config: &ChooserConfig) -> Self {
        let mut weights = [
            config.consume_weight,
            config.produce_weight,
            config.trade_weight,
            config.relinquish_weight,
            config.travel_weight,
        ];
        match mobility {
            Mobility::Settlement => weights[ActionKind::Travel.index()] = 0.0,
            Mobility::Traveller => weights[ActionKind::Trade.index()] = 0.0,
        }
        let total: f32 = weights.iter().map(|w| w.max(0.0)).sum();
        for w in &mut weights {
            *w = if total > 0.0 { w.max(0.0) / total } else { 0.0 };
        }
        Self {
            weights,
            config: config.clone(),
        }
    }

    /// Normalized probability of drawing `kind`.
    pub fn weight(&self, kind: ActionKind) -> f32 {
        self.weights[kind.index()]
    }

    /// Draws an action kind, resolves it and applies it to `state`.
    pub fn choose_and_apply(
        &self,
        state: &mut AgentState,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> Result<ActionDescriptor, Infeasible> {
        let index = weighted_index(rng, &self.weights)
            .ok_or(Infeasible::NothingEnabled)?;
        self.apply_kind(ActionKind::ALL[index], state, env, terrain, rng)
    }

    pub fn apply_kind(
        &self,
        kind: ActionKind,
        state: &mut AgentState,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> Result<ActionDescriptor, Infeasible> {
        match kind {
            ActionKind::Consume => self.consume(state, rng),
            ActionKind::Produce => self.produce(state, rng),
            ActionKind::Trade => self.trade(state, env, rng),
            ActionKind::Relinquish => self.relinquish(state, rng),
            ActionKind::Travel => self.travel(state, env, terrain, rng),
        }
    }

    /// Bounded rejection sampling over held item kinds, then a linear scan.
    fn choose_item(
        &self,
        rng: &mut dyn RngCore,
        candidates: &[ItemId],
        accept: impl Fn(ItemId) -> bool,
    ) -> Option<ItemId> {
        if candidates.is_empty() {
            return None;
        }
        let tries = (self.config.pick_tries_factor * candidates.len() as f32).ceil() as usize;
        for _ in 0..tries {
            if let Some(item) = pick(rng, candidates) {
                if accept(*item) {
                    return Some(*item);
                }
            }
        }
        candidates.iter().copied().find(|item| accept(*item))
    }

    fn consume(&self, state: &mut AgentState, rng: &mut dyn RngCore) -> Result<ActionDescriptor, Infeasible> {
        let fail = |reason| Infeasible::new(ActionKind::Consume, reason);
        let catalogue = Arc::clone(state.catalogue());
        let held = state.held_items();
        let item = self
            .choose_item(rng, &held, |id| {
                catalogue.item(id).is_consumable() && state.total_free(id) > 0.0
            })
            .ok_or(fail("nothing consumable is held"))?;

        let free: Vec<(StackId, f32)> = state
            .stacks_of(item)
            .iter()
            .filter(|s| s.amount_free() > 0.0)
            .map(|s| (s.id, s.amount_free()))
            .collect();
        let &(stack, stock) = pick(rng, &free).ok_or(fail("stack is fully in use"))?;

        let amount = if stock < 1.0 {
            stock
        } else {
            gaussian(rng, state.population(), stock / 3.0).clamp(1.0, stock).floor()
        };
        state.consume(stack, amount).map_err(|_| fail("stack vanished"))?;

        Ok(ActionDescriptor {
            action: Action::Consume { stack, item, amount },
            time: 0.0,
        })
    }

    fn produce(&self, state: &mut AgentState, rng: &mut dyn RngCore) -> Result<ActionDescriptor, Infeasible> {
        let fail = |reason| Infeasible::new(ActionKind::Produce, reason);
        let free = state.free_workers();
        if free == 0 {
            return Err(fail("no free workers"));
        }
        let option = pick(rng, state.possible_recipes())
            .cloned()
            .ok_or(fail("no recipe is possible"))?;
        let catalogue = Arc::clone(state.catalogue());
        let recipe = catalogue.recipe(option.recipe);

        let free_f = free as f32;
        let workers = gaussian(rng, free_f / 2.0, free_f / 4.0).clamp(1.0, free_f).round() as u32;
        let workers = workers.clamp(1, free);
        let w = workers as f32;
        let batch_max = w.min(option.max_amount as f32).max(1.0);
        let batch_min = (w / recipe.max_workers as f32).min(batch_max);
        let amount = gaussian(rng, w / 2.0, w / 3.0)
            .clamp(batch_min, batch_max)
            .round()
            .max(1.0) as u32;

        let ingredients = self
            .bind_ingredients(state, &catalogue, option.recipe, amount, rng)
            .ok_or(fail("ingredients could not be bound"))?;
        let order = RecipeOrder {
            recipe: option.recipe,
            amount,
            workers,
            ingredients,
            deposits: option.deposits,
        };
        let receipt = state
            .follow_recipe(&order, PLANNING_NOW)
            .map_err(|_| fail("recipe rejected the order"))?;

        Ok(ActionDescriptor {
            time: receipt.time,
            action: Action::Produce {
                order: RecipeOrder {
                    workers: receipt.workers,
                    ..order
                },
            },
        })
    }

    /// Binds concrete stacks to every held ingredient of a batch.
    fn bind_ingredients(
        &self,
        state: &AgentState,
        catalogue: &Catalogue,
        recipe: RecipeId,
        amount: u32,
        rng: &mut dyn RngCore,
    ) -> Option<Vec<Portion>> {
        let recipe = catalogue.recipe(recipe);
        let mut portions: Vec<Portion> = Vec::new();
        let bound = |portions: &[Portion], stack: StackId| -> f32 {
            portions.iter().filter(|p| p.stack == stack).map(|p| p.amount).sum()
        };

        for ingredient in &recipe.ingredients {
            if catalogue.item(ingredient.item).is_resource() {
                continue;
            }
            let stacks = state.stacks_of(ingredient.item);
            let mut needed = ingredient.amount * amount as f32;
            let tries = (self.config.ingredient_tries_factor * stacks.len() as f32).ceil() as usize;

            for _ in 0..tries {
                if needed <= 0.0 {
                    break;
                }
                let Some(stack) = pick(rng, stacks) else { break };
                let take = (stack.amount_free() - bound(&portions, stack.id)).min(needed);
                if take > 0.0 {
                    portions.push(Portion { stack: stack.id, amount: take });
                    needed -= take;
                }
            }
            for stack in stacks {
                if needed <= 0.0 {
                    break;
                }
                let take = (stack.amount_free() - bound(&portions, stack.id)).min(needed);
                if take > 0.0 {
                    portions.push(Portion { stack: stack.id, amount: take });
                    needed -= take;
                }
            }
            if needed > 1e-4 {
                return None;
            }
        }
        Some(portions)
    }

    /// Offers one of our wares for one of a co-located partner's. The
    /// partner accepts when it values what it receives at least as much as
    /// what it gives.
    fn trade(
        &self,
        state: &mut AgentState,
        env: &EnvironmentContext,
        rng: &mut dyn RngCore,
    ) -> Result<ActionDescriptor, Infeasible> {
        let fail = |reason| Infeasible::new(ActionKind::Trade, reason);
        let partners: Vec<_> = env.partners.iter().filter(|p| !p.state.is_empty()).collect();
        let partner = *pick(rng, &partners).ok_or(fail("no trade partner holds anything"))?;
        let catalogue = Arc::clone(state.catalogue());
        let tradeable = |holder: &AgentState, id: ItemId| {
            catalogue.item(id).is_ware() && holder.total_free(id) >= 1.0
        };

        let own = state.held_items();
        let give_item = self
            .choose_item(rng, &own, |id| tradeable(&*state, id))
            .ok_or(fail("nothing to offer"))?;
        let theirs = partner.state.held_items();
        let take_item = self
            .choose_item(rng, &theirs, |id| id != give_item && tradeable(&partner.state, id))
            .ok_or(fail("partner has nothing we lack"))?;

        let give_stack = choose_free_stack(state, give_item, rng).ok_or(fail("offer is in use"))?;
        let take_stack = choose_free_stack(&partner.state, take_item, rng)
            .ok_or(fail("partner's goods are in use"))?;

        let give_free = state.find_stack(give_stack).map_or(0.0, |s| s.amount_free());
        if give_free < 1.0 {
            return Err(fail("offer is less than a whole unit"));
        }
        let give_amount = gaussian(rng, give_free / 2.0, give_free / 3.0)
            .clamp(1.0, give_free)
            .floor();
        let rate = value_of(state, give_item) / value_of(state, take_item).max(1e-3);
        let (take_free, take_condition) = partner
            .state
            .find_stack(take_stack)
            .map_or((0.0, 0.0), |s| (s.amount_free(), s.condition()));
        let take_amount = (give_amount * rate).floor().max(1.0).min(take_free.floor());
        if take_amount < 1.0 {
            return Err(fail("partner cannot spare a whole unit"));
        }

        let partner_gain = give_amount * value_of(&partner.state, give_item);
        let partner_loss = take_amount * value_of(&partner.state, take_item);
        if partner_gain < partner_loss {
            return Err(fail("partner declines"));
        }
        if partner.state.room_for(give_item, give_amount) < give_amount {
            return Err(fail("partner cannot carry the offer"));
        }
        if state.room_for(take_item, take_amount) < take_amount {
            return Err(fail("cannot carry the goods"));
        }

        let received = state.collect(take_item, take_amount, take_condition);
        state
            .relinquish(give_stack, give_amount)
            .map_err(|_| fail("offer vanished"))?;

        Ok(ActionDescriptor {
            action: Action::Trade {
                partner: partner.key,
                give: Portion {
                    stack: give_stack,
                    amount: give_amount,
                },
                give_item,
                take: Portion {
                    stack: take_stack,
                    amount: received,
                },
                take_item,
            },
            time: 0.0,
        })
    }

    fn relinquish(&self, state: &mut AgentState, rng: &mut dyn RngCore) -> Result<ActionDescriptor, Infeasible> {
        let fail = |reason| Infeasible::new(ActionKind::Relinquish, reason);
        let held = state.held_items();
        let item = self
            .choose_item(rng, &held, |id| state.total_free(id) > 0.0)
            .ok_or(fail("nothing to discard"))?;
        let stack = choose_free_stack(state, item, rng).ok_or(fail("everything is in use"))?;
        let held_amount = state.find_stack(stack).map_or(0.0, |s| s.amount_free());
        let amount = if held_amount >= 1.0 {
            held_amount.floor()
        } else {
            held_amount
        };
        state.relinquish(stack, amount).map_err(|_| fail("stack vanished"))?;

        Ok(ActionDescriptor {
            action: Action::Relinquish { stack, item, amount },
            time: 0.0,
        })
    }

    fn travel(
        &self,
        state: &mut AgentState,
        env: &EnvironmentContext,
        terrain: &dyn Terrain,
        rng: &mut dyn RngCore,
    ) -> Result<ActionDescriptor, Infeasible> {
        let fail = |reason| Infeasible::new(ActionKind::Travel, reason);
        if !state.can_move() {
            return Err(fail("cannot move"));
        }
        let origin = env.current_cell().ok_or(fail("position unknown"))?;
        let hops = self.config.travel_hops.max(1);

        for _ in 0..self.config.travel_retries.max(1) {
            let mut cell = origin;
            for _ in 0..hops {
                let neighbors = terrain.neighbors(cell);
                match pick(rng, &neighbors) {
                    Some(next) => cell = *next,
                    None => break,
                }
            }
            if cell == origin {
                continue;
            }
            if let Some(time) = terrain.time_cost(origin, cell, state.speed_multipliers()) {
                return Ok(ActionDescriptor {
                    action: Action::Travel {
                        destination: cell,
                        hops,
                    },
                    time,
                });
            }
        }
        Err(fail("no reachable destination"))
    }
}

fn choose_free_stack(state: &AgentState, item: ItemId, rng: &mut dyn RngCore) -> Option<StackId> {
    let free: Vec<StackId> = state
        .stacks_of(item)
        .iter()
        .filter(|s| s.amount_free() > 0.0)
        .map(|s| s.id)
        .collect();
    pick(rng, &free).copied()
}

/// One-line description of an action for logs and the event stream.
pub fn describe_action(descriptor: &ActionDescriptor, catalogue: &Catalogue) -> String {
    let label = |id: ItemId| {
        catalogue
            .get_item(id)
            .map_or_else(|| format!("{:?}", id), |i| i.label.clone())
    };
    match &descriptor.action {
        Action::Consume { item, amount, .. } => format!("consume {} {}", amount, label(*item)),
        Action::Produce { order } => {
            let recipe = catalogue
                .get_recipe(order.recipe)
                .map_or_else(|| format!("{:?}", order.recipe), |r| r.label.clone());
            format!(
                "produce {}x {} with {} workers ({:.1} time)",
                order.amount, recipe, order.workers, descriptor.time
            )
        }
        Action::Trade {
            partner,
            give,
            give_item,
            take,
            take_item,
        } => format!(
            "trade {} {} for {} {} with agent {}",
            give.amount,
            label(*give_item),
            take.amount,
            label(*take_item),
            partner.0
        ),
        Action::Relinquish { item, amount, .. } => format!("discard {} {}", amount, label(*item)),
        Action::Travel { destination, hops } => format!(
            "travel {} hops to {} ({:.1} time)",
            hops, destination, descriptor.time
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CatalogueBuilder, ItemSpec, RecipeSpec};
    use crate::config::PopulationConfig;
    use crate::need::{Need, NeedKind};
    use crate::terrain::{HexMap, TradePartner};
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    struct Goods {
        catalogue: Arc<Catalogue>,
        bread: ItemId,
        cloth: ItemId,
    }

    fn goods() -> Goods {
        let mut b = CatalogueBuilder::new(60.0);
        let bread = b
            .push_item(ItemSpec::ware("bread").satisfies(NeedKind::Hunger, 10.0))
            .unwrap();
        let cloth = b
            .push_item(ItemSpec::ware("cloth").satisfies(NeedKind::Warmth, 10.0))
            .unwrap();
        b.push_recipe(RecipeSpec::new("gather", 2.0).workers(2).product(bread, 1.0))
            .unwrap();
        Goods {
            catalogue: Arc::new(b.build().unwrap()),
            bread,
            cloth,
        }
    }

    fn agent(g: &Goods, mobility: Mobility, population: f32) -> AgentState {
        AgentState::new(
            Arc::clone(&g.catalogue),
            mobility,
            population,
            [Need::new(1.0, 1.0); NeedKind::COUNT],
            &PopulationConfig::default(),
        )
        .clone_for_planning()
    }

    #[test]
    fn test_weights_follow_mobility() {
        let config = ChooserConfig::default();
        let settlement = ActionChooser::new(Mobility::Settlement, &config);
        let traveller = ActionChooser::new(Mobility::Traveller, &config);
        assert_eq!(settlement.weight(ActionKind::Travel), 0.0);
        assert_eq!(traveller.weight(ActionKind::Trade), 0.0);
        let total: f32 = ActionKind::ALL.iter().map(|k| settlement.weight(*k)).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_trade_without_partners_is_infeasible() {
        let g = goods();
        let chooser = ActionChooser::new(Mobility::Settlement, &ChooserConfig::default());
        let mut state = agent(&g, Mobility::Settlement, 10.0);
        state.collect(g.bread, 5.0, 100.0);
        let env = EnvironmentContext::new(vec![CellId(0)]);
        let map = HexMap::flat(2, 2);
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..20 {
            let err = chooser
                .apply_kind(ActionKind::Trade, &mut state, &env, &map, &mut rng)
                .unwrap_err();
            assert_eq!(err.kind(), Some(ActionKind::Trade));
        }
        assert_eq!(state.total(g.bread), 5.0);
    }

    #[test]
    fn test_consume_amount_within_stock() {
        let g = goods();
        let chooser = ActionChooser::new(Mobility::Settlement, &ChooserConfig::default());
        let env = EnvironmentContext::new(vec![CellId(0)]);
        let map = HexMap::flat(2, 2);
        let mut rng = SmallRng::seed_from_u64(2);
        for _ in 0..30 {
            let mut state = agent(&g, Mobility::Settlement, 4.0);
            state.collect(g.bread, 9.0, 100.0);
            let d = chooser
                .apply_kind(ActionKind::Consume, &mut state, &env, &map, &mut rng)
                .unwrap();
            let Action::Consume { amount, item, .. } = d.action else {
                panic!("expected consume");
            };
            assert_eq!(item, g.bread);
            assert!((1.0..=9.0).contains(&amount));
            assert_eq!(amount, amount.floor());
            assert_eq!(state.total(g.bread), 9.0 - amount);
        }
    }

    #[test]
    fn test_consume_with_empty_inventory_is_infeasible() {
        let g = goods();
        let chooser = ActionChooser::new(Mobility::Traveller, &ChooserConfig::default());
        let mut state = agent(&g, Mobility::Traveller, 1.0);
        let env = EnvironmentContext::new(vec![CellId(0)]);
        let mut rng = SmallRng::seed_from_u64(3);
        let result = chooser.apply_kind(ActionKind::Consume, &mut state, &env, &HexMap::flat(2, 2), &mut rng);
        assert!(result.is_err());
    }

    #[test]
    fn test_produce_runs_unconditional_recipe() {
        let g = goods();
        let chooser = ActionChooser::new(Mobility::Settlement, &ChooserConfig::default());
        let map = HexMap::flat(2, 2);
        let env = EnvironmentContext::new(vec![CellId(0)]);
        let mut state = agent(&g, Mobility::Settlement, 6.0);
        state.find_possible_recipes(&env.zone, &map);
        let mut rng = SmallRng::seed_from_u64(4);

        let d = chooser
            .apply_kind(ActionKind::Produce, &mut state, &env, &map, &mut rng)
            .unwrap();
        let Action::Produce { order } = &d.action else {
            panic!("expected produce");
        };
        assert!(order.amount >= 1 && order.amount <= 6);
        assert!(order.workers >= 1 && order.workers <= 6);
        assert_eq!(state.total(g.bread), order.amount as f32);
        let expected = 2.0 * order.amount as f32 / order.workers as f32;
        assert!((d.time - expected).abs() < 1e-4);
    }

    #[test]
    fn test_travel_leaves_origin() {
        let g = goods();
        let chooser = ActionChooser::new(Mobility::Traveller, &ChooserConfig::default());
        let map = HexMap::flat(6, 6);
        let env = EnvironmentContext::new(vec![CellId(14)]);
        let mut state = agent(&g, Mobility::Traveller, 1.0);
        let mut rng = SmallRng::seed_from_u64(5);
        let d = chooser
            .apply_kind(ActionKind::Travel, &mut state, &env, &map, &mut rng)
            .unwrap();
        let Action::Travel { destination, hops } = d.action else {
            panic!("expected travel");
        };
        assert_ne!(destination, CellId(14));
        assert_eq!(hops, 5);
        assert!(d.time > 0.0);
    }

    #[test]
    fn test_settlement_cannot_travel() {
        let g = goods();
        let chooser = ActionChooser::new(Mobility::Settlement, &ChooserConfig::default());
        let mut state = agent(&g, Mobility::Settlement, 10.0);
        let env = EnvironmentContext::new(vec![CellId(0)]);
        let mut rng = SmallRng::seed_from_u64(6);
        let err = chooser
            .apply_kind(ActionKind::Travel, &mut state, &env, &HexMap::flat(3, 3), &mut rng)
            .unwrap_err();
        assert_eq!(err.kind(), Some(ActionKind::Travel));
    }

    #[test]
    fn test_trade_exchanges_both_ways() {
        let g = goods();
        let chooser = ActionChooser::new(Mobility::Settlement, &ChooserConfig::default());
        let mut state = agent(&g, Mobility::Settlement, 10.0);
        state.collect(g.bread, 6.0, 100.0);
        let mut other = agent(&g, Mobility::Settlement, 10.0);
        other.collect(g.cloth, 6.0, 100.0);
        let env = EnvironmentContext::new(vec![CellId(0)]).with_partners(vec![TradePartner {
            key: AgentKey(7),
            state: other,
        }]);
        let mut rng = SmallRng::seed_from_u64(8);

        let d = chooser
            .apply_kind(ActionKind::Trade, &mut state, &env, &HexMap::flat(2, 2), &mut rng)
            .unwrap();
        let Action::Trade { partner, give, take, take_item, .. } = d.action else {
            panic!("expected trade");
        };
        assert_eq!(partner, AgentKey(7));
        assert_eq!(take_item, g.cloth);
        // equal unit values on both sides
        assert_eq!(give.amount, take.amount);
        assert_eq!(state.total(g.bread), 6.0 - give.amount);
        assert_eq!(state.total(g.cloth), take.amount);
    }

    #[test]
    fn test_trade_needs_room_on_partner_side() {
        let g = goods();
        let chooser = ActionChooser::new(Mobility::Settlement, &ChooserConfig::default());
        let mut state = agent(&g, Mobility::Settlement, 10.0);
        state.collect(g.bread, 6.0, 100.0);
        let mut other = agent(&g, Mobility::Settlement, 1.0);
        assert_eq!(other.collect(g.cloth, 200.0, 100.0), 80.0);
        assert_eq!(other.room_for(g.bread, 1.0), 0.0);
        let env = EnvironmentContext::new(vec![CellId(0)]).with_partners(vec![TradePartner {
            key: AgentKey(7),
            state: other,
        }]);
        let mut rng = SmallRng::seed_from_u64(8);

        for _ in 0..20 {
            let err = chooser
                .apply_kind(ActionKind::Trade, &mut state, &env, &HexMap::flat(2, 2), &mut rng)
                .unwrap_err();
            assert_eq!(err.kind(), Some(ActionKind::Trade));
        }
        assert_eq!(state.total(g.bread), 6.0);
        assert_eq!(state.total(g.cloth), 0.0);
    }

    #[test]
    fn test_no_enabled_kind_is_reported_as_such() {
        let g = goods();
        let config = ChooserConfig {
            consume_weight: 0.0,
            produce_weight: 0.0,
            trade_weight: 0.0,
            relinquish_weight: 0.0,
            travel_weight: 1.0,
            ..ChooserConfig::default()
        };
        let chooser = ActionChooser::new(Mobility::Settlement, &config);
        let mut state = agent(&g, Mobility::Settlement, 2.0);
        let mut rng = SmallRng::seed_from_u64(3);
        let err = chooser
            .choose_and_apply(
                &mut state,
                &EnvironmentContext::new(vec![CellId(0)]),
                &HexMap::flat(2, 2),
                &mut rng,
            )
            .unwrap_err();
        assert_eq!(err, Infeasible::NothingEnabled);
        assert_eq!(err.kind(), None);
    }

    #[test]
    fn test_same_choice_ignores_stack_identity() {
        let a = Action::Consume {
            stack: StackId(1),
            item: ItemId(0),
            amount: 2.0,
        };
        let b = Action::Consume {
            stack: StackId(5),
            item: ItemId(0),
            amount: 2.0,
        };
        let c = Action::Relinquish {
            stack: StackId(1),
            item: ItemId(0),
            amount: 2.0,
        };
        assert!(a.same_choice(&b));
        assert!(!a.same_choice(&c));
    }

    #[test]
    fn test_describe_action() {
        let g = goods();
        let d = ActionDescriptor {
            action: Action::Consume {
                stack: StackId(0),
                item: g.bread,
                amount: 3.0,
            },
            time: 0.0,
        };
        assert_eq!(describe_action(&d, &g.catalogue), "consume 3 bread");
    }
}
