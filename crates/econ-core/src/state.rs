//! Agent Economic State
//!
//! Everything one agent owns: needs, population, carrying capacity and the
//! stacks of items it holds. Planners work on deep clones made with
//! [`AgentState::clone_for_planning`]; only the host mutates the live state.
//!
//! Production lives in [`crate::recipe`], which extends this type with the
//! recipe resolver and `follow_recipe`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::mem;
use std::sync::Arc;
use thiserror::Error;

use crate::catalogue::{Catalogue, ItemId, RecipeId, VehicleKind};
use crate::config::PopulationConfig;
use crate::need::{Need, NeedKind, DANGER_THRESHOLD, NEED_MAX};
use crate::recipe::{PendingProduction, RecipeOption};
use crate::stack::{Stack, StackId, CONDITION_MAX};
use crate::terrain::{CellId, Terrain};

/// Happiness reported when a vital need is empty.
pub const DEAD_HAPPINESS: f32 = -1000.0;

/// Amounts below this are treated as gone.
const AMOUNT_EPSILON: f32 = 1e-4;

/// Growth scaling applied on top of the per-season rate.
const GROWTH_DIVISOR: f32 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mobility {
    Traveller,
    Settlement,
}

impl fmt::Display for Mobility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mobility::Traveller => f.write_str("traveller"),
            Mobility::Settlement => f.write_str("settlement"),
        }
    }
}

/// Live states defer production; simulated clones complete it at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateMode {
    Live,
    Simulated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalCause {
    HealthDepleted,
    Depopulated,
}

impl fmt::Display for TerminalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminalCause::HealthDepleted => f.write_str("health depleted"),
            TerminalCause::Depopulated => f.write_str("depopulated"),
        }
    }
}

/// Things the host must react to, drained with [`AgentState::take_events`].
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    Terminal { cause: TerminalCause },
    ProductionCompleted { recipe: RecipeId, amount: u32 },
    /// A recipe put a resource back into a cell.
    DepositReplenished { cell: CellId, item: ItemId, amount: f32 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateError {
    #[error("no {0} is held")]
    UnknownStack(StackId),
    #[error("item {0:?} cannot be consumed")]
    NotConsumable(ItemId),
}

/// Economic state of one agent.
#[derive(Debug, Clone)]
pub struct AgentState {
    catalogue: Arc<Catalogue>,
    tuning: PopulationConfig,
    mobility: Mobility,
    mode: StateMode,

    health: f32,
    happiness: f32,
    population: f32,
    free_workers: u32,
    terminal: bool,

    carrying_capacity: f32,
    weight: f32,
    infrastructure_space: f32,
    speed_multipliers: [f32; VehicleKind::COUNT],
    vehicle_sets: [BTreeSet<ItemId>; VehicleKind::COUNT],

    needs: [Need; NeedKind::COUNT],
    passive_satisfaction: [f32; NeedKind::COUNT],
    passive_depletion: [f32; NeedKind::COUNT],
    passive_floor: [f32; NeedKind::COUNT],

    stacks: BTreeMap<ItemId, Vec<Stack>>,
    next_stack_id: u64,
    last_added_to: Option<StackId>,

    pub(crate) possible_recipes: Vec<RecipeOption>,
    pub(crate) pending: Vec<PendingProduction>,
    valuation: BTreeMap<ItemId, f32>,
    events: Vec<StateEvent>,
}

impl AgentState {
    pub fn new(
        catalogue: Arc<Catalogue>,
        mobility: Mobility,
        population: f32,
        needs: [Need; NeedKind::COUNT],
        tuning: &PopulationConfig,
    ) -> Self {
        let population = population.max(0.0);
        let infrastructure_space = match mobility {
            Mobility::Settlement => tuning.settlement_space,
            Mobility::Traveller => 0.0,
        };
        let mut state = Self {
            catalogue,
            tuning: tuning.clone(),
            mobility,
            mode: StateMode::Live,
            health: NEED_MAX,
            happiness: 0.0,
            population,
            free_workers: population.floor() as u32,
            terminal: false,
            carrying_capacity: population * tuning.carrying_per_person,
            weight: 0.0,
            infrastructure_space,
            speed_multipliers: [1.0; VehicleKind::COUNT],
            vehicle_sets: Default::default(),
            needs,
            passive_satisfaction: [0.0; NeedKind::COUNT],
            passive_depletion: [1.0; NeedKind::COUNT],
            passive_floor: [0.0; NeedKind::COUNT],
            stacks: BTreeMap::new(),
            next_stack_id: 0,
            last_added_to: None,
            possible_recipes: Vec::new(),
            pending: Vec::new(),
            valuation: BTreeMap::new(),
            events: Vec::new(),
        };
        state.refresh_wellbeing();
        state
    }

    pub fn catalogue(&self) -> &Arc<Catalogue> {
        &self.catalogue
    }

    pub fn tuning(&self) -> &PopulationConfig {
        &self.tuning
    }

    pub fn mobility(&self) -> Mobility {
        self.mobility
    }

    pub fn is_traveller(&self) -> bool {
        self.mobility == Mobility::Traveller
    }

    pub fn mode(&self) -> StateMode {
        self.mode
    }

    pub fn is_simulated(&self) -> bool {
        self.mode == StateMode::Simulated
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn happiness(&self) -> f32 {
        self.happiness
    }

    pub fn population(&self) -> f32 {
        self.population
    }

    pub fn population_int(&self) -> u32 {
        self.population.max(0.0).floor() as u32
    }

    pub fn free_workers(&self) -> u32 {
        self.free_workers
    }

    pub(crate) fn set_free_workers(&mut self, workers: u32) {
        self.free_workers = workers.min(self.population_int());
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal
    }

    pub fn carrying_capacity(&self) -> f32 {
        self.carrying_capacity
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn infrastructure_space(&self) -> f32 {
        self.infrastructure_space
    }

    pub fn speed_multipliers(&self) -> &[f32; VehicleKind::COUNT] {
        &self.speed_multipliers
    }

    /// Travellers move unless overloaded; settlements never move.
    pub fn can_move(&self) -> bool {
        self.is_traveller() && self.weight <= self.carrying_capacity
    }

    pub fn needs(&self) -> &[Need; NeedKind::COUNT] {
        &self.needs
    }

    pub fn need(&self, kind: NeedKind) -> &Need {
        &self.needs[kind.index()]
    }

    /// Overrides a need value and recomputes health and happiness.
    pub fn set_need_value(&mut self, kind: NeedKind, value: f32) {
        self.needs[kind.index()].set(value);
        self.refresh_wellbeing();
    }

    pub fn passive_satisfaction(&self, kind: NeedKind) -> f32 {
        self.passive_satisfaction[kind.index()]
    }

    /// Held item kinds in id order.
    pub fn held_items(&self) -> Vec<ItemId> {
        self.stacks.keys().copied().collect()
    }

    pub fn has_item(&self, item: ItemId) -> bool {
        self.stacks.contains_key(&item)
    }

    pub fn stacks_of(&self, item: ItemId) -> &[Stack] {
        self.stacks.get(&item).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn stacks(&self) -> impl Iterator<Item = &Stack> {
        self.stacks.values().flatten()
    }

    pub fn stack_count(&self) -> usize {
        self.stacks.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.stacks.is_empty()
    }

    pub fn total(&self, item: ItemId) -> f32 {
        self.stacks_of(item).iter().map(Stack::amount).sum()
    }

    /// Held amount not reserved as tools.
    pub fn total_free(&self, item: ItemId) -> f32 {
        self.stacks_of(item).iter().map(Stack::amount_free).sum()
    }

    pub fn find_stack(&self, id: StackId) -> Option<&Stack> {
        self.stacks().find(|s| s.id == id)
    }

    pub(crate) fn stack_mut(&mut self, id: StackId) -> Option<&mut Stack> {
        self.stacks.values_mut().flatten().find(|s| s.id == id)
    }

    fn locate(&self, id: StackId) -> Option<(ItemId, usize)> {
        self.stacks.iter().find_map(|(item, bucket)| {
            bucket.iter().position(|s| s.id == id).map(|pos| (*item, pos))
        })
    }

    /// Executable recipes found by the last resolver pass.
    pub fn possible_recipes(&self) -> &[RecipeOption] {
        &self.possible_recipes
    }

    pub fn pending_productions(&self) -> usize {
        self.pending.len()
    }

    /// Per-unit item values from the last valuation pass.
    pub fn valuation(&self) -> &BTreeMap<ItemId, f32> {
        &self.valuation
    }

    pub fn set_valuation(&mut self, prices: BTreeMap<ItemId, f32>) {
        self.valuation = prices;
    }

    pub fn take_events(&mut self) -> Vec<StateEvent> {
        mem::take(&mut self.events)
    }

    pub(crate) fn push_event(&mut self, event: StateEvent) {
        self.events.push(event);
    }

    /// Full value copy for planning. Stack ids are preserved and production
    /// completes immediately.
    pub fn clone_for_planning(&self) -> Self {
        let mut clone = self.clone();
        clone.mode = StateMode::Simulated;
        clone.events.clear();
        clone
    }

    /// Health and happiness after `horizon` more time with no actions.
    pub fn projected_wellbeing(&self, horizon: f32) -> (f32, f32) {
        let mut projection = self.clone_for_planning();
        projection.decay(horizon);
        (projection.health, projection.happiness)
    }

    // ---- Wellbeing ----

    pub fn refresh_wellbeing(&mut self) {
        self.health = compute_health(&self.needs);
        self.happiness = compute_happiness(&self.needs);
        self.check_terminal();
    }

    fn check_terminal(&mut self) {
        if self.terminal {
            return;
        }
        let cause = if self.health <= 0.0 {
            TerminalCause::HealthDepleted
        } else if self.population < 1.0 {
            TerminalCause::Depopulated
        } else {
            return;
        };
        self.terminal = true;
        self.events.push(StateEvent::Terminal { cause });
    }

    /// Depletes needs and item conditions over `delta_time`.
    pub fn decay(&mut self, delta_time: f32) {
        if delta_time <= 0.0 || !delta_time.is_finite() {
            return;
        }
        self.decay_stacks(delta_time);
        self.decay_needs(delta_time);
        self.refresh_wellbeing();
    }

    fn decay_stacks(&mut self, delta_time: f32) {
        let catalogue = Arc::clone(&self.catalogue);
        let season_duration = catalogue.season_duration();
        let mut worn_out = Vec::new();

        for (item, bucket) in self.stacks.iter_mut() {
            let rate = catalogue.item(*item).decay_rate(season_duration);
            if rate == 0.0 {
                continue;
            }
            for stack in bucket.iter_mut() {
                stack.decay(delta_time, rate);
                if stack.condition() <= 0.0 {
                    worn_out.push(stack.id);
                }
            }
        }

        for id in worn_out {
            if let Some((item, pos)) = self.locate(id) {
                let amount = self.stacks_of(item)[pos].amount();
                self.remove_from_stack(item, pos, amount);
            }
        }
    }

    fn decay_needs(&mut self, delta_time: f32) {
        for kind in NeedKind::ALL {
            let i = kind.index();
            let dt = if kind.is_vital() {
                delta_time
            } else {
                delta_time * self.passive_depletion[i]
            };
            self.needs[i].deplete(dt, self.passive_floor[i]);
        }
    }

    fn adjust_passive(&mut self, i: usize, value: f32, apply_to_need: bool) {
        let per_person = value / self.population.max(f32::EPSILON);
        self.passive_satisfaction[i] += per_person;
        if per_person > 0.0 && apply_to_need {
            self.needs[i].add(per_person);
        }
        let passive = self.passive_satisfaction[i].max(0.0);
        if i < NeedKind::VITAL_COUNT {
            self.passive_floor[i] = passive;
            return;
        }
        self.passive_depletion[i] = (100.0 - passive.min(95.0)) / 100.0;
        self.passive_floor[i] = (passive * 0.01).min(50.0);
    }

    fn recompute_passive(&mut self) {
        self.passive_satisfaction = [0.0; NeedKind::COUNT];
        self.passive_depletion = [1.0; NeedKind::COUNT];
        self.passive_floor = [0.0; NeedKind::COUNT];
        let catalogue = Arc::clone(&self.catalogue);
        for item in self.held_items() {
            let total = self.total(item);
            for sat in &catalogue.item(item).on_having {
                self.adjust_passive(sat.need.index(), sat.value * total, false);
            }
        }
    }

    // ---- Population ----

    /// Settlement growth: exponential in how far health sits above danger.
    pub fn grow_population(&mut self, delta_time: f32) {
        if delta_time <= 0.0 || self.terminal {
            return;
        }
        let rate = self.tuning.growth_rate_per_season
            / (NEED_MAX - DANGER_THRESHOLD)
            / GROWTH_DIVISOR
            / self.catalogue.season_duration();
        let grown = self.population * (delta_time * rate * (self.health - DANGER_THRESHOLD)).exp();
        self.change_population(grown);
        self.check_terminal();
    }

    /// Whole-unit changes move free workers and carrying capacity with it.
    fn change_population(&mut self, population: f32) {
        let old = self.population.floor() as i64;
        let new = population.max(0.0).floor() as i64;
        let diff = new - old;
        self.population = population.max(0.0);
        self.carrying_capacity += diff as f32 * self.tuning.carrying_per_person;
        let workers = (self.free_workers as i64 + diff).clamp(0, new);
        self.free_workers = workers as u32;
    }

    // ---- Holdings ----

    /// Adds `amount` of `item` at `condition`, returning how much was taken.
    ///
    /// Limited by stack caps, carrying capacity, and infrastructure space.
    /// Travellers cannot hold infrastructure. Less than one unit is refused.
    pub fn collect(&mut self, item: ItemId, amount: f32, condition: f32) -> f32 {
        let amount = self.room_for(item, amount);
        if amount < 1.0 {
            return 0.0;
        }
        let catalogue = Arc::clone(&self.catalogue);
        let Some(def) = catalogue.get_item(item) else {
            return 0.0;
        };
        let is_infrastructure = def.is_infrastructure();
        let users = |n: f32| self.population.min(def.max_users * n);

        let capacity_gain = users(amount) * def.carrying_capacity;
        self.weight += amount * def.mass;
        self.carrying_capacity += capacity_gain;
        if is_infrastructure {
            self.infrastructure_space -= amount * def.mass;
        }
        for sat in &def.on_having {
            self.adjust_passive(sat.need.index(), sat.value * amount, true);
        }

        let is_new = !self.stacks.contains_key(&item);
        let condition = condition.clamp(0.0, CONDITION_MAX);
        let (below, above) = (self.tuning.condition_band_lower, self.tuning.condition_band_upper);
        let cap = def.max_amount;
        let bucket = self.stacks.entry(item).or_default();
        let mut remaining = amount;

        if let Some(last) = self.last_added_to {
            if let Some(stack) = bucket.iter_mut().find(|s| s.id == last) {
                if stack.amount() < cap && stack.accepts(condition, below, above) {
                    remaining -= stack.set_amount(stack.amount() + remaining, cap);
                }
            }
        }

        if remaining > 0.0 {
            for stack in bucket
                .iter_mut()
                .filter(|s| s.amount() < cap && s.accepts(condition, below, above))
            {
                remaining -= stack.set_amount(stack.amount() + remaining, cap);
                if remaining <= 0.0 {
                    self.last_added_to = Some(stack.id);
                    break;
                }
            }
        }

        while remaining > AMOUNT_EPSILON {
            let portion = remaining.min(cap);
            let id = StackId(self.next_stack_id);
            self.next_stack_id += 1;
            bucket.push(Stack::new(id, item, portion, condition));
            self.last_added_to = Some(id);
            remaining -= portion;
        }

        if self.is_traveller() {
            for vehicle in def.vehicles() {
                let k = vehicle.kind.index();
                if is_new {
                    self.vehicle_sets[k].insert(item);
                }
                self.find_best_vehicle(k);
            }
        }

        self.valuation_touch(item);
        amount
    }

    /// The part of `amount` that [`collect`](Self::collect) would take
    /// right now, without changing anything.
    pub fn room_for(&self, item: ItemId, amount: f32) -> f32 {
        let Some(def) = self.catalogue.get_item(item) else {
            return 0.0;
        };
        if def.is_resource() || !(amount > 0.0) {
            return 0.0;
        }
        let is_infrastructure = def.is_infrastructure();
        if is_infrastructure && self.is_traveller() {
            return 0.0;
        }

        let users = self.population.min(def.max_users * amount);
        let new_capacity = self.carrying_capacity + users * def.carrying_capacity;
        let limit = if def.mass <= 0.0 {
            f32::INFINITY
        } else if is_infrastructure {
            (self.infrastructure_space / def.mass).floor()
        } else {
            ((new_capacity * self.tuning.max_carrying_multiplier - self.weight) / def.mass).floor()
        };
        let amount = amount.min(limit);
        if amount < 1.0 {
            0.0
        } else {
            amount
        }
    }

    /// Removes `amount` from a stack. Returns the part that could not be
    /// removed because the stack held less.
    pub fn relinquish(&mut self, stack: StackId, amount: f32) -> Result<f32, StateError> {
        let (item, pos) = self.locate(stack).ok_or(StateError::UnknownStack(stack))?;
        Ok(self.remove_from_stack(item, pos, amount.max(0.0)))
    }

    /// Consumes up to `amount` from a stack, satisfying needs per person.
    /// Returns the unconsumed remainder.
    pub fn consume(&mut self, stack: StackId, amount: f32) -> Result<f32, StateError> {
        let (item, pos) = self.locate(stack).ok_or(StateError::UnknownStack(stack))?;
        let catalogue = Arc::clone(&self.catalogue);
        let def = catalogue.item(item);
        if !def.is_consumable() {
            return Err(StateError::NotConsumable(item));
        }

        let held = self.stacks_of(item)[pos].amount();
        let eaten = amount.max(0.0).min(held);
        let per_person = eaten / self.population.max(f32::EPSILON);
        for sat in def.on_consumption() {
            self.needs[sat.need.index()].add(sat.value * per_person);
        }
        self.remove_from_stack(item, pos, eaten);
        self.refresh_wellbeing();
        Ok(amount.max(0.0) - eaten)
    }

    fn remove_from_stack(&mut self, item: ItemId, pos: usize, amount: f32) -> f32 {
        let catalogue = Arc::clone(&self.catalogue);
        let def = catalogue.item(item);
        let Some(bucket) = self.stacks.get_mut(&item) else {
            return amount;
        };
        let Some(held) = bucket.get(pos).map(Stack::amount) else {
            return amount;
        };

        let (taken, remainder) = if amount >= held - AMOUNT_EPSILON {
            let removed = bucket.remove(pos);
            if self.last_added_to == Some(removed.id) {
                self.last_added_to = None;
            }
            (held, (amount - held).max(0.0))
        } else {
            bucket[pos].set_amount(held - amount, def.max_amount);
            (amount, 0.0)
        };
        let bucket_empty = bucket.is_empty();
        if bucket_empty {
            self.stacks.remove(&item);
        }

        for sat in &def.on_having {
            self.adjust_passive(sat.need.index(), -sat.value * taken, false);
        }
        self.weight = (self.weight - def.mass * taken).max(0.0);
        self.carrying_capacity -= self.population.min(def.max_users * taken) * def.carrying_capacity;
        if def.is_infrastructure() {
            self.infrastructure_space += taken * def.mass;
        }
        if self.is_traveller() {
            for vehicle in def.vehicles() {
                let k = vehicle.kind.index();
                if bucket_empty {
                    self.vehicle_sets[k].remove(&item);
                }
                self.find_best_vehicle(k);
            }
        }

        self.valuation_touch(item);
        remainder
    }

    fn find_best_vehicle(&mut self, k: usize) {
        let body = self.population * self.tuning.body_weight;
        let mut best = 1.0;
        for item in &self.vehicle_sets[k] {
            let def = self.catalogue.item(*item);
            let Some(speed) = def
                .vehicles()
                .iter()
                .find(|v| v.kind.index() == k)
                .map(|v| v.speed_multiplier)
            else {
                continue;
            };
            if speed <= best {
                continue;
            }
            let total = self.total(*item);
            let load = self.weight + body - total * def.mass;
            if load <= self.population.min(def.max_users * total) * def.carrying_capacity {
                best = speed;
            }
        }
        self.speed_multipliers[k] = best;
    }

    /// Drops the cached price of an item that is no longer held.
    fn valuation_touch(&mut self, item: ItemId) {
        if !self.stacks.contains_key(&item) {
            self.valuation.remove(&item);
        }
    }

    // ---- Lifecycle ----

    /// Post-action viability step. Returns `false` once terminal.
    pub fn advance(&mut self, delta_time: f32, zone: &[CellId], terrain: &dyn Terrain) -> bool {
        self.decay(delta_time);
        if self.terminal {
            return false;
        }
        if !self.is_traveller() {
            self.grow_population(delta_time);
            if self.terminal {
                return false;
            }
        }
        self.find_possible_recipes(zone, terrain);
        true
    }

    /// Absorbs another settlement. Its stacks get fresh ids in this state.
    pub fn merge(&mut self, other: AgentState) {
        let mut remapped = BTreeMap::new();
        for (item, bucket) in other.stacks {
            let target = self.stacks.entry(item).or_default();
            for mut stack in bucket {
                let id = StackId(self.next_stack_id);
                self.next_stack_id += 1;
                remapped.insert(stack.id, id);
                stack.id = id;
                target.push(stack);
            }
        }

        self.carrying_capacity += other.carrying_capacity;
        self.weight += other.weight;
        self.infrastructure_space += other.infrastructure_space;

        let combined = self.population + other.population;
        if combined > 0.0 {
            for (mine, theirs) in self.needs.iter_mut().zip(other.needs.iter()) {
                mine.set((mine.value() * self.population + theirs.value() * other.population) / combined);
            }
        }
        self.population = combined;
        self.set_free_workers(self.free_workers + other.free_workers);

        for (mine, theirs) in self.vehicle_sets.iter_mut().zip(other.vehicle_sets) {
            mine.extend(theirs);
        }

        for mut production in other.pending {
            for tool in &mut production.tools {
                if let Some(id) = remapped.get(&tool.stack) {
                    tool.stack = *id;
                }
            }
            self.pending.push(production);
        }

        self.valuation.clear();
        self.recompute_passive();
        self.refresh_wellbeing();
    }
}

/// Mean of the vital needs, or zero if any of them is empty.
pub fn compute_health(needs: &[Need; NeedKind::COUNT]) -> f32 {
    let vital = &needs[..NeedKind::VITAL_COUNT];
    if vital.iter().any(|n| n.value() <= 0.0) {
        return 0.0;
    }
    vital.iter().map(Need::value).sum::<f32>() / NeedKind::VITAL_COUNT as f32
}

/// Weighted satisfaction: vital needs count relative to the danger line.
pub fn compute_happiness(needs: &[Need; NeedKind::COUNT]) -> f32 {
    let (vital, other) = needs.split_at(NeedKind::VITAL_COUNT);
    if vital.iter().any(|n| n.value() <= 0.0) {
        return DEAD_HAPPINESS;
    }
    let vital_sum: f32 = vital
        .iter()
        .map(|n| (n.value() - DANGER_THRESHOLD) * n.happiness_weight)
        .sum();
    let other_sum: f32 = other.iter().map(|n| n.value() * n.happiness_weight).sum();
    vital_sum + other_sum
}
