//! Valuation Engine
//!
//! Price discovery over the recipe graph. Every feasible recipe roots a tree
//! at its ingredients; edges follow "is an ingredient or tool of" down to the
//! products, stopping at resources and at items already on the path. A
//! forward pass accumulates per-need potentials, a backward pass turns each
//! item's own usefulness plus the discounted value of what it can become into
//! a price.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalogue::{Catalogue, ItemId};
use crate::need::{NeedKind, NEED_MAX};
use crate::state::AgentState;

/// Nodes allowed in one valuation forest.
const NODE_BUDGET: usize = 4096;
const MAX_DEPTH: usize = 8;
const MIN_DEPLETION: f32 = 1e-3;

/// Output of one valuation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Valuation {
    /// Value of one unit of each item reached
    pub prices: BTreeMap<ItemId, f32>,
    /// How strongly the reachable production satisfies each need
    pub potentials: [f32; NeedKind::COUNT],
}

impl Valuation {
    pub fn price(&self, item: ItemId) -> Option<f32> {
        self.prices.get(&item).copied()
    }
}

#[derive(Debug, Clone)]
struct ValueNode {
    item: ItemId,
    amount: f32,
    /// Production time to reach this node from its parent
    time: f32,
    parent: Option<usize>,
    children: Vec<usize>,
    depth: usize,
    value: f32,
}

/// Transient recipe-dependency forest for one state.
pub struct PriceFinder<'a> {
    state: &'a AgentState,
    catalogue: Arc<Catalogue>,
    nodes: Vec<ValueNode>,
    potentials: [f32; NeedKind::COUNT],
}

impl<'a> PriceFinder<'a> {
    pub fn new(state: &'a AgentState) -> Self {
        Self {
            state,
            catalogue: Arc::clone(state.catalogue()),
            nodes: Vec::new(),
            potentials: [0.0; NeedKind::COUNT],
        }
    }

    /// Values every item reachable from the state's feasible recipes, plus
    /// every held item.
    pub fn find_prices(mut self) -> Valuation {
        let catalogue = Arc::clone(&self.catalogue);
        let state = self.state;
        for option in state.possible_recipes() {
            let recipe = catalogue.recipe(option.recipe);
            for ingredient in &recipe.ingredients {
                if self.nodes.len() >= NODE_BUDGET {
                    break;
                }
                let root = self.push_node(ingredient.item, option.max_amount as f32, recipe.time_cost, None);
                self.expand(root);
            }
        }

        for i in (0..self.nodes.len()).rev() {
            self.back_propagate(i);
        }

        let mut prices = BTreeMap::new();
        for node in &self.nodes {
            let price = prices.entry(node.item).or_insert(node.value);
            *price = f32::max(*price, node.value);
        }
        for item in state.held_items() {
            prices
                .entry(item)
                .or_insert_with(|| immediate_value(state, item));
        }

        let mut potentials = self.potentials;
        for p in &mut potentials {
            if p.abs() < 1.0 && *p != 0.0 {
                *p = p.signum();
            }
        }
        Valuation { prices, potentials }
    }

    fn push_node(&mut self, item: ItemId, amount: f32, time: f32, parent: Option<usize>) -> usize {
        let depth = parent.map_or(0, |p| self.nodes[p].depth + 1);
        let index = self.nodes.len();
        self.nodes.push(ValueNode {
            item,
            amount,
            time,
            parent,
            children: Vec::new(),
            depth,
            value: 0.0,
        });
        if let Some(p) = parent {
            self.nodes[p].children.push(index);
        }
        self.accumulate_potential(item, amount, time);
        index
    }

    fn accumulate_potential(&mut self, item: ItemId, amount: f32, time: f32) {
        let def = self.catalogue.item(item);
        let throughput = amount / (time + 1.0);
        let needs = self.state.needs();
        for sat in def.on_consumption() {
            let depletion = needs[sat.need.index()].depletion_rate.max(MIN_DEPLETION);
            self.potentials[sat.need.index()] += throughput * sat.value / depletion;
        }
        for sat in &def.on_having {
            let depletion = needs[sat.need.index()].depletion_rate.max(MIN_DEPLETION);
            self.potentials[sat.need.index()] += throughput * 2.0 * sat.value / depletion;
        }
    }

    fn on_path(&self, mut index: usize, item: ItemId) -> bool {
        loop {
            let node = &self.nodes[index];
            if node.item == item {
                return true;
            }
            match node.parent {
                Some(parent) => index = parent,
                None => return false,
            }
        }
    }

    /// Adds the products of every recipe `index`'s item feeds into.
    fn expand(&mut self, index: usize) {
        let catalogue = Arc::clone(&self.catalogue);
        let (item, amount, depth) = {
            let node = &self.nodes[index];
            (node.item, node.amount, node.depth)
        };
        if depth >= MAX_DEPTH || catalogue.item(item).is_resource() {
            return;
        }
        let population = self.state.population();

        for recipe_id in catalogue.involving(item) {
            let recipe = catalogue.recipe(*recipe_id);
            let (batches, time) = if let Some(ingredient) = recipe.ingredient(item) {
                (amount / ingredient.amount, recipe.time_cost)
            } else if let Some(tool) = recipe.tool(item) {
                let users = if tool.use_occupation <= 0.0 {
                    population
                } else {
                    (amount / tool.use_occupation).min(population)
                };
                (users / 100.0, recipe.time_cost * (1.0 - tool.time_reduction))
            } else {
                continue;
            };

            for product in &recipe.products {
                if self.nodes.len() >= NODE_BUDGET {
                    return;
                }
                let terminal =
                    catalogue.item(product.item).is_resource() || self.on_path(index, product.item);
                let child = self.push_node(product.item, batches * product.amount, time, Some(index));
                if !terminal {
                    self.expand(child);
                }
            }
        }
    }

    /// Children are pushed after their parents, so walking the arena in
    /// reverse settles every child before its parent.
    fn back_propagate(&mut self, index: usize) {
        let own = immediate_value(self.state, self.nodes[index].item);
        let best_use = self.nodes[index]
            .children
            .iter()
            .map(|&c| self.nodes[c].value / (1.0 + self.nodes[c].time))
            .fold(0.0, f32::max);
        self.nodes[index].value = own + best_use;
    }
}

/// Value of one unit by its direct effects: needs met while held or when
/// consumed, and carrying capacity weighted by vehicle speed.
pub fn immediate_value(state: &AgentState, item: ItemId) -> f32 {
    let Some(def) = state.catalogue().get_item(item) else {
        return 0.0;
    };
    let needs = state.needs();
    let depletion = |need: NeedKind| needs[need.index()].depletion_rate.max(MIN_DEPLETION);

    let having: f32 = def
        .on_having
        .iter()
        .map(|s| 2.0 * s.value / NEED_MAX / depletion(s.need))
        .sum();
    let consumption: f32 = def
        .on_consumption()
        .iter()
        .map(|s| s.value / NEED_MAX / depletion(s.need))
        .sum();
    let speed_bonus = 1.0
        + def
            .vehicles()
            .iter()
            .map(|v| v.speed_multiplier - 1.0)
            .sum::<f32>();
    let carrying = def.carrying_capacity / state.tuning().body_weight.max(MIN_DEPLETION) * speed_bonus;

    having + consumption + carrying
}

/// Recomputes and caches prices on the state.
pub fn refresh_valuation(state: &mut AgentState) -> Valuation {
    let valuation = PriceFinder::new(state).find_prices();
    state.set_valuation(valuation.prices.clone());
    valuation
}

/// Cached price if present, otherwise the item's immediate value.
pub fn value_of(state: &AgentState, item: ItemId) -> f32 {
    state
        .valuation()
        .get(&item)
        .copied()
        .unwrap_or_else(|| immediate_value(state, item))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{CatalogueBuilder, ItemSpec, RecipeSpec, VehicleKind};
    use crate::config::PopulationConfig;
    use crate::need::Need;
    use crate::state::Mobility;
    use crate::terrain::{CellId, HexMap};

    fn state_with(catalogue: Catalogue, population: f32) -> AgentState {
        AgentState::new(
            Arc::new(catalogue),
            Mobility::Settlement,
            population,
            [Need::new(1.0, 1.0); NeedKind::COUNT],
            &PopulationConfig::default(),
        )
    }

    #[test]
    fn test_immediate_value_terms() {
        let mut b = CatalogueBuilder::new(60.0);
        let bread = b
            .push_item(ItemSpec::ware("bread").satisfies(NeedKind::Hunger, 50.0))
            .unwrap();
        let rug = b
            .push_item(ItemSpec::ware("rug").satisfies_having(NeedKind::Comfort, 10.0))
            .unwrap();
        let horse = b
            .push_item(
                ItemSpec::ware("horse")
                    .carrying(140.0, 1.0)
                    .vehicle(VehicleKind::Land, 2.0),
            )
            .unwrap();
        let s = state_with(b.build().unwrap(), 10.0);

        assert!((immediate_value(&s, bread) - 0.5).abs() < 1e-5);
        assert!((immediate_value(&s, rug) - 0.2).abs() < 1e-5);
        // 140 / 70 with a 2x speed bonus
        assert!((immediate_value(&s, horse) - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_ingredients_inherit_product_value() {
        let mut b = CatalogueBuilder::new(60.0);
        let flour = b.push_item(ItemSpec::ware("flour")).unwrap();
        let bread = b
            .push_item(ItemSpec::ware("bread").satisfies(NeedKind::Hunger, 50.0))
            .unwrap();
        b.push_recipe(RecipeSpec::new("bake", 1.0).ingredient(flour, 1.0).product(bread, 1.0))
            .unwrap();
        let mut s = state_with(b.build().unwrap(), 10.0);
        s.collect(flour, 4.0, 100.0);
        s.find_possible_recipes(&[CellId(0)], &HexMap::flat(1, 1));

        let valuation = PriceFinder::new(&s).find_prices();
        let flour_price = valuation.price(flour).unwrap();
        let bread_price = valuation.price(bread).unwrap();
        assert!((bread_price - 0.5).abs() < 1e-5);
        // nothing of its own, half of bread after one unit of time
        assert!((flour_price - 0.25).abs() < 1e-5);
        assert!(valuation.potentials[NeedKind::Hunger.index()] > 0.0);
    }

    #[test]
    fn test_cycles_terminate() {
        let mut b = CatalogueBuilder::new(60.0);
        let egg = b
            .push_item(ItemSpec::ware("egg").satisfies(NeedKind::Hunger, 10.0))
            .unwrap();
        let hen = b.push_item(ItemSpec::ware("hen")).unwrap();
        b.push_recipe(RecipeSpec::new("hatch", 1.0).ingredient(egg, 1.0).product(hen, 1.0))
            .unwrap();
        b.push_recipe(RecipeSpec::new("lay", 1.0).tool(hen, 0.0, 1.0, true).product(egg, 2.0))
            .unwrap();
        let mut s = state_with(b.build().unwrap(), 10.0);
        s.collect(egg, 3.0, 100.0);
        s.collect(hen, 1.0, 100.0);
        s.find_possible_recipes(&[CellId(0)], &HexMap::flat(1, 1));

        let valuation = PriceFinder::new(&s).find_prices();
        assert!(valuation.price(egg).unwrap() > 0.0);
        assert!(valuation.price(hen).unwrap() > 0.0);
    }

    #[test]
    fn test_refresh_caches_prices() {
        let mut b = CatalogueBuilder::new(60.0);
        let bread = b
            .push_item(ItemSpec::ware("bread").satisfies(NeedKind::Hunger, 50.0))
            .unwrap();
        let mut s = state_with(b.build().unwrap(), 10.0);
        s.collect(bread, 2.0, 100.0);
        refresh_valuation(&mut s);
        assert_eq!(s.valuation().get(&bread).copied(), Some(value_of(&s, bread)));
    }
}
