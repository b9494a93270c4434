//! Static Catalogue
//!
//! Immutable definitions of every item and recipe in the world. Loaded once
//! (from TOML, or assembled with [`CatalogueBuilder`] in tests) and shared
//! between agents behind an `Arc`.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::need::NeedKind;

/// Default catalogue file path
pub const DEFAULT_CATALOGUE_PATH: &str = "data/catalogue.toml";

/// Default per-stack cap.
pub const DEFAULT_MAX_AMOUNT: f32 = 10_000.0;

/// Condition lost per season by an item with a one-year lifetime.
const DECAY_PER_SEASON: f32 = 25.0;

/// Index of an item definition in its catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub(crate) u32);

impl ItemId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a recipe definition in its catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecipeId(pub(crate) u32);

impl RecipeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Medium a vehicle moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Land,
    Water,
    Air,
}

impl VehicleKind {
    pub const COUNT: usize = 3;
    pub const ALL: [VehicleKind; VehicleKind::COUNT] =
        [VehicleKind::Land, VehicleKind::Water, VehicleKind::Air];

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub kind: VehicleKind,
    pub speed_multiplier: f32,
}

/// How much a need is satisfied per unit of an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeedSatisfaction {
    pub need: NeedKind,
    pub value: f32,
}

/// Kind-specific item data.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    /// Harvested from cells, regrows there
    Resource {
        /// Logistic regrowth per season
        replenishment_rate: f32,
        base_harvest_cost: f32,
    },
    /// Produced goods, consumable or holdable
    Ware {
        on_consumption: Vec<NeedSatisfaction>,
        vehicles: Vec<Vehicle>,
    },
    /// Holdable only, uses settlement space
    Infrastructure,
}

/// Static definition of an item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDef {
    pub id: ItemId,
    pub label: String,
    pub kind: ItemKind,
    /// Stack cap (deposit cap for resources)
    pub max_amount: f32,
    /// Kilograms per unit
    pub mass: f32,
    /// Kilograms each unit lets its users carry
    pub carrying_capacity: f32,
    pub max_users: f32,
    /// Lifetime in years; zero never decays
    pub decay_time: f32,
    /// Condition lost per unit put into use
    pub decay_on_use: f32,
    pub on_having: Vec<NeedSatisfaction>,
    pub absolute_worth: f32,
}

impl ItemDef {
    pub fn is_resource(&self) -> bool {
        matches!(self.kind, ItemKind::Resource { .. })
    }

    pub fn is_ware(&self) -> bool {
        matches!(self.kind, ItemKind::Ware { .. })
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self.kind, ItemKind::Infrastructure)
    }

    pub fn on_consumption(&self) -> &[NeedSatisfaction] {
        match &self.kind {
            ItemKind::Ware { on_consumption, .. } => on_consumption,
            _ => &[],
        }
    }

    pub fn is_consumable(&self) -> bool {
        !self.on_consumption().is_empty()
    }

    pub fn vehicles(&self) -> &[Vehicle] {
        match &self.kind {
            ItemKind::Ware { vehicles, .. } => vehicles,
            _ => &[],
        }
    }

    /// Condition lost per unit of simulated time.
    pub fn decay_rate(&self, season_duration: f32) -> f32 {
        if self.decay_time <= 0.0 {
            0.0
        } else {
            DECAY_PER_SEASON / self.decay_time / season_duration.max(f32::EPSILON)
        }
    }

    /// Regrowth per unit of simulated time for resources.
    pub fn replenishment_rate(&self, season_duration: f32) -> f32 {
        match self.kind {
            ItemKind::Resource {
                replenishment_rate, ..
            } => replenishment_rate / season_duration.max(f32::EPSILON),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub item: ItemId,
    pub amount: f32,
    /// Contributes to the output condition
    pub state_carried_on: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    pub item: ItemId,
    /// Fraction of time saved when every worker is equipped
    pub time_reduction: f32,
    /// Tools in the same layer substitute for each other
    pub layer: u32,
    /// Units of the tool occupied per worker
    pub use_occupation: f32,
    pub required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub item: ItemId,
    pub amount: f32,
    /// Receives the carried-on condition instead of 100
    pub state_received: bool,
}

/// Static definition of a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDef {
    pub id: RecipeId,
    pub label: String,
    /// Simulated time for one batch with one worker
    pub time_cost: f32,
    pub max_workers: u32,
    pub carries_on_state: bool,
    pub ingredients: Vec<Ingredient>,
    pub tools: Vec<Tool>,
    pub products: Vec<Product>,
    /// No infrastructure ingredient, product or required tool
    pub suitable_for_traveller: bool,
    /// Some ingredient is a resource
    pub is_harvest: bool,
}

impl RecipeDef {
    pub fn ingredient(&self, item: ItemId) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.item == item)
    }

    pub fn tool(&self, item: ItemId) -> Option<&Tool> {
        self.tools.iter().find(|t| t.item == item)
    }
}

/// Catalogue loading and validation errors
#[derive(Debug, Error)]
pub enum CatalogueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("duplicate label '{0}'")]
    DuplicateLabel(String),
    #[error("recipe '{recipe}' references unknown item '{item}'")]
    UnknownItem { recipe: String, item: String },
    #[error("'{label}': {problem}")]
    Invalid { label: String, problem: &'static str },
}

/// All item and recipe definitions.
#[derive(Debug, Clone)]
pub struct Catalogue {
    season_duration: f32,
    items: Vec<ItemDef>,
    recipes: Vec<RecipeDef>,
    /// Per item: recipes using it as ingredient or tool
    involving: Vec<Vec<RecipeId>>,
    /// Recipes without ingredients, available anywhere
    unconditional: Vec<RecipeId>,
    by_label: BTreeMap<String, ItemId>,
}

impl Catalogue {
    /// Loads a catalogue from a TOML file.
    pub fn load(path: impl AsRef<Path>, season_duration: f32) -> Result<Self, CatalogueError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content, season_duration)
    }

    /// Parses a catalogue from TOML. Recipe times are given in seasons.
    pub fn from_toml_str(content: &str, season_duration: f32) -> Result<Self, CatalogueError> {
        let raw: RawCatalogue = toml::from_str(content)?;
        let mut builder = CatalogueBuilder::new(season_duration);

        for item in raw.items {
            let kind = match item.kind {
                RawItemKind::Resource => ItemKind::Resource {
                    replenishment_rate: item.replenishment_rate,
                    base_harvest_cost: item.base_harvest_cost,
                },
                RawItemKind::Ware => ItemKind::Ware {
                    on_consumption: item.on_consumption,
                    vehicles: item.vehicles,
                },
                RawItemKind::Infrastructure => ItemKind::Infrastructure,
            };
            builder.push_item(ItemSpec {
                label: item.label,
                kind,
                max_amount: item.max_amount,
                mass: item.mass,
                carrying_capacity: item.carrying_capacity,
                max_users: item.max_users,
                decay_time: item.decay_time,
                decay_on_use: item.decay_on_use,
                on_having: item.on_having,
                absolute_worth: item.absolute_worth,
            })?;
        }

        for recipe in raw.recipes {
            let lookup = |label: &str| {
                builder.id(label).ok_or_else(|| CatalogueError::UnknownItem {
                    recipe: recipe.label.clone(),
                    item: label.to_string(),
                })
            };
            let ingredients = recipe
                .ingredients
                .iter()
                .map(|i| {
                    Ok(Ingredient {
                        item: lookup(&i.item)?,
                        amount: i.amount,
                        state_carried_on: i.state_carried_on,
                    })
                })
                .collect::<Result<Vec<_>, CatalogueError>>()?;
            let tools = recipe
                .tools
                .iter()
                .map(|t| {
                    Ok(Tool {
                        item: lookup(&t.item)?,
                        time_reduction: t.time_reduction,
                        layer: t.layer,
                        use_occupation: t.use_occupation,
                        required: t.required,
                    })
                })
                .collect::<Result<Vec<_>, CatalogueError>>()?;
            let products = recipe
                .products
                .iter()
                .map(|p| {
                    Ok(Product {
                        item: lookup(&p.item)?,
                        amount: p.amount,
                        state_received: p.state_received,
                    })
                })
                .collect::<Result<Vec<_>, CatalogueError>>()?;

            builder.push_recipe(RecipeSpec {
                label: recipe.label,
                time_cost: recipe.time_cost * season_duration,
                max_workers: recipe.max_workers,
                carries_on_state: recipe.carries_on_state,
                ingredients,
                tools,
                products,
            })?;
        }

        builder.build()
    }

    pub fn season_duration(&self) -> f32 {
        self.season_duration
    }

    /// Definition for an id handed out by this catalogue.
    pub fn item(&self, id: ItemId) -> &ItemDef {
        &self.items[id.index()]
    }

    pub fn recipe(&self, id: RecipeId) -> &RecipeDef {
        &self.recipes[id.index()]
    }

    pub fn get_item(&self, id: ItemId) -> Option<&ItemDef> {
        self.items.get(id.index())
    }

    pub fn get_recipe(&self, id: RecipeId) -> Option<&RecipeDef> {
        self.recipes.get(id.index())
    }

    pub fn items(&self) -> &[ItemDef] {
        &self.items
    }

    pub fn recipes(&self) -> &[RecipeDef] {
        &self.recipes
    }

    pub fn item_id(&self, label: &str) -> Option<ItemId> {
        self.by_label.get(label).copied()
    }

    pub fn recipe_id(&self, label: &str) -> Option<RecipeId> {
        self.recipes.iter().find(|r| r.label == label).map(|r| r.id)
    }

    /// Recipes using `item` as an ingredient or tool.
    pub fn involving(&self, item: ItemId) -> &[RecipeId] {
        self.involving
            .get(item.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn unconditional(&self) -> &[RecipeId] {
        &self.unconditional
    }

    pub fn resources(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.iter().filter(|i| i.is_resource())
    }
}

/// Item fields supplied to [`CatalogueBuilder`].
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub label: String,
    pub kind: ItemKind,
    pub max_amount: f32,
    pub mass: f32,
    pub carrying_capacity: f32,
    pub max_users: f32,
    pub decay_time: f32,
    pub decay_on_use: f32,
    pub on_having: Vec<NeedSatisfaction>,
    pub absolute_worth: f32,
}

impl ItemSpec {
    pub fn ware(label: impl Into<String>) -> Self {
        Self::with_kind(
            label,
            ItemKind::Ware {
                on_consumption: Vec::new(),
                vehicles: Vec::new(),
            },
        )
    }

    pub fn resource(label: impl Into<String>, replenishment_rate: f32) -> Self {
        Self::with_kind(
            label,
            ItemKind::Resource {
                replenishment_rate,
                base_harvest_cost: 1.0,
            },
        )
    }

    pub fn infrastructure(label: impl Into<String>) -> Self {
        Self::with_kind(label, ItemKind::Infrastructure)
    }

    fn with_kind(label: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            label: label.into(),
            kind,
            max_amount: DEFAULT_MAX_AMOUNT,
            mass: 1.0,
            carrying_capacity: 0.0,
            max_users: 0.0,
            decay_time: 0.0,
            decay_on_use: 0.0,
            on_having: Vec::new(),
            absolute_worth: 0.0,
        }
    }

    /// Adds need satisfaction on consumption (wares only).
    pub fn satisfies(mut self, need: NeedKind, value: f32) -> Self {
        if let ItemKind::Ware { on_consumption, .. } = &mut self.kind {
            on_consumption.push(NeedSatisfaction { need, value });
        }
        self
    }

    /// Adds passive need satisfaction while held.
    pub fn satisfies_having(mut self, need: NeedKind, value: f32) -> Self {
        self.on_having.push(NeedSatisfaction { need, value });
        self
    }

    pub fn vehicle(mut self, kind: VehicleKind, speed_multiplier: f32) -> Self {
        if let ItemKind::Ware { vehicles, .. } = &mut self.kind {
            vehicles.push(Vehicle {
                kind,
                speed_multiplier,
            });
        }
        self
    }

    pub fn mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn carrying(mut self, carrying_capacity: f32, max_users: f32) -> Self {
        self.carrying_capacity = carrying_capacity;
        self.max_users = max_users;
        self
    }

    pub fn max_amount(mut self, max_amount: f32) -> Self {
        self.max_amount = max_amount;
        self
    }

    pub fn decay(mut self, decay_time: f32, decay_on_use: f32) -> Self {
        self.decay_time = decay_time;
        self.decay_on_use = decay_on_use;
        self
    }
}

/// Recipe fields supplied to [`CatalogueBuilder`]. `time_cost` is in
/// simulated time units.
#[derive(Debug, Clone)]
pub struct RecipeSpec {
    pub label: String,
    pub time_cost: f32,
    pub max_workers: u32,
    pub carries_on_state: bool,
    pub ingredients: Vec<Ingredient>,
    pub tools: Vec<Tool>,
    pub products: Vec<Product>,
}

impl RecipeSpec {
    pub fn new(label: impl Into<String>, time_cost: f32) -> Self {
        Self {
            label: label.into(),
            time_cost,
            max_workers: 1,
            carries_on_state: false,
            ingredients: Vec::new(),
            tools: Vec::new(),
            products: Vec::new(),
        }
    }

    pub fn workers(mut self, max_workers: u32) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn ingredient(mut self, item: ItemId, amount: f32) -> Self {
        self.ingredients.push(Ingredient {
            item,
            amount,
            state_carried_on: self.carries_on_state,
        });
        self
    }

    pub fn tool(mut self, item: ItemId, time_reduction: f32, use_occupation: f32, required: bool) -> Self {
        let layer = self.tools.len() as u32;
        self.tools.push(Tool {
            item,
            time_reduction,
            layer,
            use_occupation,
            required,
        });
        self
    }

    pub fn product(mut self, item: ItemId, amount: f32) -> Self {
        self.products.push(Product {
            item,
            amount,
            state_received: self.carries_on_state,
        });
        self
    }

    /// Output condition follows the ingredients added after this call.
    pub fn carry_state(mut self) -> Self {
        self.carries_on_state = true;
        self
    }
}

/// Incremental catalogue construction with validation.
#[derive(Debug, Default)]
pub struct CatalogueBuilder {
    season_duration: f32,
    items: Vec<ItemDef>,
    recipes: Vec<RecipeDef>,
    by_label: BTreeMap<String, ItemId>,
    recipe_labels: BTreeSet<String>,
}

impl CatalogueBuilder {
    pub fn new(season_duration: f32) -> Self {
        Self {
            season_duration: season_duration.max(f32::EPSILON),
            ..Self::default()
        }
    }

    pub fn id(&self, label: &str) -> Option<ItemId> {
        self.by_label.get(label).copied()
    }

    pub fn push_item(&mut self, spec: ItemSpec) -> Result<ItemId, CatalogueError> {
        if self.by_label.contains_key(&spec.label) {
            return Err(CatalogueError::DuplicateLabel(spec.label));
        }
        if spec.mass < 0.0 || spec.max_amount <= 0.0 || spec.decay_time < 0.0 {
            return Err(CatalogueError::Invalid {
                label: spec.label,
                problem: "mass, max_amount and decay_time must be non-negative (max_amount positive)",
            });
        }

        let id = ItemId(self.items.len() as u32);
        self.by_label.insert(spec.label.clone(), id);
        self.items.push(ItemDef {
            id,
            label: spec.label,
            kind: spec.kind,
            max_amount: spec.max_amount,
            mass: spec.mass,
            carrying_capacity: spec.carrying_capacity,
            max_users: spec.max_users,
            decay_time: spec.decay_time,
            decay_on_use: spec.decay_on_use,
            on_having: spec.on_having,
            absolute_worth: spec.absolute_worth,
        });
        Ok(id)
    }

    pub fn push_recipe(&mut self, spec: RecipeSpec) -> Result<RecipeId, CatalogueError> {
        if !self.recipe_labels.insert(spec.label.clone()) {
            return Err(CatalogueError::DuplicateLabel(spec.label));
        }
        let invalid = |problem| CatalogueError::Invalid {
            label: spec.label.clone(),
            problem,
        };
        if spec.time_cost < 0.0 {
            return Err(invalid("time_cost must not be negative"));
        }
        if spec.max_workers == 0 {
            return Err(invalid("max_workers must be at least 1"));
        }
        if spec.products.is_empty() {
            return Err(invalid("recipe has no products"));
        }
        if spec.ingredients.iter().any(|i| i.amount <= 0.0) {
            return Err(invalid("ingredient amounts must be positive"));
        }
        if spec
            .tools
            .iter()
            .any(|t| !(0.0..=1.0).contains(&t.time_reduction) || !(0.0..=1.0).contains(&t.use_occupation))
        {
            return Err(invalid("tool time_reduction and use_occupation must lie in [0, 1]"));
        }

        let mut referenced = spec
            .ingredients
            .iter()
            .map(|i| i.item)
            .chain(spec.tools.iter().map(|t| t.item))
            .chain(spec.products.iter().map(|p| p.item));
        if referenced.any(|id| id.index() >= self.items.len()) {
            return Err(invalid("references an item outside this catalogue"));
        }
        if spec.tools.iter().any(|t| self.items[t.item.index()].is_resource()) {
            return Err(invalid("resources cannot be tools"));
        }

        let infra = |id: ItemId| self.items[id.index()].is_infrastructure();
        let suitable_for_traveller = !spec.ingredients.iter().any(|i| infra(i.item))
            && !spec.products.iter().any(|p| infra(p.item))
            && !spec.tools.iter().any(|t| t.required && infra(t.item));
        let is_harvest = spec
            .ingredients
            .iter()
            .any(|i| self.items[i.item.index()].is_resource());

        let mut tools = spec.tools;
        // Stable: tools keep their declared order within a layer
        tools.sort_by_key(|t| t.layer);

        let id = RecipeId(self.recipes.len() as u32);
        self.recipes.push(RecipeDef {
            id,
            label: spec.label,
            time_cost: spec.time_cost,
            max_workers: spec.max_workers,
            carries_on_state: spec.carries_on_state,
            ingredients: spec.ingredients,
            tools,
            products: spec.products,
            suitable_for_traveller,
            is_harvest,
        });
        Ok(id)
    }

    pub fn build(self) -> Result<Catalogue, CatalogueError> {
        let mut involving = vec![Vec::new(); self.items.len()];
        let mut unconditional = Vec::new();

        for recipe in &self.recipes {
            if recipe.ingredients.is_empty() {
                unconditional.push(recipe.id);
            }
            let used: BTreeSet<ItemId> = recipe
                .ingredients
                .iter()
                .map(|i| i.item)
                .chain(recipe.tools.iter().map(|t| t.item))
                .collect();
            for item in used {
                involving[item.index()].push(recipe.id);
            }
        }

        Ok(Catalogue {
            season_duration: self.season_duration,
            items: self.items,
            recipes: self.recipes,
            involving,
            unconditional,
            by_label: self.by_label,
        })
    }
}

// On-disk layout: items and recipes reference each other by label.

#[derive(Debug, Deserialize)]
struct RawCatalogue {
    #[serde(default)]
    items: Vec<RawItem>,
    #[serde(default)]
    recipes: Vec<RawRecipe>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawItemKind {
    Resource,
    Ware,
    Infrastructure,
}

fn default_max_amount() -> f32 {
    DEFAULT_MAX_AMOUNT
}

fn default_mass() -> f32 {
    1.0
}

fn default_one() -> f32 {
    1.0
}

fn default_workers() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct RawItem {
    label: String,
    kind: RawItemKind,
    #[serde(default = "default_max_amount")]
    max_amount: f32,
    #[serde(default = "default_mass")]
    mass: f32,
    #[serde(default)]
    carrying_capacity: f32,
    #[serde(default)]
    max_users: f32,
    #[serde(default)]
    decay_time: f32,
    #[serde(default)]
    decay_on_use: f32,
    #[serde(default)]
    on_having: Vec<NeedSatisfaction>,
    #[serde(default)]
    on_consumption: Vec<NeedSatisfaction>,
    #[serde(default)]
    vehicles: Vec<Vehicle>,
    #[serde(default)]
    absolute_worth: f32,
    #[serde(default)]
    replenishment_rate: f32,
    #[serde(default = "default_one")]
    base_harvest_cost: f32,
}

#[derive(Debug, Deserialize)]
struct RawIngredient {
    item: String,
    #[serde(default = "default_one")]
    amount: f32,
    #[serde(default)]
    state_carried_on: bool,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    item: String,
    #[serde(default)]
    time_reduction: f32,
    #[serde(default)]
    layer: u32,
    #[serde(default = "default_one")]
    use_occupation: f32,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Deserialize)]
struct RawProduct {
    item: String,
    #[serde(default = "default_one")]
    amount: f32,
    #[serde(default)]
    state_received: bool,
}

#[derive(Debug, Deserialize)]
struct RawRecipe {
    label: String,
    /// Seasons
    time_cost: f32,
    #[serde(default = "default_workers")]
    max_workers: u32,
    #[serde(default)]
    carries_on_state: bool,
    #[serde(default)]
    ingredients: Vec<RawIngredient>,
    #[serde(default)]
    tools: Vec<RawTool>,
    #[serde(default)]
    products: Vec<RawProduct>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[items]]
        label = "berries"
        kind = "resource"
        replenishment_rate = 0.5
        max_amount = 400.0

        [[items]]
        label = "food"
        kind = "ware"
        mass = 0.5
        decay_time = 0.5
        on_consumption = [{ need = "hunger", value = 20.0 }]

        [[items]]
        label = "basket"
        kind = "ware"
        mass = 1.0

        [[items]]
        label = "granary"
        kind = "infrastructure"
        mass = 100.0

        [[recipes]]
        label = "pick berries"
        time_cost = 0.05
        ingredients = [{ item = "berries", amount = 2.0 }]
        tools = [{ item = "basket", time_reduction = 0.5 }]
        products = [{ item = "food", amount = 1.0 }]

        [[recipes]]
        label = "build granary"
        time_cost = 1.0
        max_workers = 10
        ingredients = [{ item = "food", amount = 5.0 }]
        products = [{ item = "granary" }]
    "#;

    #[test]
    fn test_parse_sample_catalogue() {
        let catalogue = Catalogue::from_toml_str(SAMPLE, 60.0).unwrap();
        assert_eq!(catalogue.items().len(), 4);
        assert_eq!(catalogue.recipes().len(), 2);

        let food = catalogue.item_id("food").unwrap();
        assert!(catalogue.item(food).is_consumable());
        assert!((catalogue.item(food).decay_rate(60.0) - 25.0 / 0.5 / 60.0).abs() < 1e-6);

        let pick = catalogue.recipe(catalogue.recipe_id("pick berries").unwrap());
        assert!((pick.time_cost - 3.0).abs() < 1e-5);
        assert!(pick.is_harvest);
        assert!(pick.suitable_for_traveller);
    }

    #[test]
    fn test_involving_lists_ingredients_and_tools() {
        let catalogue = Catalogue::from_toml_str(SAMPLE, 60.0).unwrap();
        let basket = catalogue.item_id("basket").unwrap();
        let food = catalogue.item_id("food").unwrap();
        let pick = catalogue.recipe_id("pick berries").unwrap();
        let build = catalogue.recipe_id("build granary").unwrap();

        assert_eq!(catalogue.involving(basket), &[pick]);
        assert_eq!(catalogue.involving(food), &[build]);
        assert!(!catalogue.recipe(build).suitable_for_traveller);
    }

    #[test]
    fn test_unknown_item_is_rejected() {
        let text = r#"
            [[items]]
            label = "food"
            kind = "ware"

            [[recipes]]
            label = "bake"
            time_cost = 0.1
            ingredients = [{ item = "flour" }]
            products = [{ item = "food" }]
        "#;
        let err = Catalogue::from_toml_str(text, 60.0).unwrap_err();
        assert!(matches!(err, CatalogueError::UnknownItem { ref item, .. } if item == "flour"));
    }

    #[test]
    fn test_duplicate_label_is_rejected() {
        let mut builder = CatalogueBuilder::new(60.0);
        builder.push_item(ItemSpec::ware("food")).unwrap();
        let err = builder.push_item(ItemSpec::ware("food")).unwrap_err();
        assert!(matches!(err, CatalogueError::DuplicateLabel(_)));
    }

    #[test]
    fn test_ingredientless_recipes_are_unconditional() {
        let mut builder = CatalogueBuilder::new(100.0);
        let food = builder
            .push_item(ItemSpec::ware("food").satisfies(NeedKind::Hunger, 10.0))
            .unwrap();
        let gather = builder
            .push_recipe(RecipeSpec::new("gather food", 2.0).product(food, 1.0))
            .unwrap();
        let catalogue = builder.build().unwrap();
        assert_eq!(catalogue.unconditional(), &[gather]);
        assert!(!catalogue.recipe(gather).is_harvest);
    }

    #[test]
    fn test_tools_sorted_by_layer() {
        let mut builder = CatalogueBuilder::new(60.0);
        let a = builder.push_item(ItemSpec::ware("axe")).unwrap();
        let b = builder.push_item(ItemSpec::ware("saw")).unwrap();
        let plank = builder.push_item(ItemSpec::ware("plank")).unwrap();
        let mut spec = RecipeSpec::new("cut", 1.0).product(plank, 1.0);
        spec.tools.push(Tool { item: a, time_reduction: 0.1, layer: 2, use_occupation: 1.0, required: false });
        spec.tools.push(Tool { item: b, time_reduction: 0.1, layer: 0, use_occupation: 1.0, required: false });
        let id = builder.push_recipe(spec).unwrap();
        let catalogue = builder.build().unwrap();
        let layers: Vec<u32> = catalogue.recipe(id).tools.iter().map(|t| t.layer).collect();
        assert_eq!(layers, vec![0, 2]);
    }
}
