//! Recipe Resolution and Production
//!
//! Finds which recipes an agent can run from its holdings and its zone, and
//! executes them. Production in a live state is deferred until its
//! completion time; simulated states complete it immediately.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::catalogue::{ItemId, RecipeDef, RecipeId};
use crate::stack::{StackId, CONDITION_MAX};
use crate::state::{AgentState, StateEvent};
use crate::terrain::{CellId, Terrain};

const AMOUNT_EPSILON: f32 = 1e-4;

/// A resource deposit a recipe may draw from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositClaim {
    pub cell: CellId,
    pub item: ItemId,
    pub available: f32,
}

/// A recipe the agent can currently run, with its batch bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeOption {
    pub recipe: RecipeId,
    pub max_amount: u32,
    pub max_workers: u32,
    pub deposits: Vec<DepositClaim>,
}

/// An amount taken from a specific stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Portion {
    pub stack: StackId,
    pub amount: f32,
}

/// Fully bound production request.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeOrder {
    pub recipe: RecipeId,
    pub amount: u32,
    pub workers: u32,
    pub ingredients: Vec<Portion>,
    pub deposits: Vec<DepositClaim>,
}

/// Resource taken from a cell by a production run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Harvest {
    pub cell: CellId,
    pub item: ItemId,
    pub amount: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductionReceipt {
    pub recipe: RecipeId,
    pub amount: u32,
    pub workers: u32,
    /// Simulated time the run takes
    pub time: f32,
    pub completes_at: f32,
    /// Deposits the host must deduct from the terrain
    pub harvested: Vec<Harvest>,
}

/// Production waiting for its completion time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PendingProduction {
    pub recipe: RecipeId,
    pub amount: u32,
    pub workers: u32,
    /// Tool units reserved until completion
    pub tools: Vec<Portion>,
    pub output_condition: f32,
    pub completes_at: f32,
    pub deposits: Vec<DepositClaim>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecipeError {
    #[error("recipe {0:?} is not in the catalogue")]
    UnknownRecipe(RecipeId),
    #[error("batch amount must be at least one")]
    ZeroAmount,
    #[error("no free workers")]
    NoFreeWorkers,
    #[error("not enough of resource {item:?} in the zone")]
    InsufficientResource { item: ItemId },
    #[error("not enough of ingredient {item:?}")]
    MissingIngredient { item: ItemId },
    #[error("{0} no longer exists")]
    StaleIngredient(StackId),
    #[error("required tool {item:?} is not available")]
    MissingTool { item: ItemId },
}

impl AgentState {
    /// Rebuilds the list of recipes runnable from current holdings and the
    /// deposits in `zone`.
    pub fn find_possible_recipes(&mut self, zone: &[CellId], terrain: &dyn Terrain) {
        let catalogue = Arc::clone(self.catalogue());
        let mut candidates = BTreeSet::new();

        for item in self.held_items() {
            candidates.extend(catalogue.involving(item).iter().copied());
        }
        for cell in zone {
            for deposit in terrain.deposits(*cell) {
                if deposit.amount > 0.0 {
                    candidates.extend(catalogue.involving(deposit.item).iter().copied());
                }
            }
        }
        candidates.extend(catalogue.unconditional().iter().copied());

        let traveller = self.is_traveller();
        self.possible_recipes = candidates
            .into_iter()
            .map(|id| catalogue.recipe(id))
            .filter(|recipe| !traveller || recipe.suitable_for_traveller)
            .filter_map(|recipe| self.recipe_option(recipe, zone, terrain))
            .collect();
    }

    fn recipe_option(
        &self,
        recipe: &RecipeDef,
        zone: &[CellId],
        terrain: &dyn Terrain,
    ) -> Option<RecipeOption> {
        let catalogue = self.catalogue();
        let mut max_amount = self.population_int();
        let mut deposits = Vec::new();

        for ingredient in &recipe.ingredients {
            let available = if catalogue.item(ingredient.item).is_resource() {
                let mut sum = 0.0;
                for cell in zone {
                    let found = terrain
                        .deposits(*cell)
                        .iter()
                        .find(|d| d.item == ingredient.item && d.amount >= ingredient.amount);
                    if let Some(deposit) = found {
                        deposits.push(DepositClaim {
                            cell: *cell,
                            item: deposit.item,
                            available: deposit.amount,
                        });
                        sum += deposit.amount;
                    }
                }
                sum
            } else {
                self.total_free(ingredient.item)
            };
            max_amount = max_amount.min((available / ingredient.amount).floor() as u32);
            if max_amount == 0 {
                return None;
            }
        }

        let tool_missing = recipe
            .tools
            .iter()
            .filter(|t| t.required)
            .any(|t| self.total(t.item) < t.use_occupation.max(AMOUNT_EPSILON));
        if tool_missing || max_amount == 0 {
            return None;
        }

        Some(RecipeOption {
            recipe: recipe.id,
            max_amount,
            max_workers: self.population_int(),
            deposits,
        })
    }

    pub fn recipe_option_for(&self, recipe: RecipeId) -> Option<&RecipeOption> {
        self.possible_recipes.iter().find(|o| o.recipe == recipe)
    }

    /// Runs a production order.
    ///
    /// Every check happens before any mutation: a rejected order leaves the
    /// state untouched. Time is `time_cost * (1 - tool reduction) * amount /
    /// workers`.
    pub fn follow_recipe(&mut self, order: &RecipeOrder, now: f32) -> Result<ProductionReceipt, RecipeError> {
        let catalogue = Arc::clone(self.catalogue());
        let recipe = catalogue
            .get_recipe(order.recipe)
            .ok_or(RecipeError::UnknownRecipe(order.recipe))?;
        if order.amount == 0 {
            return Err(RecipeError::ZeroAmount);
        }
        if self.free_workers() == 0 {
            return Err(RecipeError::NoFreeWorkers);
        }
        let worker_cap = recipe
            .max_workers
            .saturating_mul(order.amount)
            .min(self.free_workers())
            .max(1);
        let workers = order.workers.clamp(1, worker_cap);
        let batch = order.amount as f32;

        let mut harvested = Vec::new();
        for ingredient in recipe.ingredients.iter().filter(|i| catalogue.item(i.item).is_resource()) {
            let mut needed = ingredient.amount * batch;
            for claim in order.deposits.iter().filter(|c| c.item == ingredient.item) {
                if needed <= AMOUNT_EPSILON {
                    break;
                }
                let take = needed.min(claim.available);
                if take > 0.0 {
                    harvested.push(Harvest {
                        cell: claim.cell,
                        item: claim.item,
                        amount: take,
                    });
                    needed -= take;
                }
            }
            if needed > AMOUNT_EPSILON {
                return Err(RecipeError::InsufficientResource {
                    item: ingredient.item,
                });
            }
        }

        let mut deductions: Vec<Portion> = Vec::new();
        let mut carried_condition = 0.0;
        let mut carried_mass = 0.0;
        for ingredient in recipe.ingredients.iter().filter(|i| !catalogue.item(i.item).is_resource()) {
            let mass = catalogue.item(ingredient.item).mass.max(AMOUNT_EPSILON);
            let mut needed = ingredient.amount * batch;
            for portion in &order.ingredients {
                if needed <= AMOUNT_EPSILON {
                    break;
                }
                let stack = self
                    .find_stack(portion.stack)
                    .ok_or(RecipeError::StaleIngredient(portion.stack))?;
                if stack.item != ingredient.item {
                    continue;
                }
                let already: f32 = deductions
                    .iter()
                    .filter(|d| d.stack == portion.stack)
                    .map(|d| d.amount)
                    .sum();
                let take = portion.amount.min(stack.amount_free() - already).min(needed);
                if take <= 0.0 {
                    continue;
                }
                if ingredient.state_carried_on {
                    carried_condition += stack.condition() * take * mass;
                    carried_mass += take * mass;
                }
                deductions.push(Portion {
                    stack: portion.stack,
                    amount: take,
                });
                needed -= take;
            }
            if needed > AMOUNT_EPSILON {
                return Err(RecipeError::MissingIngredient {
                    item: ingredient.item,
                });
            }
        }

        let (reservations, reduction) = self.reserve_tools(recipe, workers)?;
        let time = recipe.time_cost * (1.0 - reduction) * batch / workers as f32;

        for reservation in &reservations {
            let wear = self
                .find_stack(reservation.stack)
                .map(|s| catalogue.item(s.item).decay_on_use)
                .unwrap_or(0.0);
            if let Some(stack) = self.stack_mut(reservation.stack) {
                stack.set_amount_in_use(stack.amount_in_use() + reservation.amount, wear);
            }
        }
        for deduction in &deductions {
            // Checked above; the stack still holds at least this much.
            let _ = self.relinquish(deduction.stack, deduction.amount);
        }
        self.set_free_workers(self.free_workers() - workers);

        let output_condition = if recipe.carries_on_state && carried_mass > 0.0 {
            carried_condition / carried_mass
        } else {
            CONDITION_MAX
        };
        let production = PendingProduction {
            recipe: recipe.id,
            amount: order.amount,
            workers,
            tools: reservations,
            output_condition,
            completes_at: now + time,
            deposits: order.deposits.clone(),
        };
        let receipt = ProductionReceipt {
            recipe: recipe.id,
            amount: order.amount,
            workers,
            time,
            completes_at: production.completes_at,
            harvested,
        };

        if self.is_simulated() {
            self.complete_production(production);
        } else {
            self.pending.push(production);
        }
        Ok(receipt)
    }

    /// Equips workers layer by layer. Tools within a layer substitute for
    /// each other; a layer holding a required tool must equip someone.
    fn reserve_tools(&self, recipe: &RecipeDef, workers: u32) -> Result<(Vec<Portion>, f32), RecipeError> {
        let workers = workers as f32;
        let mut reservations: Vec<Portion> = Vec::new();
        let mut reduction = 0.0;
        let mut start = 0;

        while start < recipe.tools.len() {
            let layer = recipe.tools[start].layer;
            let end = recipe.tools[start..]
                .iter()
                .position(|t| t.layer != layer)
                .map_or(recipe.tools.len(), |offset| start + offset);
            let group = &recipe.tools[start..end];
            let mut equipped = 0.0;

            for tool in group {
                if equipped >= workers {
                    break;
                }
                let stacks = self.stacks_of(tool.item);
                if stacks.is_empty() {
                    continue;
                }
                let mut tool_equipped = 0.0;
                if tool.use_occupation <= 0.0 {
                    tool_equipped = workers - equipped;
                } else {
                    let mut wanted = (workers - equipped) * tool.use_occupation;
                    for stack in stacks {
                        let reserved: f32 = reservations
                            .iter()
                            .filter(|r| r.stack == stack.id)
                            .map(|r| r.amount)
                            .sum();
                        let free = stack.amount_free() - reserved;
                        if free < tool.use_occupation {
                            continue;
                        }
                        let take = wanted.min(free);
                        reservations.push(Portion {
                            stack: stack.id,
                            amount: take,
                        });
                        tool_equipped += take / tool.use_occupation;
                        wanted -= take;
                        if wanted <= AMOUNT_EPSILON {
                            break;
                        }
                    }
                }
                equipped += tool_equipped;
                reduction += tool.time_reduction * tool_equipped / workers;
            }

            if equipped < 1.0 {
                if let Some(required) = group.iter().find(|t| t.required) {
                    return Err(RecipeError::MissingTool {
                        item: required.item,
                    });
                }
            }
            start = end;
        }

        Ok((reservations, f32::clamp(reduction, 0.0, 1.0)))
    }

    fn complete_production(&mut self, production: PendingProduction) {
        let catalogue = Arc::clone(self.catalogue());
        let recipe = catalogue.recipe(production.recipe);

        for tool in &production.tools {
            if let Some(stack) = self.stack_mut(tool.stack) {
                stack.set_amount_in_use(stack.amount_in_use() - tool.amount, 0.0);
            }
        }
        self.set_free_workers(self.free_workers() + production.workers);

        let batch = production.amount as f32;
        for product in &recipe.products {
            let amount = product.amount * batch;
            if catalogue.item(product.item).is_resource() {
                if self.is_simulated() {
                    continue;
                }
                let cell = production
                    .deposits
                    .iter()
                    .find(|c| c.item == product.item)
                    .or_else(|| production.deposits.first())
                    .map(|c| c.cell);
                if let Some(cell) = cell {
                    self.push_event(StateEvent::DepositReplenished {
                        cell,
                        item: product.item,
                        amount,
                    });
                }
                continue;
            }
            let condition = if product.state_received {
                production.output_condition
            } else {
                CONDITION_MAX
            };
            self.collect(product.item, amount, condition);
        }

        if !self.is_simulated() {
            self.push_event(StateEvent::ProductionCompleted {
                recipe: production.recipe,
                amount: production.amount,
            });
        }
    }

    /// Completes every pending production due by `now`, earliest first.
    /// Returns how many completed.
    pub fn drain_completed(&mut self, now: f32) -> usize {
        let (mut due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.completes_at <= now);
        self.pending = waiting;
        due.sort_by(|a, b| a.completes_at.total_cmp(&b.completes_at));
        let count = due.len();
        for production in due {
            self.complete_production(production);
        }
        count
    }

    /// Completion time of the earliest pending production.
    pub fn next_completion(&self) -> Option<f32> {
        self.pending
            .iter()
            .map(|p| p.completes_at)
            .min_by(|a, b| a.total_cmp(b))
    }
}
