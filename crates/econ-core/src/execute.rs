//! Plan Execution
//!
//! Replays planned actions against the live state. Planning works on
//! clones, so every stack, recipe and partner a descriptor names is looked
//! up again here; anything that vanished since planning is reported as
//! stale and the caller drops the rest of the plan.

use thiserror::Error;

use crate::catalogue::{ItemId, RecipeId};
use crate::chooser::{Action, ActionDescriptor};
use crate::recipe::{DepositClaim, Harvest, Portion, RecipeError, RecipeOrder};
use crate::stack::StackId;
use crate::state::{AgentState, StateError};
use crate::terrain::{AgentKey, CellId, Terrain};

/// The half of a trade the partner has to perform.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeOffer {
    pub partner: AgentKey,
    pub give_item: ItemId,
    pub give_amount: f32,
    pub give_condition: f32,
    /// Stack in the partner's holdings
    pub take: Portion,
    pub take_item: ItemId,
}

/// Goods the partner actually handed over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Delivery {
    pub amount: f32,
    pub condition: f32,
}

/// World-side effects of execution. Implemented by the host.
pub trait ActionExecutor {
    fn terrain(&self) -> &dyn Terrain;

    /// Moves the agent. Returns the time taken, or `None` when the
    /// destination is unreachable.
    fn travel(&mut self, destination: CellId, hops: u32) -> Option<f32>;

    /// Performs the partner's side of a trade. `None` when the partner or
    /// its stack is gone, or when it cannot carry the whole offer; nothing
    /// changes hands then.
    fn trade(&mut self, offer: &TradeOffer) -> Option<Delivery>;

    /// Deducts a harvest from the terrain.
    fn harvest(&mut self, harvest: &Harvest);
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("{0} no longer exists")]
    StaleStack(StackId),
    #[error("recipe {0:?} is no longer runnable")]
    StaleRecipe(RecipeId),
    #[error("trade partner {0:?} is gone")]
    StalePartner(AgentKey),
    #[error("{0} cannot be reached")]
    Unreachable(CellId),
    #[error("cannot carry traded {0:?}")]
    CannotCarry(ItemId),
    #[error(transparent)]
    Recipe(#[from] RecipeError),
    #[error(transparent)]
    State(#[from] StateError),
}

/// Applies one planned action to the live state at time `now`. Returns
/// the simulated time the action takes.
pub fn execute(
    state: &mut AgentState,
    descriptor: &ActionDescriptor,
    executor: &mut dyn ActionExecutor,
    now: f32,
) -> Result<f32, ExecutionError> {
    apply(state, descriptor, executor, now).map_err(stale)
}

fn apply(
    state: &mut AgentState,
    descriptor: &ActionDescriptor,
    executor: &mut dyn ActionExecutor,
    now: f32,
) -> Result<f32, ExecutionError> {
    match &descriptor.action {
        Action::Consume { stack, item, amount } => {
            let available = live_free(state, *stack, *item)?;
            state.consume(*stack, amount.min(available))?;
            Ok(descriptor.time)
        }
        Action::Relinquish { stack, item, amount } => {
            let available = live_free(state, *stack, *item)?;
            state.relinquish(*stack, amount.min(available))?;
            Ok(descriptor.time)
        }
        Action::Produce { order } => produce(state, order, executor, now),
        Action::Trade {
            partner,
            give,
            give_item,
            take,
            take_item,
        } => {
            let available = live_free(state, give.stack, *give_item)?;
            if available < give.amount {
                return Err(ExecutionError::StaleStack(give.stack));
            }
            if state.room_for(*take_item, take.amount) < take.amount {
                return Err(ExecutionError::CannotCarry(*take_item));
            }
            let give_condition = state.find_stack(give.stack).map_or(0.0, |s| s.condition());
            let offer = TradeOffer {
                partner: *partner,
                give_item: *give_item,
                give_amount: give.amount,
                give_condition,
                take: *take,
                take_item: *take_item,
            };
            let delivery = executor
                .trade(&offer)
                .ok_or(ExecutionError::StalePartner(*partner))?;
            state.relinquish(give.stack, give.amount)?;
            state.collect(*take_item, delivery.amount, delivery.condition);
            Ok(descriptor.time)
        }
        Action::Travel { destination, hops } => executor
            .travel(*destination, *hops)
            .ok_or(ExecutionError::Unreachable(*destination)),
    }
}

fn produce(
    state: &mut AgentState,
    order: &RecipeOrder,
    executor: &mut dyn ActionExecutor,
    now: f32,
) -> Result<f32, ExecutionError> {
    if state.catalogue().get_recipe(order.recipe).is_none() {
        return Err(ExecutionError::StaleRecipe(order.recipe));
    }

    // Deposits may have been harvested by others since planning.
    let mut live = order.clone();
    live.deposits = refresh_claims(&order.deposits, executor.terrain());
    live.workers = live.workers.min(state.free_workers());

    let receipt = state.follow_recipe(&live, now).map_err(|e| match e {
        RecipeError::StaleIngredient(stack) => ExecutionError::StaleStack(stack),
        RecipeError::UnknownRecipe(recipe) => ExecutionError::StaleRecipe(recipe),
        other => ExecutionError::Recipe(other),
    })?;
    for harvest in &receipt.harvested {
        executor.harvest(harvest);
    }
    Ok(receipt.time)
}

fn refresh_claims(claims: &[DepositClaim], terrain: &dyn Terrain) -> Vec<DepositClaim> {
    claims
        .iter()
        .map(|claim| DepositClaim {
            available: terrain
                .deposits(claim.cell)
                .iter()
                .filter(|d| d.item == claim.item)
                .map(|d| d.amount)
                .sum(),
            ..claim.clone()
        })
        .collect()
}

/// Free amount of a stack that must still hold `item`.
fn live_free(state: &AgentState, stack: StackId, item: ItemId) -> Result<f32, ExecutionError> {
    state
        .find_stack(stack)
        .filter(|s| s.item == item)
        .map(|s| s.amount_free())
        .ok_or(ExecutionError::StaleStack(stack))
}

fn stale(error: ExecutionError) -> ExecutionError {
    match &error {
        ExecutionError::StaleStack(_) | ExecutionError::StaleRecipe(_) | ExecutionError::StalePartner(_) => {
            tracing::warn!(%error, "plan reference went stale")
        }
        _ => {}
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::{Catalogue, CatalogueBuilder, ItemSpec, RecipeSpec};
    use crate::config::PopulationConfig;
    use crate::need::{Need, NeedKind};
    use crate::state::Mobility;
    use crate::terrain::{HexMap, ResourceDeposit};
    use std::sync::Arc;

    struct Farm {
        catalogue: Arc<Catalogue>,
        grain: ItemId,
        bread: ItemId,
        cloth: ItemId,
        reap: RecipeId,
    }

    fn farm() -> Farm {
        let mut b = CatalogueBuilder::new(10.0);
        let grain = b.push_item(ItemSpec::resource("grain", 0.0).max_amount(100.0)).unwrap();
        let bread = b
            .push_item(ItemSpec::ware("bread").satisfies(NeedKind::Hunger, 20.0))
            .unwrap();
        let cloth = b.push_item(ItemSpec::ware("cloth")).unwrap();
        let reap = b
            .push_recipe(RecipeSpec::new("reap", 4.0).ingredient(grain, 2.0).product(bread, 1.0))
            .unwrap();
        Farm {
            catalogue: Arc::new(b.build().unwrap()),
            grain,
            bread,
            cloth,
            reap,
        }
    }

    fn settlement(f: &Farm) -> AgentState {
        AgentState::new(
            Arc::clone(&f.catalogue),
            Mobility::Settlement,
            4.0,
            [Need::new(0.01, 1.0); NeedKind::COUNT],
            &PopulationConfig::default(),
        )
    }

    struct Host {
        map: HexMap,
        harvested: Vec<Harvest>,
        partner: Option<AgentKey>,
        offers: Vec<TradeOffer>,
    }

    impl Host {
        fn new(map: HexMap) -> Self {
            Self {
                map,
                harvested: Vec::new(),
                partner: None,
                offers: Vec::new(),
            }
        }
    }

    impl ActionExecutor for Host {
        fn terrain(&self) -> &dyn Terrain {
            &self.map
        }

        fn travel(&mut self, destination: CellId, _hops: u32) -> Option<f32> {
            self.map.cell(destination).map(|_| 3.0)
        }

        fn trade(&mut self, offer: &TradeOffer) -> Option<Delivery> {
            if self.partner != Some(offer.partner) {
                return None;
            }
            self.offers.push(offer.clone());
            Some(Delivery {
                amount: offer.take.amount,
                condition: 80.0,
            })
        }

        fn harvest(&mut self, harvest: &Harvest) {
            self.map.harvest(harvest.cell, harvest.item, harvest.amount);
            self.harvested.push(*harvest);
        }
    }

    fn reap_order(f: &Farm, claims: Vec<DepositClaim>) -> ActionDescriptor {
        ActionDescriptor {
            action: Action::Produce {
                order: RecipeOrder {
                    recipe: f.reap,
                    amount: 2,
                    workers: 2,
                    ingredients: Vec::new(),
                    deposits: claims,
                },
            },
            time: 4.0,
        }
    }

    #[test]
    fn test_consume_uses_live_stack() {
        let f = farm();
        let mut s = settlement(&f);
        s.collect(f.bread, 5.0, 100.0);
        let stack = s.stacks_of(f.bread)[0].id;
        let mut host = Host::new(HexMap::flat(2, 2));

        let descriptor = ActionDescriptor {
            action: Action::Consume {
                stack,
                item: f.bread,
                amount: 8.0,
            },
            time: 0.0,
        };
        let time = execute(&mut s, &descriptor, &mut host, 0.0).unwrap();
        assert_eq!(time, 0.0);
        assert_eq!(s.total(f.bread), 0.0);
    }

    #[test]
    fn test_missing_stack_is_stale() {
        let f = farm();
        let mut s = settlement(&f);
        let mut host = Host::new(HexMap::flat(2, 2));
        let descriptor = ActionDescriptor {
            action: Action::Relinquish {
                stack: StackId(99),
                item: f.bread,
                amount: 1.0,
            },
            time: 0.0,
        };
        assert_eq!(
            execute(&mut s, &descriptor, &mut host, 0.0),
            Err(ExecutionError::StaleStack(StackId(99)))
        );
    }

    #[test]
    fn test_produce_harvests_live_deposits() {
        let f = farm();
        let mut map = HexMap::flat(2, 2);
        map.add_deposit(CellId(0), ResourceDeposit::new(f.grain, 10.0, 100.0, 0.0));
        let mut host = Host::new(map);
        let mut s = settlement(&f);
        // Planned against a richer deposit than the live one holds.
        let claims = vec![DepositClaim {
            cell: CellId(0),
            item: f.grain,
            available: 50.0,
        }];

        let time = execute(&mut s, &reap_order(&f, claims), &mut host, 1.0).unwrap();
        assert_eq!(time, 4.0);
        assert_eq!(host.harvested.len(), 1);
        assert_eq!(host.harvested[0].amount, 4.0);
        assert_eq!(host.map.deposits(CellId(0))[0].amount, 6.0);
        assert_eq!(s.pending_productions(), 1);
        assert_eq!(s.drain_completed(5.0), 1);
        assert_eq!(s.total(f.bread), 2.0);
    }

    #[test]
    fn test_exhausted_deposit_fails_without_change() {
        let f = farm();
        let mut map = HexMap::flat(2, 2);
        map.add_deposit(CellId(0), ResourceDeposit::new(f.grain, 1.0, 100.0, 0.0));
        let mut host = Host::new(map);
        let mut s = settlement(&f);
        let claims = vec![DepositClaim {
            cell: CellId(0),
            item: f.grain,
            available: 50.0,
        }];

        let err = execute(&mut s, &reap_order(&f, claims), &mut host, 0.0).unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Recipe(RecipeError::InsufficientResource { item: f.grain })
        );
        assert!(host.harvested.is_empty());
        assert_eq!(s.free_workers(), 4);
    }

    #[test]
    fn test_trade_with_vanished_partner_is_stale() {
        let f = farm();
        let mut s = settlement(&f);
        s.collect(f.cloth, 3.0, 100.0);
        let give = Portion {
            stack: s.stacks_of(f.cloth)[0].id,
            amount: 2.0,
        };
        let descriptor = ActionDescriptor {
            action: Action::Trade {
                partner: AgentKey(7),
                give,
                give_item: f.cloth,
                take: Portion {
                    stack: StackId(0),
                    amount: 1.0,
                },
                take_item: f.bread,
            },
            time: 0.0,
        };

        let mut host = Host::new(HexMap::flat(2, 2));
        assert_eq!(
            execute(&mut s, &descriptor, &mut host, 0.0),
            Err(ExecutionError::StalePartner(AgentKey(7)))
        );
        assert_eq!(s.total(f.cloth), 3.0);

        host.partner = Some(AgentKey(7));
        execute(&mut s, &descriptor, &mut host, 0.0).unwrap();
        assert_eq!(s.total(f.cloth), 1.0);
        assert_eq!(s.total(f.bread), 1.0);
        assert_eq!(host.offers[0].give_amount, 2.0);
    }

    #[test]
    fn test_trade_refused_when_goods_cannot_be_carried() {
        let f = farm();
        let mut s = settlement(&f);
        // 4 people carry 160, doubled
        assert_eq!(s.collect(f.cloth, 400.0, 100.0), 320.0);
        let descriptor = ActionDescriptor {
            action: Action::Trade {
                partner: AgentKey(7),
                give: Portion {
                    stack: s.stacks_of(f.cloth)[0].id,
                    amount: 2.0,
                },
                give_item: f.cloth,
                take: Portion {
                    stack: StackId(0),
                    amount: 1.0,
                },
                take_item: f.bread,
            },
            time: 0.0,
        };

        let mut host = Host::new(HexMap::flat(2, 2));
        host.partner = Some(AgentKey(7));
        assert_eq!(
            execute(&mut s, &descriptor, &mut host, 0.0),
            Err(ExecutionError::CannotCarry(f.bread))
        );
        assert!(host.offers.is_empty());
        assert_eq!(s.total(f.cloth), 320.0);
        assert_eq!(s.total(f.bread), 0.0);
    }

    #[test]
    fn test_travel_to_missing_cell_is_unreachable() {
        let f = farm();
        let mut s = settlement(&f);
        let mut host = Host::new(HexMap::flat(2, 2));
        let descriptor = ActionDescriptor {
            action: Action::Travel {
                destination: CellId(40),
                hops: 5,
            },
            time: 3.0,
        };
        assert_eq!(
            execute(&mut s, &descriptor, &mut host, 0.0),
            Err(ExecutionError::Unreachable(CellId(40)))
        );
    }
}
