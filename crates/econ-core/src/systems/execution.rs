//! Execution System
//!
//! Applies plan steps to live states. An agent runs steps until it is busy
//! with one that takes time; a step that fails drops the rest of its plan.

use bevy_ecs::prelude::*;
use econ_events::{EventKind, SimTimestamp};
use std::collections::HashMap;

use crate::catalogue::{Catalogue, ItemId, VehicleKind};
use crate::chooser::{describe_action, Action, ActionDescriptor};
use crate::components::{ActivePlan, AgentHandle, AgentId, AgentName, Clock, Economy, RunStats, SharedCatalogue, Territory, WorldMap};
use crate::events::EventLogger;
use crate::execute::{execute, ActionExecutor, Delivery, TradeOffer};
use crate::recipe::Harvest;
use crate::state::AgentState;
use crate::terrain::{AgentKey, CellId, HexMap, Terrain};

/// The host side of execution for one agent and one step.
struct HostExecutor<'a> {
    map: &'a mut HexMap,
    position: Option<CellId>,
    speeds: [f32; VehicleKind::COUNT],
    arrived: Option<CellId>,
    partner: Option<(AgentKey, &'a mut AgentState)>,
}

impl ActionExecutor for HostExecutor<'_> {
    fn terrain(&self) -> &dyn Terrain {
        &*self.map
    }

    fn travel(&mut self, destination: CellId, _hops: u32) -> Option<f32> {
        let origin = self.position?;
        let time = self.map.time_cost(origin, destination, &self.speeds)?;
        self.arrived = Some(destination);
        Some(time)
    }

    fn trade(&mut self, offer: &TradeOffer) -> Option<Delivery> {
        let (key, partner) = self.partner.as_mut()?;
        if *key != offer.partner {
            return None;
        }
        let stack = partner.find_stack(offer.take.stack)?;
        if stack.item != offer.take_item || stack.amount_free() < offer.take.amount {
            return None;
        }
        if partner.room_for(offer.give_item, offer.give_amount) < offer.give_amount {
            return None;
        }
        let condition = stack.condition();
        partner.relinquish(offer.take.stack, offer.take.amount).ok()?;
        partner.collect(offer.give_item, offer.give_amount, offer.give_condition);
        Some(Delivery {
            amount: offer.take.amount,
            condition,
        })
    }

    fn harvest(&mut self, harvest: &Harvest) {
        self.map.harvest(harvest.cell, harvest.item, harvest.amount);
    }
}

/// Borrowed world state shared by every step of one system run.
struct StepContext<'a> {
    now: f32,
    timestamp: SimTimestamp,
    map: &'a mut HexMap,
    catalogue: &'a Catalogue,
    logger: &'a mut EventLogger,
    stats: &'a mut RunStats,
}

/// The acting agent's components.
struct Actor<'a> {
    id: &'a AgentId,
    name: &'a AgentName,
    state: &'a mut AgentState,
    territory: &'a mut Territory,
    plan: &'a mut ActivePlan,
}

fn run_step(ctx: &mut StepContext, actor: Actor, step: ActionDescriptor, partner: Option<(AgentKey, &str, &mut AgentState)>) {
    let (partner_id, partner) = match partner {
        Some((key, id, state)) => (Some(id.to_string()), Some((key, state))),
        None => (None, None),
    };
    let mut executor = HostExecutor {
        map: &mut *ctx.map,
        position: actor.territory.position(),
        speeds: *actor.state.speed_multipliers(),
        arrived: None,
        partner,
    };

    match execute(actor.state, &step, &mut executor, ctx.now) {
        Ok(time) => {
            if let Some(cell) = executor.arrived {
                actor.territory.move_to(cell);
            }
            actor.plan.busy_until = ctx.now + time;
            ctx.stats.actions_executed += 1;
            ctx.logger.record(
                ctx.timestamp.clone(),
                &actor.id.0,
                &actor.name.0,
                EventKind::ActionExecuted {
                    action: step.kind().to_string(),
                    description: describe_action(&step, ctx.catalogue),
                    time,
                },
            );
            if let Action::Trade {
                give,
                give_item,
                take,
                take_item,
                ..
            } = &step.action
            {
                ctx.stats.trades += 1;
                ctx.logger.record(
                    ctx.timestamp.clone(),
                    &actor.id.0,
                    &actor.name.0,
                    EventKind::TradeCompleted {
                        partner_id: partner_id.unwrap_or_default(),
                        gave: quantity(ctx.catalogue, give.amount, *give_item),
                        received: quantity(ctx.catalogue, take.amount, *take_item),
                    },
                );
            }
        }
        Err(error) => {
            let dropped = actor.plan.abort();
            ctx.stats.plans_aborted += 1;
            tracing::debug!(agent = %actor.id.0, %error, dropped, "plan aborted");
            ctx.logger.record(
                ctx.timestamp.clone(),
                &actor.id.0,
                &actor.name.0,
                EventKind::PlanAborted {
                    reason: error.to_string(),
                },
            );
        }
    }
}

fn quantity(catalogue: &Catalogue, amount: f32, item: ItemId) -> String {
    let label = catalogue.get_item(item).map_or("?", |i| i.label.as_str());
    format!("{} {}", amount, label)
}

/// System: Execute due plan steps against live states
#[allow(clippy::type_complexity)]
pub fn execute_plans(
    clock: Res<Clock>,
    catalogue: Res<SharedCatalogue>,
    mut map: ResMut<WorldMap>,
    mut logger: ResMut<EventLogger>,
    mut stats: ResMut<RunStats>,
    handles: Query<(Entity, &AgentHandle)>,
    mut agents: Query<(Entity, &AgentId, &AgentName, &mut Economy, &mut Territory, &mut ActivePlan)>,
) {
    let now = clock.0.now();
    let keys: HashMap<AgentKey, Entity> = handles.iter().map(|(e, h)| (h.0, e)).collect();
    let ready: Vec<Entity> = agents
        .iter()
        .filter(|(_, _, _, economy, _, plan)| {
            !economy.0.is_terminal() && !plan.steps.is_empty() && plan.is_idle(now)
        })
        .map(|(entity, ..)| entity)
        .collect();

    let mut ctx = StepContext {
        now,
        timestamp: clock.0.timestamp(),
        map: &mut map.0,
        catalogue: &catalogue.0,
        logger: &mut *logger,
        stats: &mut *stats,
    };

    for entity in ready {
        loop {
            let step = match agents.get_mut(entity) {
                Ok((.., mut plan)) if plan.is_idle(now) => plan.steps.pop_front(),
                _ => None,
            };
            let Some(step) = step else {
                break;
            };
            let partner = match &step.action {
                Action::Trade { partner, .. } => keys.get(partner).copied().filter(|p| *p != entity),
                _ => None,
            };

            match partner {
                Some(partner_entity) => {
                    let Ok([actor, other]) = agents.get_many_mut([entity, partner_entity]) else {
                        break;
                    };
                    let (_, id, name, mut economy, mut territory, mut plan) = actor;
                    let (_, other_id, _, mut other_economy, _, _) = other;
                    let partner_key = step_partner(&step);
                    run_step(
                        &mut ctx,
                        Actor {
                            id,
                            name,
                            state: &mut economy.0,
                            territory: &mut territory,
                            plan: &mut plan,
                        },
                        step,
                        partner_key.map(|key| (key, other_id.0.as_str(), &mut other_economy.0)),
                    );
                }
                None => {
                    let Ok((_, id, name, mut economy, mut territory, mut plan)) = agents.get_mut(entity) else {
                        break;
                    };
                    run_step(
                        &mut ctx,
                        Actor {
                            id,
                            name,
                            state: &mut economy.0,
                            territory: &mut territory,
                            plan: &mut plan,
                        },
                        step,
                        None,
                    );
                }
            }
        }
    }
}

fn step_partner(step: &ActionDescriptor) -> Option<AgentKey> {
    match &step.action {
        Action::Trade { partner, .. } => Some(*partner),
        _ => None,
    }
}
