//! Hex Economy Simulation Library
//!
//! Agents on a hex map hold stacks of items, follow recipes, trade and
//! plan ahead against a value model of their own needs. The planning core
//! (state, recipes, planners) knows nothing of the ECS; the host in
//! `components`, `setup` and `systems` drives it tick by tick.

use bevy_ecs::prelude::*;
use rand::rngs::SmallRng;

pub mod catalogue;
pub mod chooser;
pub mod components;
pub mod config;
pub mod events;
pub mod execute;
pub mod genetic;
pub mod need;
pub mod output;
pub mod planner;
pub mod random;
pub mod recipe;
pub mod setup;
pub mod stack;
pub mod state;
pub mod systems;
pub mod terrain;
pub mod valuation;

pub use catalogue::{Catalogue, CatalogueBuilder, ItemId, RecipeId};
pub use chooser::{Action, ActionDescriptor};
pub use config::{EngineConfig, DEFAULT_TUNING_PATH};
pub use execute::{execute, ActionExecutor, ExecutionError};
pub use planner::{build_planner, Plan, Planner, PlannerKind};
pub use state::{AgentState, Mobility, StateEvent};
pub use terrain::{CellId, EnvironmentContext, HexMap, Terrain};

/// Seeded random number generator resource
#[derive(Resource)]
pub struct SimRng(pub SmallRng);
