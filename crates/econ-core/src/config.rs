//! Configuration System
//!
//! Loads tuning parameters from tuning.toml for easy adjustment without
//! recompiling. Every section falls back to its defaults when absent.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default tuning file path
pub const DEFAULT_TUNING_PATH: &str = "tuning.toml";

/// Top-level configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub population: PopulationConfig,
    #[serde(default)]
    pub needs: NeedsConfig,
    #[serde(default)]
    pub chooser: ChooserConfig,
    #[serde(default)]
    pub greedy: GreedyConfig,
    #[serde(default)]
    pub mcts: MctsConfig,
    #[serde(default)]
    pub genetic: GeneticConfig,
}

/// Host loop parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Simulated time units per season
    pub season_duration: f32,
    /// Simulated time advanced by one host tick
    pub tick_delta: f32,
    pub default_ticks: u64,
    /// Ticks between world snapshots (0 disables)
    pub snapshot_interval: u64,
    pub map_width: u32,
    pub map_height: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            season_duration: 60.0,
            tick_delta: 1.0,
            default_ticks: 600,
            snapshot_interval: 60,
            map_width: 24,
            map_height: 16,
        }
    }
}

/// Population, carrying and storage parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    /// Kilograms each person can carry
    pub carrying_per_person: f32,
    /// Kilograms each person weighs
    pub body_weight: f32,
    /// Goods may be collected up to this multiple of carrying capacity
    pub max_carrying_multiplier: f32,
    /// Growth per season at full health
    pub growth_rate_per_season: f32,
    pub settlement_start: f32,
    pub traveller_start: f32,
    /// Infrastructure mass a new settlement can hold
    pub settlement_space: f32,
    /// Collected units merge into stacks no more than this much worse
    pub condition_band_lower: f32,
    /// Collected units merge into stacks no more than this much better
    pub condition_band_upper: f32,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            carrying_per_person: 40.0,
            body_weight: 70.0,
            max_carrying_multiplier: 2.0,
            growth_rate_per_season: 0.25,
            settlement_start: 50.0,
            traveller_start: 1.0,
            settlement_space: 5000.0,
            condition_band_lower: 3.0,
            condition_band_upper: 10.0,
        }
    }
}

/// Need generation parameters (rates are per season)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsConfig {
    pub depletion_base: f32,
    pub depletion_width: f32,
    pub depletion_min: f32,
    pub depletion_max: f32,
    pub happiness_width: f32,
    pub vital_weight_min: f32,
    pub vital_weight_max: f32,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            depletion_base: 100.0,
            depletion_width: 6.67,
            depletion_min: 33.0,
            depletion_max: 300.0,
            happiness_width: 0.133,
            vital_weight_min: 0.5,
            vital_weight_max: 5.0,
        }
    }
}

/// Single-step action policy parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChooserConfig {
    pub consume_weight: f32,
    pub produce_weight: f32,
    pub trade_weight: f32,
    pub relinquish_weight: f32,
    pub travel_weight: f32,
    /// Random stack picks per held item kind before falling back to a scan
    pub pick_tries_factor: f32,
    /// Random ingredient picks per candidate stack
    pub ingredient_tries_factor: f32,
    pub travel_hops: u32,
    /// Random walks tried before travel is declared infeasible
    pub travel_retries: u32,
}

impl Default for ChooserConfig {
    fn default() -> Self {
        Self {
            consume_weight: 2.0,
            produce_weight: 3.5,
            trade_weight: 2.5,
            relinquish_weight: 0.35,
            travel_weight: 0.5,
            pick_tries_factor: 2.5,
            ingredient_tries_factor: 5.0,
            travel_hops: 5,
            travel_retries: 16,
        }
    }
}

/// Greedy rollout planner parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GreedyConfig {
    pub rollouts: u32,
    pub steps: u32,
    /// Infeasible draws tolerated per step before the rollout ends
    pub max_rerolls: u32,
    pub fitness_horizon: f32,
    pub dead_fitness: f32,
}

impl Default for GreedyConfig {
    fn default() -> Self {
        Self {
            rollouts: 250,
            steps: 7,
            max_rerolls: 32,
            fitness_horizon: 15.0,
            dead_fitness: -1000.0,
        }
    }
}

/// Monte Carlo tree search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    pub iterations: u32,
    pub max_depth: u32,
    pub max_branching: usize,
    pub exploration: f32,
    /// Chance of descending to the best child before a node is fully expanded
    pub exploit_probability: f32,
    /// Draws tried when expanding before a node is marked saturated
    pub expansion_attempts: u32,
    pub max_rerolls: u32,
    pub fitness_horizon: f32,
    pub dead_fitness: f32,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            iterations: 250,
            max_depth: 15,
            max_branching: 6,
            exploration: std::f32::consts::FRAC_1_SQRT_2,
            exploit_probability: 0.05,
            expansion_attempts: 32,
            max_rerolls: 32,
            fitness_horizon: 30.0,
            dead_fitness: -400.0,
        }
    }
}

/// Genetic algorithm parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    pub population_size: usize,
    pub elite: usize,
    pub mutation_rate: f32,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            elite: 5,
            mutation_rate: 0.01,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_str(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the given path, or use defaults if it can't be read
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Could not load {}: {}. Using defaults.", path.display(), e);
            Self::default()
        })
    }

    /// Returns the configuration as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.season_duration <= 0.0 {
            return Err(ConfigError::Invalid("simulation.season_duration must be positive"));
        }
        if self.simulation.tick_delta < 0.0 {
            return Err(ConfigError::Invalid("simulation.tick_delta must not be negative"));
        }
        if self.mcts.max_depth == 0 {
            return Err(ConfigError::Invalid("mcts.max_depth must be at least 1"));
        }
        if self.genetic.elite > self.genetic.population_size {
            return Err(ConfigError::Invalid("genetic.elite exceeds genetic.population_size"));
        }
        Ok(())
    }
}

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}
