//! Needs
//!
//! A need is a bounded scalar in [0, 100] that depletes over simulated time
//! and is topped up by consuming or holding items. The first three kinds are
//! vital: if any of them reaches zero the agent's health collapses.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::NeedsConfig;
use crate::random::gaussian;

/// Needs below this value put the agent in danger.
pub const DANGER_THRESHOLD: f32 = 67.0;

pub const NEED_MIN: f32 = 0.0;
pub const NEED_MAX: f32 = 100.0;

/// Kinds of need, vital ones first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedKind {
    Hunger,
    Thirst,
    Warmth,
    Greed,
    Social,
    Comfort,
}

impl NeedKind {
    pub const COUNT: usize = 6;
    /// Number of leading vital kinds.
    pub const VITAL_COUNT: usize = 3;

    pub const ALL: [NeedKind; NeedKind::COUNT] = [
        NeedKind::Hunger,
        NeedKind::Thirst,
        NeedKind::Warmth,
        NeedKind::Greed,
        NeedKind::Social,
        NeedKind::Comfort,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_vital(self) -> bool {
        self.index() < Self::VITAL_COUNT
    }

    pub fn label(self) -> &'static str {
        match self {
            NeedKind::Hunger => "hunger",
            NeedKind::Thirst => "thirst",
            NeedKind::Warmth => "warmth",
            NeedKind::Greed => "greed",
            NeedKind::Social => "social",
            NeedKind::Comfort => "comfort",
        }
    }
}

impl fmt::Display for NeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single need.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Need {
    value: f32,
    /// Depletion per unit of simulated time
    pub depletion_rate: f32,
    pub happiness_weight: f32,
}

impl Default for Need {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl Need {
    /// A full need with an explicit per-time-unit depletion rate.
    pub fn new(depletion_rate: f32, happiness_weight: f32) -> Self {
        Self {
            value: NEED_MAX,
            depletion_rate: depletion_rate.max(0.0),
            happiness_weight,
        }
    }

    /// A full need whose rate is given per season and clamped to the
    /// configured bounds before conversion.
    pub fn seasonal(
        per_season: f32,
        happiness_weight: f32,
        season_duration: f32,
        config: &NeedsConfig,
    ) -> Self {
        let clamped = per_season.clamp(config.depletion_min, config.depletion_max);
        Self::new(clamped / season_duration.max(f32::EPSILON), happiness_weight)
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Depletes over `delta_time`, never below `passive_floor`.
    pub fn deplete(&mut self, delta_time: f32, passive_floor: f32) {
        self.set((self.value - self.depletion_rate * delta_time).max(passive_floor));
    }

    pub fn add(&mut self, amount: f32) {
        self.set(self.value + amount);
    }

    pub fn set(&mut self, value: f32) {
        self.value = if value.is_nan() {
            NEED_MIN
        } else {
            value.clamp(NEED_MIN, NEED_MAX)
        };
    }
}

/// Rolls a fresh set of needs, optionally inheriting from a founder.
///
/// Happiness weights are assigned from the last need to the first, each
/// drawn around the share of the total still unassigned. Vital needs all
/// deplete at the base rate; non-vital rates are randomized.
pub fn generate_needs<R: Rng + ?Sized>(
    rng: &mut R,
    config: &NeedsConfig,
    season_duration: f32,
    founder: Option<&[Need; NeedKind::COUNT]>,
) -> [Need; NeedKind::COUNT] {
    let mut needs = [Need::default(); NeedKind::COUNT];
    let total = NeedKind::COUNT as f32;
    let mut assigned = 0.0;

    for kind in NeedKind::ALL.iter().rev() {
        let i = kind.index();
        let target = (total - assigned) / (i as f32 + 1.0);
        let weight_mean = match founder {
            Some(f) => {
                let inherited = f[i].happiness_weight;
                inherited + (target - inherited) * config.happiness_width
            }
            None => target,
        };
        let mut weight = gaussian(rng, weight_mean, config.happiness_width);

        let per_season = if kind.is_vital() {
            weight = weight.clamp(config.vital_weight_min, config.vital_weight_max);
            config.depletion_base
        } else {
            let width = match founder {
                Some(f) => {
                    let founder_per_season = f[i].depletion_rate * season_duration;
                    config.depletion_width * (founder_per_season / config.depletion_base)
                }
                None => config.depletion_width,
            };
            gaussian(rng, config.depletion_base, width)
        };

        needs[i] = Need::seasonal(per_season, weight, season_duration, config);
        assigned += weight;
    }

    needs
}
