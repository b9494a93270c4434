//! Simulation Clock
//!
//! Continuous simulated time plus the human-readable calendar derived from it.
//! The host owns one `SimulationClock` and threads it (or its `now()` value)
//! through every call that needs elapsed time.
//!
//! # Example
//!
//! ```
//! use econ_events::{Season, SimulationClock};
//!
//! let mut clock = SimulationClock::new(60.0);
//! clock.advance(75.0);
//! assert_eq!(clock.date().season, Season::Summer);
//! assert_eq!(clock.date().to_string(), "year_1.summer.day_8");
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of days in each season.
pub const DAYS_PER_SEASON: u8 = 30;

/// Default length of one season in simulated time units.
pub const DEFAULT_SEASON_DURATION: f32 = 60.0;

/// Season of the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
}

impl Season {
    /// Season for a zero-based season index within a year.
    pub fn from_index(index: u64) -> Self {
        match index % 4 {
            0 => Season::Spring,
            1 => Season::Summer,
            2 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    /// Returns the next season in order.
    pub fn next(self) -> Self {
        match self {
            Season::Spring => Season::Summer,
            Season::Summer => Season::Autumn,
            Season::Autumn => Season::Winter,
            Season::Winter => Season::Spring,
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Season::Spring => write!(f, "spring"),
            Season::Summer => write!(f, "summer"),
            Season::Autumn => write!(f, "autumn"),
            Season::Winter => write!(f, "winter"),
        }
    }
}

impl FromStr for Season {
    type Err = ParseDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" => Ok(Season::Autumn),
            "winter" => Ok(Season::Winter),
            _ => Err(ParseDateError::InvalidSeason(s.to_string())),
        }
    }
}

/// Human-readable simulation date.
///
/// Serializes to strings like "year_3.winter.day_12".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimDate {
    pub year: u32,
    pub season: Season,
    pub day: u8,
}

impl SimDate {
    pub fn new(year: u32, season: Season, day: u8) -> Self {
        Self { year, season, day }
    }

    /// The date at elapsed time zero.
    pub fn start() -> Self {
        Self::new(1, Season::Spring, 1)
    }
}

impl fmt::Display for SimDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "year_{}.{}.day_{}", self.year, self.season, self.day)
    }
}

/// Error type for parsing SimDate from strings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseDateError {
    #[error("invalid date format: '{0}', expected 'year_N.season.day_M'")]
    InvalidFormat(String),
    #[error("invalid year: '{0}'")]
    InvalidYear(String),
    #[error("invalid season: '{0}'")]
    InvalidSeason(String),
    #[error("invalid day: '{0}'")]
    InvalidDay(String),
}

impl FromStr for SimDate {
    type Err = ParseDateError;

    /// Parses a SimDate from a string like "year_3.winter.day_12".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('.');
        let (Some(year_part), Some(season_part), Some(day_part), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(ParseDateError::InvalidFormat(s.to_string()));
        };

        let year = year_part
            .strip_prefix("year_")
            .ok_or_else(|| ParseDateError::InvalidFormat(s.to_string()))?
            .parse::<u32>()
            .map_err(|_| ParseDateError::InvalidYear(year_part.to_string()))?;

        let season = season_part.parse::<Season>()?;

        let day = day_part
            .strip_prefix("day_")
            .ok_or_else(|| ParseDateError::InvalidFormat(s.to_string()))?
            .parse::<u8>()
            .map_err(|_| ParseDateError::InvalidDay(day_part.to_string()))?;

        Ok(SimDate { year, season, day })
    }
}

impl Serialize for SimDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SimDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Host-owned simulated time.
///
/// `elapsed` is continuous; `tick` counts host update passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationClock {
    /// Total simulated time since the start of the run.
    pub elapsed: f32,
    /// Number of host update passes so far.
    pub tick: u64,
    /// Length of one season in simulated time units.
    pub season_duration: f32,
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(DEFAULT_SEASON_DURATION)
    }
}

impl SimulationClock {
    pub fn new(season_duration: f32) -> Self {
        Self {
            elapsed: 0.0,
            tick: 0,
            season_duration: season_duration.max(f32::EPSILON),
        }
    }

    /// Current simulated time.
    pub fn now(&self) -> f32 {
        self.elapsed
    }

    /// Advances time by one host pass of `delta_time`.
    pub fn advance(&mut self, delta_time: f32) {
        self.elapsed += delta_time.max(0.0);
        self.tick += 1;
    }

    /// Whole seasons elapsed since the start.
    pub fn seasons_elapsed(&self) -> u64 {
        (self.elapsed / self.season_duration).floor() as u64
    }

    /// Converts a duration given in seasons to simulated time.
    pub fn seasons_to_time(&self, seasons: f32) -> f32 {
        seasons * self.season_duration
    }

    /// Calendar date for the current elapsed time.
    pub fn date(&self) -> SimDate {
        let seasons = self.seasons_elapsed();
        let into_season = self.elapsed - seasons as f32 * self.season_duration;
        let day_length = self.season_duration / DAYS_PER_SEASON as f32;
        let day = ((into_season / day_length).floor() as u8).min(DAYS_PER_SEASON - 1) + 1;
        SimDate {
            year: (seasons / 4) as u32 + 1,
            season: Season::from_index(seasons),
            day,
        }
    }

    /// Timestamp for event records.
    pub fn timestamp(&self) -> SimTimestamp {
        SimTimestamp {
            tick: self.tick,
            time: self.elapsed,
            date: self.date(),
        }
    }
}

/// A point in simulation time, as recorded on events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimTimestamp {
    /// Host update pass counter.
    pub tick: u64,
    /// Continuous simulated time.
    pub time: f32,
    /// Human-readable date.
    pub date: SimDate,
}

impl SimTimestamp {
    pub fn start() -> Self {
        Self {
            tick: 0,
            time: 0.0,
            date: SimDate::start(),
        }
    }
}
