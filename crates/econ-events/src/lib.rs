//! Shared event types and serialization for the economy simulation.
//!
//! This crate contains pure data structures with no simulation logic.

pub mod clock;
pub mod event;
pub mod snapshot;

pub use clock::{
    ParseDateError, Season, SimDate, SimTimestamp, SimulationClock, DAYS_PER_SEASON,
    DEFAULT_SEASON_DURATION,
};

pub use event::{generate_event_id, Event, EventKind};

pub use snapshot::{generate_snapshot_id, AgentSnapshot, RunManifest, WorldSnapshot};
