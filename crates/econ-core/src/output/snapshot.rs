//! Snapshot Output
//!
//! Periodic JSON dumps of every living agent.

use bevy_ecs::prelude::*;
use econ_events::WorldSnapshot;
use std::fs;
use std::path::{Path, PathBuf};

use crate::components::{snapshot_agent, AgentId, AgentName, Clock, Economy, Territory};

/// Decides when to snapshot and where the files go
#[derive(Resource, Debug, Clone)]
pub struct SnapshotGenerator {
    directory: Option<PathBuf>,
    interval: u64,
    next_sequence: u64,
}

impl SnapshotGenerator {
    /// `directory` of `None` keeps snapshots in memory only; an interval of
    /// zero disables periodic snapshots.
    pub fn new(directory: Option<PathBuf>, interval: u64) -> Self {
        Self {
            directory,
            interval,
            next_sequence: 1,
        }
    }

    pub fn should_snapshot(&self, tick: u64) -> bool {
        self.interval > 0 && tick > 0 && tick % self.interval == 0
    }

    pub fn snapshot_count(&self) -> u64 {
        self.next_sequence - 1
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    fn next_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }
}

/// All living agents, ordered by id.
pub fn generate_snapshot(world: &mut World, sequence: u64) -> WorldSnapshot {
    let timestamp = world.resource::<Clock>().0.timestamp();
    let mut query = world.query::<(&AgentId, &AgentName, &Economy, &Territory)>();
    let mut agents: Vec<_> = query
        .iter(world)
        .filter(|(_, _, economy, _)| !economy.0.is_terminal())
        .map(|(id, name, economy, territory)| snapshot_agent(id, name, &economy.0, territory))
        .collect();
    agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
    WorldSnapshot::new(sequence, timestamp, agents)
}

/// Takes the next snapshot and writes it if the generator has a directory.
pub fn take_snapshot(world: &mut World, generator: &mut SnapshotGenerator) -> std::io::Result<WorldSnapshot> {
    let snapshot = generate_snapshot(world, generator.next_sequence());
    if let Some(dir) = generator.directory() {
        write_snapshot(&snapshot, dir.join(format!("{}.json", snapshot.snapshot_id)))?;
    }
    Ok(snapshot)
}

/// Write snapshot to file
pub fn write_snapshot(snapshot: &WorldSnapshot, path: impl AsRef<Path>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    fs::write(path, json)?;
    Ok(())
}
