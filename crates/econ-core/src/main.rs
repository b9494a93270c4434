//! Hex Economy Simulation
//!
//! Runs settlements and travellers on a generated hex map: every tick they
//! age, produce, plan and trade, and everything that happens is written to
//! a JSONL event log.

use clap::Parser;
use econ_events::RunManifest;
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use econ_core::catalogue::{Catalogue, DEFAULT_CATALOGUE_PATH};
use econ_core::components::{Clock, RunStats};
use econ_core::config::{EngineConfig, DEFAULT_TUNING_PATH};
use econ_core::events::EventLogger;
use econ_core::output::{take_snapshot, write_snapshot, SnapshotGenerator};
use econ_core::planner::PlannerKind;
use econ_core::setup::{init_world, spawn_initial_agents};
use econ_core::systems::build_schedule;
use econ_core::SimRng;

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "econ_sim")]
#[command(about = "An agent-based economy on a hex map")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate (defaults to simulation.default_ticks)
    #[arg(long)]
    ticks: Option<u64>,

    /// Simulated time per tick (defaults to simulation.tick_delta)
    #[arg(long)]
    tick_delta: Option<f32>,

    /// Planner used by every agent: greedy or mcts
    #[arg(long, default_value_t = PlannerKind::Greedy)]
    planner: PlannerKind,

    /// Tuning file
    #[arg(long, default_value = DEFAULT_TUNING_PATH)]
    config: PathBuf,

    /// Item and recipe definitions
    #[arg(long, default_value = DEFAULT_CATALOGUE_PATH)]
    catalogue: PathBuf,

    /// JSONL event log
    #[arg(long, default_value = "output/events.jsonl")]
    events: PathBuf,

    /// Directory for world snapshots; none are written when omitted
    #[arg(long)]
    snapshots: Option<PathBuf>,

    #[arg(long, default_value_t = 6)]
    settlements: u32,

    #[arg(long, default_value_t = 4)]
    travellers: u32,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut config = EngineConfig::load_or_default(&args.config);
    if let Some(tick_delta) = args.tick_delta {
        config.simulation.tick_delta = tick_delta;
    }
    let ticks = args.ticks.unwrap_or(config.simulation.default_ticks);
    let snapshot_interval = config.simulation.snapshot_interval;

    println!("Hex Economy Simulation");
    println!("======================");
    println!("Seed: {}", args.seed);
    println!("Ticks: {}", ticks);
    println!("Tick delta: {}", config.simulation.tick_delta);
    println!("Planner: {}", args.planner);
    println!();

    println!("Loading catalogue...");
    let catalogue = Catalogue::load(&args.catalogue, config.simulation.season_duration)?;
    println!(
        "  {} items, {} recipes",
        catalogue.items().len(),
        catalogue.recipes().len()
    );
    let catalogue = Arc::new(catalogue);

    if let Some(parent) = args.events.parent() {
        fs::create_dir_all(parent)?;
    }
    let logger = EventLogger::new(&args.events)?;

    let mut manifest = RunManifest::new(args.seed, args.planner.to_string(), ticks, config.simulation.tick_delta);
    manifest.catalogue = Some(args.catalogue.display().to_string());
    tracing::info!(run_id = %manifest.run_id, "run started");

    println!("Creating world map...");
    let mut world = init_world(config, catalogue, args.planner, args.seed, logger);

    println!("Spawning agents...");
    {
        // Take the RNG out to avoid borrow conflicts
        let Some(mut sim_rng) = world.remove_resource::<SimRng>() else {
            return Err("world has no random number generator".into());
        };
        spawn_initial_agents(&mut world, &mut sim_rng.0, args.settlements, args.travellers);
        world.insert_resource(sim_rng);
    }
    let summary = econ_core::setup::spawn_summary(&mut world);
    println!("  Spawned {} agents", summary.total_agents);
    for (mobility, count) in &summary.by_mobility {
        println!("    {}: {}", mobility, count);
    }

    let mut snapshots = SnapshotGenerator::new(args.snapshots.clone(), snapshot_interval);
    if let Some(dir) = snapshots.directory() {
        fs::create_dir_all(dir)?;
        let manifest_path = dir.join("manifest.json");
        fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
    }

    let mut schedule = build_schedule();

    println!();
    println!("Starting simulation...");
    println!();

    for tick in 1..=ticks {
        schedule.run(&mut world);

        if snapshots.should_snapshot(tick) {
            if let Err(e) = take_snapshot(&mut world, &mut snapshots) {
                eprintln!("Warning: Could not write snapshot at tick {}: {}", tick, e);
            }
        }

        if tick % 100 == 0 {
            let date = world.resource::<Clock>().0.date();
            let stats = world.resource::<RunStats>();
            println!(
                "Tick {} / {} ({}) - {} actions, {} trades, {} perished",
                tick, ticks, date, stats.actions_executed, stats.trades, stats.perished
            );
        }
    }

    let final_snapshot = take_snapshot(&mut world, &mut snapshots)?;
    if let Some(dir) = snapshots.directory() {
        write_snapshot(&final_snapshot, dir.join("final.json"))?;
    }
    world.resource_mut::<EventLogger>().flush()?;

    let stats = world.resource::<RunStats>().clone();
    let events = world.resource::<EventLogger>().event_count();
    println!();
    println!(
        "Simulation complete. Ran {} ticks (ending on {}).",
        ticks,
        world.resource::<Clock>().0.date()
    );
    println!("  Agents alive: {}", final_snapshot.agents.len());
    println!("  Total population: {:.1}", final_snapshot.total_population());
    println!("  Plans: {} ({} aborted)", stats.plans, stats.plans_aborted);
    println!("  Actions executed: {}", stats.actions_executed);
    println!("  Productions completed: {}", stats.productions_completed);
    println!("  Trades: {}", stats.trades);
    println!("  Settlements merged: {}", stats.merges);
    println!("  Agents perished: {}", stats.perished);
    println!("  Events logged: {} ({})", events, args.events.display());
    println!("  Snapshots: {}", snapshots.snapshot_count());
    tracing::info!(run_id = %manifest.run_id, "run finished");

    Ok(())
}
