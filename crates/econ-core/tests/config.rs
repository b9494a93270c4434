//! Configuration and catalogue loading from disk.

use econ_core::catalogue::{Catalogue, CatalogueError, VehicleKind};
use econ_core::config::{ConfigError, EngineConfig};
use std::fs;

const CATALOGUE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../data/catalogue.toml");
const TUNING: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../tuning.toml");

#[test]
fn test_bundled_tuning_matches_defaults() {
    let config = EngineConfig::load(TUNING).unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tuning.toml");

    let mut config = EngineConfig::default();
    config.greedy.rollouts = 40;
    config.mcts.max_depth = 9;
    config.simulation.tick_delta = 0.5;
    fs::write(&path, config.to_toml().unwrap()).unwrap();

    let loaded = EngineConfig::load(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = EngineConfig::load_or_default(dir.path().join("absent.toml"));
    assert_eq!(config, EngineConfig::default());
    assert!(matches!(
        EngineConfig::load(dir.path().join("absent.toml")),
        Err(ConfigError::Io(_))
    ));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[mcts]\nmax_depth = 0\n").unwrap();
    assert!(matches!(EngineConfig::load(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_bundled_catalogue_loads() {
    let catalogue = Catalogue::load(CATALOGUE, 60.0).unwrap();

    let gather = catalogue.recipe(catalogue.recipe_id("gather food").unwrap());
    assert!(gather.is_harvest);
    assert!(gather.suitable_for_traveller);
    assert!((gather.time_cost - 0.03 * 60.0).abs() < 1e-4);

    let build = catalogue.recipe(catalogue.recipe_id("build hut").unwrap());
    assert!(!build.suitable_for_traveller);

    let horse = catalogue.item(catalogue.item_id("horse").unwrap());
    assert_eq!(horse.vehicles().len(), 1);
    assert_eq!(horse.vehicles()[0].kind, VehicleKind::Land);

    let water = catalogue.item(catalogue.item_id("water").unwrap());
    assert!(water.is_consumable());
    assert!(catalogue.resources().count() >= 5);
}

#[test]
fn test_missing_catalogue_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Catalogue::load(dir.path().join("none.toml"), 60.0).unwrap_err();
    assert!(matches!(err, CatalogueError::Io(_)));
}
