//! Behaviour-driven tests for release configuration loading.

use camino::Utf8PathBuf;
use relpipe::config::ReleaseConfig;
use relpipe::error::ReleaseError;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::fs;
use tempfile::TempDir;

#[derive(Default)]
struct ConfigWorld {
    temp_dir: Option<TempDir>,
    source: Option<String>,
    result: Option<Result<ReleaseConfig, ReleaseError>>,
}

#[fixture]
fn world() -> ConfigWorld {
    ConfigWorld {
        temp_dir: Some(TempDir::new().expect("temp dir")),
        ..ConfigWorld::default()
    }
}

fn loaded(world: &ConfigWorld) -> &ReleaseConfig {
    match world.result.as_ref().expect("configuration loaded") {
        Ok(config) => config,
        Err(err) => panic!("configuration failed to load: {err}"),
    }
}

#[given("no configuration file")]
fn given_no_file(world: &mut ConfigWorld) {
    world.source = None;
}

#[given("a configuration file setting the project to \"{project}\"")]
fn given_project(world: &mut ConfigWorld, project: String) {
    world.source = Some(format!("project = \"{project}\"\n"));
}

#[given("the configuration requires \"{path}\"")]
fn given_required(world: &mut ConfigWorld, path: String) {
    let source = world.source.get_or_insert_with(String::new);
    source.push_str(&format!("required_paths = [\"{path}\"]\n"));
}

#[given("a configuration file containing \"{line}\"")]
fn given_line(world: &mut ConfigWorld, line: String) {
    world.source = Some(format!("{line}\n"));
}

#[when("the configuration is loaded")]
fn when_loaded(world: &mut ConfigWorld) {
    let dir = world.temp_dir.as_ref().expect("temp_dir set").path();
    let path = Utf8PathBuf::from_path_buf(dir.join("relpipe.toml")).expect("UTF-8 temp path");
    let result = match &world.source {
        Some(source) => {
            fs::write(&path, source).expect("write config");
            ReleaseConfig::discover(Some(&path))
        }
        None => Ok(ReleaseConfig::default()),
    };
    world.result = Some(result);
}

#[then("the project is \"{project}\"")]
fn then_project(world: &mut ConfigWorld, project: String) {
    assert_eq!(loaded(world).project, project);
}

#[then("no network timeout is set")]
fn then_no_timeout(world: &mut ConfigWorld) {
    assert!(loaded(world).network_timeout().is_none());
}

#[then("the required paths include \"{path}\"")]
fn then_required(world: &mut ConfigWorld, path: String) {
    assert!(loaded(world).required_paths.contains(&path));
}

#[then("loading fails mentioning \"{snippet}\"")]
fn then_fails(world: &mut ConfigWorld, snippet: String) {
    match world.result.as_ref().expect("configuration loaded") {
        Err(err @ ReleaseError::Config { .. }) => {
            assert!(err.to_string().contains(&snippet), "{err}");
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[scenario(
    path = "tests/features/config_loading.feature",
    name = "An absent file yields the defaults"
)]
fn scenario_defaults(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/config_loading.feature",
    name = "A file overrides project and required paths"
)]
fn scenario_overrides(world: ConfigWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/config_loading.feature",
    name = "Unknown keys are rejected"
)]
fn scenario_unknown_keys(world: ConfigWorld) {
    let _ = world;
}
