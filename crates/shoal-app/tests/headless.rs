use std::env;
use std::fs;
use std::process::Command;

use shoal_app::{HeadlessOptions, load_config, run_headless};
use shoal_core::ShoalConfig;

fn quick_config() -> ShoalConfig {
    let mut config = ShoalConfig::default();
    config.pool.capacity = 12;
    config.pool.batch_size = 4;
    config.pool.batch_delay = 0.5;
    config.pool.respawn_delay = 1.0;
    config.interaction.catch_timeout = 1.0;
    config.rng_seed = Some(99);
    config
}

#[test]
fn scripted_run_catches_and_respawns() {
    let options = HeadlessOptions {
        ticks: 600,
        dt: 1.0 / 60.0,
        grab_every: 1.0,
        hold_for: 1.5,
        ..HeadlessOptions::default()
    };
    let report = run_headless(quick_config(), &options).expect("run");
    assert_eq!(report.frames.len(), 600);
    assert_eq!(report.summary.ticks_simulated, 600);
    assert!(report.summary.total_caught > 0);
    assert!(report.summary.peak_active <= report.capacity);
    assert!(report.summary.total_spawned > report.summary.peak_active);
    for frame in &report.frames {
        assert!(frame.active <= report.capacity);
    }
}

#[test]
fn config_files_fill_missing_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shoal.json");
    fs::write(&path, r#"{ "pool": { "capacity": 8 }, "rng_seed": 1 }"#).expect("write");
    let config = load_config(Some(&path)).expect("load");
    assert_eq!(config.pool.capacity, 8);
    assert_eq!(config.interaction, ShoalConfig::default().interaction);

    fs::write(&path, "{ not json").expect("write");
    assert!(load_config(Some(&path)).is_err());
    assert_eq!(load_config(None).expect("defaults"), ShoalConfig::default());
}

#[test]
fn report_is_written_as_json() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("report.json");
    let options = HeadlessOptions {
        ticks: 30,
        spawn_all: true,
        ..HeadlessOptions::default()
    };
    let report = run_headless(quick_config(), &options).expect("run");
    report.write_json(&path).expect("write");
    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("json");
    assert_eq!(value["summary"]["frame_count"], 30);
    assert_eq!(value["capacity"], 12);
    assert_eq!(value["initial"]["active"], 12);
}

#[test]
fn binary_runs_headless() {
    let dir = tempfile::tempdir().expect("tempdir");
    let report = dir.path().join("report.json");
    let bin = env!("CARGO_BIN_EXE_shoal");
    let status = Command::new(bin)
        .args(["--ticks", "60", "--seed", "7", "--report"])
        .arg(&report)
        .env("RUST_LOG", "off")
        .status()
        .expect("failed to run shoal binary");
    assert!(status.success(), "headless run failed");
    assert!(report.exists());
}
