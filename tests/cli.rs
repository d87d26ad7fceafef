mod common;

use common::{directory_records, stdout_json, Fixture};
use serde_json::json;

#[test]
fn list_builds_inventory_from_snapshot() {
    let fixture = Fixture::new();
    fixture.write_snapshot(&directory_records());

    let output = fixture.run_snapshot(&["--list"]);
    assert_eq!(
        stdout_json(&output),
        json!({
            "g1": {"hosts": ["h1", "h2"]},
            "ungrouped": {"hosts": ["h3"]},
            "all": {"vars": {"ntp": "pool.ntp.org"}},
            "_meta": {"hostvars": {
                "h1": {"id": 1},
                "h2": {"id": 2},
                "h3": {"id": 3}
            }}
        })
    );
    assert!(!fixture.cache_file().exists(), "snapshot builds skip the cache");
}

#[test]
fn list_prints_fresh_cache_without_directory() {
    let fixture = Fixture::new();
    let cached = json!({
        "web": {"hosts": ["w1"]},
        "_meta": {"hostvars": {"w1": {"port": 80}}}
    });
    fixture.write_cache(&cached);

    let output = fixture.run(&["--list"]);
    assert_eq!(stdout_json(&output), cached);
}

#[test]
fn refresh_bypasses_cache() {
    let fixture = Fixture::new();
    fixture.write_cache(&json!({"_meta": {"hostvars": {}}}));

    let output = fixture.run(&["--list", "--refresh"]);
    assert!(!output.status.success());
}

#[test]
fn unreachable_directory_fails_the_list() {
    let fixture = Fixture::new();
    let output = fixture.run(&["--list"]);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(!fixture.cache_file().exists());
}

#[test]
fn host_prints_vars_by_name() {
    let fixture = Fixture::new();
    fixture.write_snapshot(&directory_records());

    let output = fixture.run_snapshot(&["--host", "h2"]);
    assert_eq!(stdout_json(&output), json!({"id": 2}));
}

#[test]
fn host_prints_vars_by_dn() {
    let fixture = Fixture::new();
    fixture.write_snapshot(&directory_records());

    let output = fixture.run_snapshot(&["--host", "CN=h3,OU=hosts,DC=example"]);
    assert_eq!(stdout_json(&output), json!({"id": 3}));
}

#[test]
fn unknown_host_fails() {
    let fixture = Fixture::new();
    fixture.write_snapshot(&directory_records());

    let output = fixture.run_snapshot(&["--host", "nope"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope"), "stderr: {stderr}");
}

#[test]
fn missing_config_fails() {
    let fixture = Fixture::new();
    std::fs::remove_file(fixture.config_dir().join("lia.json")).expect("remove config");

    let output = fixture.run(&["--list"]);
    assert!(!output.status.success());
}

#[test]
fn explicit_config_path_is_used() {
    let fixture = Fixture::new();
    fixture.write_snapshot(&directory_records());
    let config = fixture.config_dir().join("lia.json");
    let moved = fixture.root.path().join("elsewhere.json");
    std::fs::rename(&config, &moved).expect("move config");

    let moved = moved.to_str().expect("utf-8 temp path");
    let output = fixture.run_snapshot(&["--host", "h1", "--config", moved]);
    assert_eq!(stdout_json(&output), json!({"id": 1}));
}

#[test]
fn list_and_host_are_mutually_exclusive() {
    let fixture = Fixture::new();
    let output = fixture.run(&["--list", "--host", "h1"]);
    assert!(!output.status.success());
}

#[test]
fn bad_log_level_falls_back_with_notice() {
    let fixture = Fixture::new();
    fixture.write_snapshot(&directory_records());
    let snapshot = fixture.snapshot_file();

    let output = std::process::Command::new(env!("CARGO_BIN_EXE_lia"))
        .args(["--host", "h1", "--snapshot"])
        .arg(&snapshot)
        .env("HOME", fixture.root.path())
        .env("XDG_CONFIG_HOME", fixture.config_dir())
        .env("LOG_LEVEL", "LOUD")
        .output()
        .expect("run lia");
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Using default level WARNING"), "stderr: {stderr}");
}
