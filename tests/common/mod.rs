//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Nothing listens here, so any attempt to reach LDAP fails fast.
pub const UNREACHABLE_URI: &str = "ldap://127.0.0.1:1";

/// Isolated home with its own config and cache directories.
pub struct Fixture {
    pub root: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        let fixture = Self { root };
        std::fs::create_dir_all(fixture.config_dir()).expect("create config dir");
        fixture.write_config(&default_config());
        fixture
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.path().join("config")
    }

    pub fn cache_file(&self) -> PathBuf {
        self.root.path().join("cache").join("lia.json")
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.root.path().join("snapshot.json")
    }

    pub fn write_config(&self, config: &Value) {
        write_json(&self.config_dir().join("lia.json"), config);
    }

    pub fn write_cache(&self, inventory: &Value) {
        let path = self.cache_file();
        std::fs::create_dir_all(path.parent().expect("cache parent")).expect("create cache dir");
        write_json(&path, inventory);
    }

    pub fn write_snapshot(&self, records: &Value) {
        write_json(&self.snapshot_file(), records);
    }

    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_lia"))
            .args(args)
            .env("HOME", self.root.path())
            .env("XDG_CONFIG_HOME", self.config_dir())
            .env("XDG_CACHE_HOME", self.root.path().join("cache"))
            .env_remove("LOG_LEVEL")
            .output()
            .expect("run lia")
    }

    /// Run with the fixture snapshot as the directory.
    pub fn run_snapshot(&self, args: &[&str]) -> Output {
        let snapshot = self.snapshot_file();
        let snapshot = snapshot.to_str().expect("utf-8 temp path");
        let mut full: Vec<&str> = args.to_vec();
        full.extend(["--snapshot", snapshot]);
        self.run(&full)
    }
}

pub fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "lia failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

pub fn default_config() -> Value {
    json!({
        "uri": UNREACHABLE_URI,
        "timeout": 2,
        "hosts": {
            "base": "ou=hosts,dc=example",
            "objectclass": "device",
            "attr": {"name": "cn", "var": "ansibleVars"}
        },
        "groups": [
            {
                "base": "ou=groups,dc=example",
                "objectclass": "groupOfNames",
                "attr": {"name": "cn", "var": "ansibleVars", "host": "member"}
            },
            {
                "base": "ou=hosts,dc=example",
                "scope": "base",
                "objectclass": "organizationalUnit",
                "attr": {"name": "ou", "var": "ansibleVars"}
            }
        ]
    })
}

pub fn directory_records() -> Value {
    json!([
        {
            "dn": "ou=hosts,dc=example",
            "attributes": {
                "objectClass": ["organizationalUnit"],
                "ou": ["hosts"],
                "ansibleVars": ["{\"ntp\":\"pool.ntp.org\"}"]
            }
        },
        {
            "dn": "cn=h1,ou=hosts,dc=example",
            "attributes": {"objectClass": ["device"], "cn": ["h1"], "ansibleVars": ["{\"id\":1}"]}
        },
        {
            "dn": "cn=h2,ou=hosts,dc=example",
            "attributes": {"objectClass": ["device"], "cn": ["h2"], "ansibleVars": ["{\"id\":2}"]}
        },
        {
            "dn": "cn=h3,ou=hosts,dc=example",
            "attributes": {"objectClass": ["device"], "cn": ["h3"], "ansibleVars": ["{\"id\":3}"]}
        },
        {
            "dn": "cn=g1,ou=groups,dc=example",
            "attributes": {"objectClass": ["groupOfNames"], "cn": ["g1"], "member": ["h1", "h2"]}
        }
    ])
}

fn write_json(path: &std::path::Path, value: &Value) {
    let text = serde_json::to_string_pretty(value).expect("serialize json");
    std::fs::write(path, text).expect("write json");
}
