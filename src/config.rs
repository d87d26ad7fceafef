//! Inventory configuration schema and loading.
//!
//! The config is a JSON document with explicit optional fields and defaults.
//! It is validated once, at load time, so later stages can rely on every
//! base DN parsing and every attribute name being present.
use crate::directory::SearchScope;
use crate::dn::path_key;
use crate::error::{InventoryError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up under the user config directory.
pub const CONFIG_FILE_NAME: &str = "lia.json";

pub const DEFAULT_PAGE_SIZE: u32 = 100;
pub const DEFAULT_BATCH_SIZE: usize = 2000;
/// Three hours.
pub const DEFAULT_CACHE_TIME_SECS: u64 = 10800;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_cache_time() -> u64 {
    DEFAULT_CACHE_TIME_SECS
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// LDAP URI, e.g. `ldaps://ldap.example.org`.
    pub uri: String,
    #[serde(default)]
    pub binddn: Option<String>,
    #[serde(default)]
    pub bindpw: Option<String>,
    /// Default page size for paged searches.
    #[serde(default = "default_page_size")]
    pub page: u32,
    /// Maximum identifiers per batched host lookup.
    #[serde(default = "default_batch_size")]
    pub batch: usize,
    /// Seconds a cached inventory stays valid.
    #[serde(default = "default_cache_time")]
    pub cache_time: u64,
    /// Connect timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    pub hosts: HostSettings,
    #[serde(default)]
    pub groups: Vec<GroupSettings>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSettings {
    pub base: String,
    pub objectclass: String,
    #[serde(default)]
    pub scope: SearchScope,
    pub attr: HostAttributes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostAttributes {
    pub name: String,
    pub var: String,
}

/// One group definition. `attr.host` selects attributal membership.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupSettings {
    pub base: String,
    pub objectclass: String,
    #[serde(default)]
    pub scope: SearchScope,
    #[serde(default)]
    pub page: Option<u32>,
    pub attr: GroupAttributes,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupAttributes {
    pub name: String,
    pub var: String,
    /// Attribute listing member hosts.
    #[serde(default)]
    pub host: Option<String>,
    /// Member values are host DNs instead of host names.
    #[serde(default)]
    pub host_is_dn: bool,
}

impl GroupSettings {
    pub fn page_size(&self, config: &Config) -> u32 {
        self.page.unwrap_or(config.page)
    }
}

/// `$XDG_CONFIG_HOME/lia.json`, or `~/.config/lia.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Load and validate the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path().ok_or_else(|| {
            InventoryError::Configuration("cannot determine config directory".to_string())
        })?,
    };
    tracing::debug!(path = %path.display(), "loading config");
    let text = fs::read_to_string(&path).map_err(|err| {
        InventoryError::Configuration(format!("read {}: {err}", path.display()))
    })?;
    parse_config(&text)
        .map_err(|err| InventoryError::Configuration(format!("{}: {err}", path.display())))
}

fn parse_config(text: &str) -> std::result::Result<Config, String> {
    let config: Config = serde_json::from_str(text).map_err(|err| err.to_string())?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> std::result::Result<(), String> {
    require_non_empty(&config.uri, "uri")?;
    if config.bindpw.is_some() && config.binddn.is_none() {
        return Err("bindpw requires binddn".to_string());
    }
    if config.page == 0 {
        return Err("page must be greater than zero".to_string());
    }
    if config.batch == 0 {
        return Err("batch must be greater than zero".to_string());
    }

    let hosts = &config.hosts;
    require_dn(&hosts.base, "hosts.base")?;
    require_non_empty(&hosts.objectclass, "hosts.objectclass")?;
    require_non_empty(&hosts.attr.name, "hosts.attr.name")?;
    require_non_empty(&hosts.attr.var, "hosts.attr.var")?;

    for (idx, group) in config.groups.iter().enumerate() {
        let label = |field: &str| format!("groups[{idx}].{field}");
        require_dn(&group.base, &label("base"))?;
        require_non_empty(&group.objectclass, &label("objectclass"))?;
        require_non_empty(&group.attr.name, &label("attr.name"))?;
        require_non_empty(&group.attr.var, &label("attr.var"))?;
        if let Some(host) = &group.attr.host {
            require_non_empty(host, &label("attr.host"))?;
        } else if group.attr.host_is_dn {
            return Err(format!(
                "{} is set without {}",
                label("attr.host_is_dn"),
                label("attr.host")
            ));
        }
        if group.page == Some(0) {
            return Err(format!("{} must be greater than zero", label("page")));
        }
    }
    Ok(())
}

fn require_non_empty(value: &str, field: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must be non-empty"));
    }
    Ok(())
}

fn require_dn(value: &str, field: &str) -> std::result::Result<(), String> {
    require_non_empty(value, field)?;
    path_key(value).map_err(|err| format!("{field}: {err}"))?;
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
