use anyhow::{Context, Result};
use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod batch;
mod cache;
mod cli;
mod config;
mod directory;
mod dn;
mod error;
mod inventory;
mod model;
mod resolve;
mod tree;

use batch::HostResolver;
use cache::InventoryCache;
use cli::RootArgs;
use config::Config;
use directory::{DirectoryClient, LdapDirectory, SnapshotDirectory};
use inventory::build_inventory;

const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
const LOG_LEVELS: [(&str, &str); 5] = [
    ("CRITICAL", "error"),
    ("ERROR", "error"),
    ("WARNING", "warn"),
    ("INFO", "info"),
    ("DEBUG", "debug"),
];
const TRACING_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

fn main() -> Result<()> {
    init_logging();
    let args = RootArgs::parse();
    let config = config::load_config(args.config.as_deref())?;

    match &args.host {
        Some(host) => cmd_host(&args, &config, host),
        None => cmd_list(&args, &config),
    }
}

/// Log to stderr at the level named by `LOG_LEVEL`; stdout carries only JSON.
fn init_logging() {
    let level = match std::env::var(LOG_LEVEL_VAR) {
        Ok(name) => log_directive(&name).unwrap_or_else(|| {
            let expected: Vec<&str> = LOG_LEVELS.iter().map(|(level, _)| *level).collect();
            eprintln!(
                "Expected log level: {}, got: {name}. Using default level WARNING.",
                expected.join("|")
            );
            "warn"
        }),
        Err(_) => "warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Python-style level names first, then tracing's own lowercase names.
fn log_directive(name: &str) -> Option<&'static str> {
    LOG_LEVELS
        .iter()
        .find(|(level, _)| *level == name)
        .map(|(_, directive)| *directive)
        .or_else(|| {
            TRACING_LEVELS
                .iter()
                .find(|level| **level == name)
                .copied()
        })
}

fn open_directory(args: &RootArgs, config: &Config) -> Result<Box<dyn DirectoryClient>> {
    Ok(match &args.snapshot {
        Some(path) => Box::new(SnapshotDirectory::load(path)?),
        None => Box::new(LdapDirectory::connect(config)?),
    })
}

fn cmd_list(args: &RootArgs, config: &Config) -> Result<()> {
    tracing::debug!("Requested the whole inventory");
    // snapshot builds neither read nor replace the real cache
    let cache = match args.snapshot {
        Some(_) => None,
        None => InventoryCache::at_default_location(Duration::from_secs(config.cache_time)),
    };

    if let Some(cache) = cache.as_ref().filter(|_| !args.refresh) {
        match cache.load() {
            Ok(inventory) => {
                tracing::debug!("Using cached inventory from {}", cache.path().display());
                println!("{}", inventory.to_json()?);
                return Ok(());
            }
            Err(miss) => tracing::info!("{miss}"),
        }
    }

    let mut directory = open_directory(args, config)?;
    let inventory = build_inventory(directory.as_mut(), config)?;
    if let Some(cache) = &cache {
        if let Err(err) = cache.store(&inventory) {
            tracing::warn!("{err:#}");
        }
    }
    println!("{}", inventory.to_json()?);
    Ok(())
}

fn cmd_host(args: &RootArgs, config: &Config, host: &str) -> Result<()> {
    tracing::debug!("Requested vars for host {host}");
    let mut directory = open_directory(args, config)?;
    let mut resolver = HostResolver::new(directory.as_mut(), config);

    let found = if looks_like_dn(host) {
        resolver.resolve_dns([host])?;
        resolver.index().by_dn(host)
    } else {
        resolver.resolve_names([host])?;
        resolver.host_by_name(host)
    };
    let found = found.with_context(|| format!("host {host} not found"))?;
    println!("{}", serde_json::to_string_pretty(&found.vars)?);
    Ok(())
}

fn looks_like_dn(value: &str) -> bool {
    value.contains('=') && dn::parse_dn(value).is_ok_and(|rdns| !rdns.is_empty())
}
