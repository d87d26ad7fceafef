//! CLI argument parsing for the inventory script.
//!
//! Ansible calls dynamic inventory scripts with exactly one of `--list` or
//! `--host <name>`; the remaining flags are for running the script by hand.
use clap::{ArgGroup, Parser};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "lia",
    version,
    about = "Ansible dynamic inventory backed by an LDAP directory",
    after_help = "Environment:\n  LOG_LEVEL  CRITICAL, ERROR, WARNING (default), INFO or DEBUG\n\nExamples:\n  lia --list\n  lia --host web1\n  lia --host cn=web1,ou=hosts,dc=example,dc=org\n  lia --list --snapshot /tmp/directory.json",
    group(ArgGroup::new("mode").required(true).args(["list", "host"]))
)]
pub struct RootArgs {
    /// Print the whole inventory
    #[arg(long)]
    pub list: bool,

    /// Print the vars of one host, given by name or DN
    #[arg(long, value_name = "HOST")]
    pub host: Option<String>,

    /// Config file (defaults to $XDG_CONFIG_HOME/lia.json)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Answer searches from a JSON directory export instead of LDAP
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,

    /// Skip the cached inventory and rebuild it from the directory
    #[arg(long)]
    pub refresh: bool,
}

#[cfg(test)]
mod tests {
    use super::RootArgs;
    use clap::Parser;

    #[test]
    fn list_and_host_are_exclusive() {
        assert!(RootArgs::try_parse_from(["lia", "--list", "--host", "h1"]).is_err());
        assert!(RootArgs::try_parse_from(["lia"]).is_err());
    }

    #[test]
    fn host_takes_a_value() {
        let args = RootArgs::try_parse_from(["lia", "--host", "h1", "--refresh"]).unwrap();
        assert_eq!(args.host.as_deref(), Some("h1"));
        assert!(!args.list);
        assert!(args.refresh);
    }
}
