//! Hosts, groups, and the host index they resolve against.
use crate::config::{GroupSettings, HostAttributes};
use crate::directory::DirectoryRecord;
use crate::dn::{leaf_rdn, path_key, PathKey};
use crate::error::{InventoryError, Result};
use crate::resolve::{merge_vars, resolve_name};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap};

pub type Vars = Map<String, Value>;
pub type HostId = usize;
pub type GroupId = usize;

/// Payload stored in the directory tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Host(HostId),
    Group(GroupId),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Host {
    pub dn: String,
    pub name: String,
    pub vars: Vars,
}

impl Host {
    pub fn from_record(record: &DirectoryRecord, attr: &HostAttributes) -> Result<Self> {
        Ok(Self {
            dn: record.dn.clone(),
            name: record_name(record, &attr.name)?,
            vars: merge_vars(&record.dn, record.str_values(&attr.var))?,
        })
    }
}

/// How a group finds its members.
#[derive(Clone, Debug, PartialEq)]
pub enum Membership {
    /// Explicit member keys read from a group attribute.
    Attributal { keys: Vec<String>, keys_are_dns: bool },
    /// Whatever the tree places under the group.
    Structural,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    /// `None` for groups synthesized during assembly.
    pub dn: Option<String>,
    pub name: String,
    pub vars: Vars,
    pub membership: Membership,
}

impl Group {
    pub fn from_record(record: &DirectoryRecord, settings: &GroupSettings) -> Result<Self> {
        let attr = &settings.attr;
        let membership = match &attr.host {
            Some(host_attr) => Membership::Attributal {
                keys: record.values(host_attr).to_vec(),
                keys_are_dns: attr.host_is_dn,
            },
            None => Membership::Structural,
        };
        Ok(Self {
            dn: Some(record.dn.clone()),
            name: record_name(record, &attr.name)?,
            vars: merge_vars(&record.dn, record.str_values(&attr.var))?,
            membership,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self.membership {
            Membership::Attributal { .. } => "attributal",
            Membership::Structural => "structural",
        }
    }

    /// Resolve members. Attributal groups look their keys up in `hosts`;
    /// structural groups split their tree descendants into hosts and groups.
    pub fn populate<'a, I>(&self, hosts: &HostIndex, descendants: I) -> Members
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let mut members = Members::default();
        match &self.membership {
            Membership::Attributal { keys, keys_are_dns } => {
                for key in keys {
                    let found = if *keys_are_dns {
                        hosts.id_by_dn(key)
                    } else {
                        hosts.id_by_name(key)
                    };
                    match found {
                        Some(id) => {
                            members.hosts.insert(id);
                        }
                        None => {
                            tracing::warn!(group = %self.name, key = %key, "ignoring unknown host");
                            members.unresolved += 1;
                        }
                    }
                }
            }
            Membership::Structural => {
                for entity in descendants {
                    match *entity {
                        Entity::Host(id) => {
                            members.hosts.insert(id);
                        }
                        Entity::Group(id) => {
                            members.children.insert(id);
                        }
                    }
                }
            }
        }
        tracing::debug!(
            group = %self.name,
            kind = self.kind(),
            hosts = members.hosts.len(),
            children = members.children.len(),
            "populated group"
        );
        members
    }
}

/// Resolved membership of one group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Members {
    pub hosts: BTreeSet<HostId>,
    pub children: BTreeSet<GroupId>,
    /// Membership keys that matched no known host.
    pub unresolved: usize,
}

/// Hosts addressable by canonical name and by normalized DN.
#[derive(Debug, Default)]
pub struct HostIndex {
    hosts: Vec<Host>,
    by_name: HashMap<String, HostId>,
    by_path: HashMap<PathKey, HostId>,
}

impl HostIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a host. A second host at the same DN path is a duplicate-path error;
    /// a second host with the same name takes over the name.
    pub fn insert(&mut self, host: Host) -> Result<HostId> {
        let key = path_key(&host.dn)?;
        if let Some(&existing) = self.by_path.get(&key) {
            return Err(InventoryError::DuplicatePath {
                dn: host.dn,
                existing: self.hosts[existing].dn.clone(),
            });
        }
        let id = self.hosts.len();
        if let Some(previous) = self.by_name.insert(host.name.clone(), id) {
            tracing::warn!(
                name = %host.name,
                dn = %host.dn,
                previous = %self.hosts[previous].dn,
                "duplicate host name"
            );
        }
        self.by_path.insert(key, id);
        self.hosts.push(host);
        Ok(id)
    }

    pub fn get(&self, id: HostId) -> Option<&Host> {
        self.hosts.get(id)
    }

    pub fn id_by_name(&self, name: &str) -> Option<HostId> {
        self.by_name.get(name).copied()
    }

    /// Lookup by DN, tolerant of spelling differences. Unparsable DNs match nothing.
    pub fn id_by_dn(&self, dn: &str) -> Option<HostId> {
        let key = path_key(dn).ok()?;
        self.by_path.get(&key).copied()
    }

    pub fn by_name(&self, name: &str) -> Option<&Host> {
        self.id_by_name(name).and_then(|id| self.get(id))
    }

    pub fn by_dn(&self, dn: &str) -> Option<&Host> {
        self.id_by_dn(dn).and_then(|id| self.get(id))
    }

    /// Every host, including ones whose name was taken over by a later host.
    pub fn iter(&self) -> impl Iterator<Item = (HostId, &Host)> {
        self.hosts.iter().enumerate()
    }

    /// Hosts reachable by name, one per distinct name.
    pub fn named(&self) -> impl Iterator<Item = &Host> {
        self.by_name.values().filter_map(|&id| self.get(id))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

/// Canonical name of a record: its name attribute, disambiguated by the leaf RDN.
pub fn record_name(record: &DirectoryRecord, name_attr: &str) -> Result<String> {
    let leaf = leaf_rdn(&record.dn)?;
    let rdn_values = leaf.iter().flat_map(|rdn| rdn.values_of(name_attr));
    resolve_name(record.str_values(name_attr), rdn_values).ok_or_else(|| {
        InventoryError::MissingName {
            dn: record.dn.clone(),
            attribute: name_attr.to_string(),
        }
    })
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
