//! Inventory build: load hosts and groups, place them in the directory tree,
//! resolve memberships, and assemble the Ansible inventory document.
//!
//! Every group moves through the same states in order: declared (read from
//! the directory), inserted into the tree, petrified (the tree's first
//! traversal), populated. Nothing is kept between builds.
use crate::config::{Config, GroupSettings};
use crate::directory::{DirectoryClient, Filter, SearchRequest};
use crate::dn::path_key;
use crate::error::Result;
use crate::model::{Entity, Group, GroupId, Host, HostId, HostIndex, Members, Vars};
use crate::tree::DirectoryTree;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Group holding hosts no other group claims.
pub const UNGROUPED: &str = "ungrouped";
/// Group carrying the host base's own vars.
pub const ALL: &str = "all";

/// The assembled inventory, in Ansible's dynamic inventory shape.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(flatten)]
    pub groups: BTreeMap<String, GroupData>,
    #[serde(rename = "_meta", default)]
    pub meta: Meta,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub hostvars: BTreeMap<String, Vars>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupData {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<String>,
    #[serde(default, skip_serializing_if = "Vars::is_empty")]
    pub vars: Vars,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

impl GroupData {
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.vars.is_empty() && self.children.is_empty()
    }
}

impl Inventory {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the inventory from whatever `client` returns for `config`.
pub fn build_inventory<C>(client: &mut C, config: &Config) -> Result<Inventory>
where
    C: DirectoryClient + ?Sized,
{
    let hosts = load_hosts(client, config)?;
    let mut groups = Vec::new();
    for settings in &config.groups {
        groups.extend(load_groups(client, config, settings)?);
    }
    classify(config, hosts, groups)
}

/// Run every host record under the host base through name/var resolution.
pub fn load_hosts<C>(client: &mut C, config: &Config) -> Result<HostIndex>
where
    C: DirectoryClient + ?Sized,
{
    let settings = &config.hosts;
    let request = SearchRequest {
        base: settings.base.clone(),
        scope: settings.scope,
        filter: Filter::object_class(&settings.objectclass),
        attributes: vec![settings.attr.name.clone(), settings.attr.var.clone()],
    };

    let mut index = HostIndex::new();
    client.search_paged(&request, config.page, &mut |record| {
        index.insert(Host::from_record(&record, &settings.attr)?)?;
        Ok(())
    })?;
    if index.is_empty() {
        tracing::warn!("No hosts found under {}", settings.base);
    }
    tracing::info!("Loaded {} hosts", index.len());
    Ok(index)
}

fn load_groups<C>(client: &mut C, config: &Config, settings: &GroupSettings) -> Result<Vec<Group>>
where
    C: DirectoryClient + ?Sized,
{
    let attr = &settings.attr;
    let mut attributes = vec![attr.name.clone(), attr.var.clone()];
    attributes.extend(attr.host.iter().cloned());
    let kind = if attr.host.is_some() { "attributal" } else { "structural" };
    tracing::info!("Loading {kind} groups from {}", settings.base);

    let request = SearchRequest {
        base: settings.base.clone(),
        scope: settings.scope,
        filter: Filter::object_class(&settings.objectclass),
        attributes,
    };
    let mut groups = Vec::new();
    client.search_paged(&request, settings.page_size(config), &mut |record| {
        groups.push(Group::from_record(&record, settings)?);
        Ok(())
    })?;
    tracing::info!("Loaded {} groups", groups.len());
    Ok(groups)
}

/// Place hosts and groups in the tree, resolve memberships, and assemble.
pub fn classify(config: &Config, hosts: HostIndex, groups: Vec<Group>) -> Result<Inventory> {
    let mut tree = DirectoryTree::new();
    for (id, group) in groups.iter().enumerate() {
        if let Some(dn) = &group.dn {
            tree.insert(dn, Entity::Group(id), true)?;
        }
    }
    for (id, host) in hosts.iter() {
        tree.insert(&host.dn, Entity::Host(id), false)?;
    }

    let mut members: Vec<Option<Members>> = vec![None; groups.len()];
    for branch in tree.branches() {
        if let Entity::Group(id) = *branch.payload() {
            tracing::trace!(dn = branch.dn(), "populating group");
            members[id] = Some(groups[id].populate(&hosts, branch.descendants()));
        }
    }

    let host_base = path_key(&config.hosts.base)?;
    let root = groups.iter().position(|group| {
        group
            .dn
            .as_deref()
            .and_then(|dn| path_key(dn).ok())
            .is_some_and(|key| key == host_base)
    });
    if let Some(root) = root {
        tracing::debug!("Found root group at {}", config.hosts.base);
        if let Some(root_members) = &members[root] {
            if !root_members.hosts.is_empty() {
                tracing::debug!(
                    hosts = root_members.hosts.len(),
                    "root group members fall back to ungrouped"
                );
            }
        }
    }

    Ok(assemble(&hosts, &groups, &members, root))
}

fn assemble(
    hosts: &HostIndex,
    groups: &[Group],
    members: &[Option<Members>],
    root: Option<GroupId>,
) -> Inventory {
    let mut inventory = Inventory::default();
    // hosts claimed per emitted group name; a replaced group gives its hosts back
    let mut claims: BTreeMap<String, BTreeSet<HostId>> = BTreeMap::new();
    let mut unresolved = 0;

    for (id, group) in groups.iter().enumerate() {
        if Some(id) == root {
            continue;
        }
        let Some(group_members) = &members[id] else {
            continue;
        };
        unresolved += group_members.unresolved;

        let host_names: BTreeSet<String> = group_members
            .hosts
            .iter()
            .filter_map(|&host| hosts.get(host).map(|host| host.name.clone()))
            .collect();
        let child_names: BTreeSet<String> = group_members
            .children
            .iter()
            .filter(|&&child| Some(child) != root)
            .map(|&child| groups[child].name.clone())
            .collect();
        let data = GroupData {
            hosts: host_names.into_iter().collect(),
            vars: group.vars.clone(),
            children: child_names.into_iter().collect(),
        };
        if data.is_empty() {
            continue;
        }
        if inventory.groups.insert(group.name.clone(), data).is_some() {
            tracing::warn!(group = %group.name, "duplicate group name, keeping the last one");
        }
        claims.insert(group.name.clone(), group_members.hosts.clone());
    }
    if unresolved > 0 {
        tracing::info!(unresolved, "membership keys skipped");
    }

    // a directory group named `ungrouped` is replaced below, so its claims do not count
    let claimed: BTreeSet<HostId> = claims
        .iter()
        .filter(|(name, _)| name.as_str() != UNGROUPED)
        .flat_map(|(_, ids)| ids.iter().copied())
        .collect();
    let ungrouped: BTreeSet<String> = hosts
        .iter()
        .filter(|(id, _)| !claimed.contains(id))
        .map(|(_, host)| host.name.clone())
        .collect();
    tracing::debug!("{} hosts ungrouped", ungrouped.len());
    insert_synthetic(
        &mut inventory,
        UNGROUPED,
        GroupData {
            hosts: ungrouped.into_iter().collect(),
            ..GroupData::default()
        },
    );

    if let Some(root) = root {
        insert_synthetic(
            &mut inventory,
            ALL,
            GroupData {
                vars: groups[root].vars.clone(),
                ..GroupData::default()
            },
        );
    }

    for host in hosts.named() {
        if !host.vars.is_empty() {
            inventory
                .meta
                .hostvars
                .insert(host.name.clone(), host.vars.clone());
        }
    }
    inventory
}

fn insert_synthetic(inventory: &mut Inventory, name: &str, data: GroupData) {
    if data.is_empty() {
        return;
    }
    if inventory.groups.insert(name.to_string(), data).is_some() {
        tracing::warn!(group = name, "directory group replaced by synthetic group");
    }
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod tests;
