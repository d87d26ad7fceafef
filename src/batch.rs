//! On-demand host lookups by name or DN.
//!
//! Name lookups are planned into bounded batches, one paged OR-filter search
//! per batch. DN lookups are one object-scope search each. Whatever is still
//! unresolved after every search fails the call once, listing every missing
//! identifier; hosts resolved along the way stay in the index.
use crate::config::{Config, HostSettings};
use crate::directory::{DirectoryClient, Filter, SearchRequest, SearchScope};
use crate::error::{InventoryError, Result};
use crate::model::{Host, HostId, HostIndex};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Split the identifiers not yet known into batches of at most `batch_size`,
/// keeping first-seen order and dropping repeats.
pub fn plan_batches<'a, I, F>(requested: I, is_known: F, batch_size: usize) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
    F: Fn(&str) -> bool,
{
    let mut seen = HashSet::new();
    let pending: Vec<String> = requested
        .into_iter()
        .filter(|id| !is_known(id) && seen.insert(*id))
        .map(str::to_string)
        .collect();
    pending
        .chunks(batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Resolves hosts on demand and remembers what it found.
pub struct HostResolver<'a, C: ?Sized> {
    client: &'a mut C,
    settings: &'a HostSettings,
    page_size: u32,
    batch_size: usize,
    index: HostIndex,
    /// Requested names, case-folded, that reached a host through a name value
    /// other than its canonical name.
    aliases: HashMap<String, HostId>,
}

impl<'a, C> HostResolver<'a, C>
where
    C: DirectoryClient + ?Sized,
{
    pub fn new(client: &'a mut C, config: &'a Config) -> Self {
        Self {
            client,
            settings: &config.hosts,
            page_size: config.page,
            batch_size: config.batch,
            index: HostIndex::new(),
            aliases: HashMap::new(),
        }
    }

    pub fn index(&self) -> &HostIndex {
        &self.index
    }

    pub fn host_by_name(&self, name: &str) -> Option<&Host> {
        self.index
            .by_name(name)
            .or_else(|| {
                self.aliases
                    .get(&fold(name))
                    .and_then(|&id| self.index.get(id))
            })
    }

    fn knows_name(&self, name: &str) -> bool {
        self.host_by_name(name).is_some()
    }

    /// Look up every name not already known; fails with `NamesNotFound`
    /// listing each name no batch returned.
    pub fn resolve_names<'n, I>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let requested: Vec<&str> = names.into_iter().collect();
        let batches = plan_batches(
            requested.iter().copied(),
            |name| self.knows_name(name),
            self.batch_size,
        );
        tracing::debug!(
            requested = requested.len(),
            batches = batches.len(),
            "resolving host names"
        );

        let name_attr = self.settings.attr.name.clone();
        for batch in &batches {
            let request = SearchRequest {
                base: self.settings.base.clone(),
                scope: self.settings.scope,
                filter: Filter::object_class(&self.settings.objectclass)
                    .and(Filter::any_of(&name_attr, batch.iter().map(String::as_str))),
                attributes: vec![name_attr.clone(), self.settings.attr.var.clone()],
            };
            // directories match name attributes case-insensitively
            let wanted: HashSet<String> = batch.iter().map(String::as_str).map(fold).collect();
            let settings = self.settings;
            let index = &mut self.index;
            let aliases = &mut self.aliases;
            self.client
                .search_paged(&request, self.page_size, &mut |record| {
                    let id = match index.id_by_dn(&record.dn) {
                        Some(id) => id,
                        None => index.insert(Host::from_record(&record, &settings.attr)?)?,
                    };
                    for value in record.str_values(&name_attr).map(fold) {
                        if wanted.contains(&value) {
                            aliases.entry(value).or_insert(id);
                        }
                    }
                    Ok(())
                })?;
        }

        let missing: BTreeSet<String> = requested
            .into_iter()
            .filter(|name| !self.knows_name(name))
            .map(str::to_string)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(InventoryError::NamesNotFound(missing.into_iter().collect()))
        }
    }

    /// Look up each DN not already known with an object-scope search; fails
    /// with `DnsNotFound` listing each DN that returned nothing.
    pub fn resolve_dns<'n, I>(&mut self, dns: I) -> Result<()>
    where
        I: IntoIterator<Item = &'n str>,
    {
        let pending = plan_batches(dns, |dn| self.index.id_by_dn(dn).is_some(), usize::MAX);
        let mut missing = Vec::new();
        for dn in pending.into_iter().flatten() {
            let request = SearchRequest {
                base: dn.clone(),
                scope: SearchScope::Base,
                filter: Filter::object_class(&self.settings.objectclass),
                attributes: vec![
                    self.settings.attr.name.clone(),
                    self.settings.attr.var.clone(),
                ],
            };
            let records = self.client.search(&request)?;
            if records.is_empty() {
                missing.push(dn);
                continue;
            }
            for record in records {
                if self.index.id_by_dn(&record.dn).is_none() {
                    self.index
                        .insert(Host::from_record(&record, &self.settings.attr)?)?;
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            missing.sort();
            Err(InventoryError::DnsNotFound(missing))
        }
    }
}

fn fold(name: &str) -> String {
    name.to_lowercase()
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
