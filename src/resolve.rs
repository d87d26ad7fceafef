//! Name disambiguation and variable merging for directory records.
//!
//! Directory attributes are unordered sets, so both helpers impose a total
//! order on their inputs: repeated builds against the same data must produce
//! the same names and the same merged vars.
use crate::error::{InventoryError, Result};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Pick one canonical name out of a multi-valued name attribute.
///
/// `rdn_values` are the values the same attribute carries in the record's leaf
/// relative component. Returns `None` only when `values` is empty.
pub fn resolve_name<'a, V, R>(values: V, rdn_values: R) -> Option<String>
where
    V: IntoIterator<Item = &'a str>,
    R: IntoIterator<Item = &'a str>,
{
    let candidates: BTreeSet<&str> = values.into_iter().collect();
    if candidates.len() <= 1 {
        return candidates.into_iter().next().map(str::to_string);
    }
    let in_rdn: BTreeSet<&str> = rdn_values
        .into_iter()
        .filter(|value| candidates.contains(value))
        .collect();
    // BTreeSet iterates in ascending order, so `first` is the smallest.
    in_rdn
        .first()
        .or_else(|| candidates.first())
        .map(|name| name.to_string())
}

/// Shallow-merge JSON object blobs in directory order; later keys win.
pub fn merge_vars<'a, I>(dn: &str, blobs: I) -> Result<Map<String, Value>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut merged = Map::new();
    for blob in blobs {
        let parsed: Map<String, Value> =
            serde_json::from_str(blob).map_err(|source| InventoryError::InvalidVariablePayload {
                dn: dn.to_string(),
                source,
            })?;
        merged.extend(parsed);
    }
    Ok(merged)
}
