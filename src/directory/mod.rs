//! Directory client contract and record types.
//!
//! The build only ever talks to a [`DirectoryClient`]; the LDAP connection and
//! the offline snapshot are two implementations of it. Searches are blocking
//! and are never retried: a transport failure surfaces as
//! [`InventoryError::DirectoryUnavailable`](crate::error::InventoryError).
mod ldap;
mod snapshot;

pub use ldap::LdapDirectory;
pub use snapshot::SnapshotDirectory;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One directory entry: its DN and raw attribute values in server order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub dn: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryRecord {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_values<I, S>(mut self, attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .entry(attribute.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Values of `attribute`; attribute names compare case-insensitively.
    pub fn values(&self, attribute: &str) -> &[String] {
        if let Some(values) = self.attributes.get(attribute) {
            return values;
        }
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(attribute))
            .map(|(_, values)| values.as_slice())
            .unwrap_or(&[])
    }

    pub fn str_values(&self, attribute: &str) -> impl Iterator<Item = &str> {
        self.values(attribute).iter().map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum SearchScope {
    /// The base entry only.
    Base,
    /// Direct children of the base.
    OneLevel,
    #[default]
    Subtree,
}

impl TryFrom<String> for SearchScope {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.to_ascii_lowercase().as_str() {
            "base" => Ok(SearchScope::Base),
            "one" | "onelevel" | "level" => Ok(SearchScope::OneLevel),
            "sub" | "subtree" => Ok(SearchScope::Subtree),
            _ => Err(format!("unknown scope {value:?} (expected sub, one, or base)")),
        }
    }
}

/// Search filter, rendered to RFC 4515 text only at the LDAP boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Equals { attribute: String, value: String },
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    pub fn equals(attribute: &str, value: &str) -> Self {
        Filter::Equals {
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub fn object_class(class: &str) -> Self {
        Filter::equals("objectClass", class)
    }

    /// `(|(attr=v1)(attr=v2)...)` over every value.
    pub fn any_of<'a, I>(attribute: &str, values: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Filter::Or(
            values
                .into_iter()
                .map(|value| Filter::equals(attribute, value))
                .collect(),
        )
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut parts) => {
                parts.push(other);
                Filter::And(parts)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    /// Evaluate against a record. `objectClass` values compare
    /// case-insensitively, everything else exactly.
    pub fn matches(&self, record: &DirectoryRecord) -> bool {
        match self {
            Filter::Equals { attribute, value } => {
                let fold = attribute.eq_ignore_ascii_case("objectClass");
                record.str_values(attribute).any(|candidate| {
                    if fold {
                        candidate.eq_ignore_ascii_case(value)
                    } else {
                        candidate == value
                    }
                })
            }
            Filter::And(parts) => parts.iter().all(|part| part.matches(record)),
            Filter::Or(parts) => parts.iter().any(|part| part.matches(record)),
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Equals { attribute, value } => {
                write!(f, "({}={})", attribute, ldap3::ldap_escape(value.as_str()))
            }
            Filter::And(parts) => {
                f.write_str("(&")?;
                for part in parts {
                    part.fmt(f)?;
                }
                f.write_str(")")
            }
            Filter::Or(parts) => {
                f.write_str("(|")?;
                for part in parts {
                    part.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct SearchRequest {
    pub base: String,
    pub scope: SearchScope,
    pub filter: Filter,
    pub attributes: Vec<String>,
}

pub trait DirectoryClient {
    /// Single (unpaged) search; used for object-scope lookups.
    fn search(&mut self, request: &SearchRequest) -> Result<Vec<DirectoryRecord>>;

    /// Paged search. `sink` sees every record once, as pages arrive; an error
    /// from `sink` stops the search and is returned.
    fn search_paged(
        &mut self,
        request: &SearchRequest,
        page_size: u32,
        sink: &mut dyn FnMut(DirectoryRecord) -> Result<()>,
    ) -> Result<()>;
}
