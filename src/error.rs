//! Typed failures for inventory builds and host lookups.
//!
//! Everything here is fatal for the call that produced it. Soft failures, such
//! as unknown membership keys in an attributal group, never become an
//! `InventoryError`; they are logged where they happen.
use thiserror::Error;

pub type Result<T, E = InventoryError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum InventoryError {
    /// A required setting is absent or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Connection, bind, or search transport failure. Never retried.
    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("malformed DN {dn:?}: {reason}")]
    MalformedDn { dn: String, reason: String },

    /// Two records normalize to the same tree path.
    #[error("duplicate directory path: {dn:?} collides with {existing:?}")]
    DuplicatePath { dn: String, existing: String },

    /// Insertion attempted after the tree was traversed.
    #[error("directory tree already finalized, cannot insert {dn:?}")]
    IndexFinalized { dn: String },

    #[error("invalid variable payload on {dn:?}: {source}")]
    InvalidVariablePayload {
        dn: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("record {dn:?} has no value for name attribute {attribute:?}")]
    MissingName { dn: String, attribute: String },

    #[error("names not found: {}", .0.join(", "))]
    NamesNotFound(Vec<String>),

    #[error("DNs not found:\n{}", .0.join("\n"))]
    DnsNotFound(Vec<String>),
}
