//! Mapping store boundary used by recipient resolution.
//!
//! A mapping entry associates a lookup key derived from an original
//! recipient with the set of destination addresses the message is forwarded
//! to. Keys follow one of two schemas, selected by configuration: a
//! composite `(local-part, domain)` pair or a single full-address string.
//! Concrete stores live in the [`mappings`](crate::mappings) module.

use std::{fmt::Display, future::Future, pin::Pin};

use serde::Deserialize;

use crate::{Address, UpstreamResult};

/// Local-part marker matching any local-part within a domain.
pub const DEFAULT_WILDCARD_MARKER: &str = "*";

/// Boxed future type for mapping lookups, enabling object safety.
pub type LookupFuture<'a> =
    Pin<Box<dyn Future<Output = UpstreamResult<Option<Vec<String>>>> + Send + 'a>>;

/// Shape of the keys used to address mapping entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySchema {
    /// Entries keyed by the `(local-part, domain)` pair.
    #[default]
    Composite,
    /// Entries keyed by the full address string.
    Address,
}

impl KeySchema {
    /// Builds the key for an exact lookup of `address`.
    pub fn exact_key(&self, address: &Address) -> MappingKey {
        self.key(address.local_part(), address.domain())
    }

    /// Builds the key matching any local-part within `domain`.
    pub fn wildcard_key(&self, marker: &str, domain: &str) -> MappingKey {
        self.key(marker, domain)
    }

    /// Builds a key from its parts according to this schema.
    pub fn key(&self, local_part: &str, domain: &str) -> MappingKey {
        match self {
            KeySchema::Composite => MappingKey::Composite {
                local_part: local_part.to_string(),
                domain: domain.to_string(),
            },
            KeySchema::Address => MappingKey::Address(format!("{local_part}@{domain}")),
        }
    }
}

/// Lookup key of a mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MappingKey {
    Composite { local_part: String, domain: String },
    Address(String),
}

impl Display for MappingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingKey::Composite { local_part, domain } => write!(f, "({local_part}, {domain})"),
            MappingKey::Address(address) => f.write_str(address),
        }
    }
}

/// Trait for mapping stores that resolve keys to destination addresses.
///
/// A lookup answers `Ok(None)` when no entry exists for the key, errors are
/// reserved for failures of the store itself.
pub trait MappingStore: Send + Sync {
    /// Returns the destinations of the entry stored under `key`, if any.
    fn get<'a>(&'a self, key: &'a MappingKey) -> LookupFuture<'a>;

    /// Returns the name of this store.
    fn name(&self) -> &str;
}
