use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{
    Address, ForwardError, ForwardResult, KeySchema, MappingStore, DEFAULT_WILDCARD_MARKER,
};

/// Outcome of a successful recipient resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRouting {
    /// Concatenation of the destinations of every matched entry, in match
    /// order, duplicates preserved.
    pub destinations: Vec<String>,

    /// Original recipient of the last entry that matched.
    pub resolved_origin: Address,
}

/// Resolves original recipients to forwarding destinations.
///
/// Resolution runs in two phases. The exact phase looks up every recipient
/// and skips misses. Only when it produced no destination does the wildcard
/// phase run, looking up the "any local-part" entry of every recipient's
/// domain, and there a single miss fails the whole resolution even when
/// earlier recipients matched. This asymmetry is kept as-is.
pub struct Resolver {
    store: Arc<dyn MappingStore>,
    schema: KeySchema,
    wildcard_marker: String,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("store", &self.store.name())
            .field("schema", &self.schema)
            .field("wildcard_marker", &self.wildcard_marker)
            .finish()
    }
}

impl Resolver {
    /// Creates a new [`Resolver`] using the default wildcard marker.
    pub fn new(store: Arc<dyn MappingStore>, schema: KeySchema) -> Self {
        Self::with_wildcard_marker(store, schema, DEFAULT_WILDCARD_MARKER)
    }

    pub fn with_wildcard_marker(
        store: Arc<dyn MappingStore>,
        schema: KeySchema,
        wildcard_marker: &str,
    ) -> Self {
        info!(
            store = store.name(),
            schema = ?schema,
            wildcard_marker = %wildcard_marker,
            "Resolver initialized"
        );
        Self {
            store,
            schema,
            wildcard_marker: wildcard_marker.to_string(),
        }
    }

    /// Resolves `recipients` (in input order) into forwarding destinations.
    ///
    /// Fails with [`ForwardError::NoMappingFound`] when no destination can
    /// be determined or when a wildcard lookup misses, store failures are
    /// propagated as [`ForwardError::Upstream`].
    pub async fn resolve(&self, recipients: &[Address]) -> ForwardResult<ResolvedRouting> {
        let mut destinations = Vec::new();
        let mut resolved_origin = None;

        for recipient in recipients {
            let key = self.schema.exact_key(recipient);
            if let Some(entry) = self.store.get(&key).await? {
                debug!(
                    recipient = %recipient,
                    destinations = ?entry,
                    "Exact mapping matched"
                );
                destinations.extend(entry);
                resolved_origin = Some(recipient);
            }
        }

        if destinations.is_empty() {
            debug!("No exact mapping, falling back to wildcard mappings");
            for recipient in recipients {
                let key = self
                    .schema
                    .wildcard_key(&self.wildcard_marker, recipient.domain());
                match self.store.get(&key).await? {
                    Some(entry) => {
                        debug!(
                            recipient = %recipient,
                            destinations = ?entry,
                            "Wildcard mapping matched"
                        );
                        destinations.extend(entry);
                        resolved_origin = Some(recipient);
                    }
                    None => {
                        warn!(
                            recipient = %recipient,
                            domain = %recipient.domain(),
                            "No wildcard mapping for domain"
                        );
                        return Err(no_mapping_found(recipients));
                    }
                }
            }
        }

        match resolved_origin {
            Some(origin) if !destinations.is_empty() => {
                info!(
                    resolved_origin = %origin,
                    destinations = ?destinations,
                    "Recipients resolved"
                );
                Ok(ResolvedRouting {
                    destinations,
                    resolved_origin: origin.clone(),
                })
            }
            _ => Err(no_mapping_found(recipients)),
        }
    }
}

fn no_mapping_found(recipients: &[Address]) -> ForwardError {
    ForwardError::NoMappingFound(recipients.iter().map(|r| r.to_string()).collect())
}
