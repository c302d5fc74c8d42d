use tracing::{debug, error, info};

use crate::{LookupFuture, MappingKey, MappingStore, UpstreamError, UpstreamResult};

/// Mapping store reading entries from Redis sets.
///
/// Every entry is a set of destinations stored under
/// `<table>:<local_part>:<domain>` (composite keys) or `<table>:<address>`
/// (address keys). Redis does not distinguish an empty set from a missing
/// key, so an empty set is reported as a miss.
pub struct RedisMappingStore {
    client: redis::Client,
    table: String,
}

impl RedisMappingStore {
    /// Creates a new [`RedisMappingStore`] with the given Redis URL and table name.
    pub fn new(url: &str, table: &str) -> UpstreamResult<Self> {
        let client = redis::Client::open(url).map_err(|e| {
            error!(url = %url, error = %e, "Failed to create Redis client");
            UpstreamError::Mapping(format!("Failed to create Redis client: {e}"))
        })?;
        info!(url = %url, table = %table, "Redis mapping store initialized");
        Ok(Self {
            client,
            table: table.to_string(),
        })
    }

    /// Returns the Redis key holding the entry for `key`.
    pub fn redis_key(&self, key: &MappingKey) -> String {
        match key {
            MappingKey::Composite { local_part, domain } => {
                format!("{}:{local_part}:{domain}", self.table)
            }
            MappingKey::Address(address) => format!("{}:{address}", self.table),
        }
    }
}

impl MappingStore for RedisMappingStore {
    fn get<'a>(&'a self, key: &'a MappingKey) -> LookupFuture<'a> {
        Box::pin(async move {
            let redis_key = self.redis_key(key);

            let mut conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| {
                    error!(error = %e, "Failed to connect to Redis");
                    UpstreamError::Mapping(format!("Failed to connect to Redis: {e}"))
                })?;

            let mut destinations = redis::cmd("SMEMBERS")
                .arg(&redis_key)
                .query_async::<Vec<String>>(&mut conn)
                .await
                .map_err(|e| {
                    error!(key = %redis_key, error = %e, "Failed to SMEMBERS from Redis");
                    UpstreamError::Mapping(format!("Failed to read from Redis: {e}"))
                })?;

            // Set members come back in arbitrary order
            destinations.sort();

            debug!(
                key = %redis_key,
                destinations = destinations.len(),
                "Redis mapping lookup"
            );

            if destinations.is_empty() {
                Ok(None)
            } else {
                Ok(Some(destinations))
            }
        })
    }

    fn name(&self) -> &str {
        "redis"
    }
}
