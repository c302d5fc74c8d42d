//! SQLite-backed mapping store.
//!
//! Entries are stored one row per destination in a table named after the
//! configured mapping table. The composite schema uses the columns
//! `(local_part, domain, destination)`, the address schema uses
//! `(address, destination)`.

use std::path::PathBuf;

use rusqlite::{params_from_iter, Connection};
use tracing::{debug, error, info};

use crate::{KeySchema, LookupFuture, MappingKey, MappingStore, UpstreamError, UpstreamResult};

/// Mapping store reading entries from a SQLite database file.
pub struct SqliteMappingStore {
    path: PathBuf,
    table: String,
}

impl SqliteMappingStore {
    /// Creates a new [`SqliteMappingStore`] reading `table` from the database at `path`.
    pub fn new(path: PathBuf, table: &str) -> Self {
        info!(
            path = %path.display(),
            table = %table,
            "SQLite mapping store initialized"
        );
        Self {
            path,
            table: table.to_string(),
        }
    }

    /// Creates the mapping table for `schema` if it does not exist yet.
    pub async fn create_table(&self, schema: KeySchema) -> UpstreamResult<()> {
        let sql = match schema {
            KeySchema::Composite => format!(
                "CREATE TABLE IF NOT EXISTS {} (local_part TEXT NOT NULL, domain TEXT NOT NULL, destination TEXT NOT NULL)",
                quote_identifier(&self.table)
            ),
            KeySchema::Address => format!(
                "CREATE TABLE IF NOT EXISTS {} (address TEXT NOT NULL, destination TEXT NOT NULL)",
                quote_identifier(&self.table)
            ),
        };
        self.execute(sql, vec![]).await
    }

    /// Adds `destination` to the entry stored under `key`.
    pub async fn insert(&self, key: &MappingKey, destination: &str) -> UpstreamResult<()> {
        let table = quote_identifier(&self.table);
        let (sql, mut params) = match key {
            MappingKey::Composite { local_part, domain } => (
                format!("INSERT INTO {table} (local_part, domain, destination) VALUES (?1, ?2, ?3)"),
                vec![local_part.clone(), domain.clone()],
            ),
            MappingKey::Address(address) => (
                format!("INSERT INTO {table} (address, destination) VALUES (?1, ?2)"),
                vec![address.clone()],
            ),
        };
        params.push(destination.to_string());
        self.execute(sql, params).await
    }

    async fn execute(&self, sql: String, params: Vec<String>) -> UpstreamResult<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> rusqlite::Result<()> {
            let conn = Connection::open(path)?;
            conn.execute(&sql, params_from_iter(params.iter()))?;
            Ok(())
        })
        .await
        .map_err(|e| UpstreamError::Mapping(e.to_string()))?
        .map_err(|e| {
            error!(table = %self.table, error = %e, "Failed to update mapping table");
            UpstreamError::Mapping(e.to_string())
        })
    }

    fn select(&self, key: &MappingKey) -> (String, Vec<String>) {
        let table = quote_identifier(&self.table);
        match key {
            MappingKey::Composite { local_part, domain } => (
                format!(
                    "SELECT destination FROM {table} WHERE local_part = ?1 AND domain = ?2 ORDER BY rowid"
                ),
                vec![local_part.clone(), domain.clone()],
            ),
            MappingKey::Address(address) => (
                format!("SELECT destination FROM {table} WHERE address = ?1 ORDER BY rowid"),
                vec![address.clone()],
            ),
        }
    }
}

impl MappingStore for SqliteMappingStore {
    fn get<'a>(&'a self, key: &'a MappingKey) -> LookupFuture<'a> {
        Box::pin(async move {
            let path = self.path.clone();
            let (sql, params) = self.select(key);
            let destinations = tokio::task::spawn_blocking(
                move || -> rusqlite::Result<Vec<String>> {
                    let conn = Connection::open(path)?;
                    let mut stmt = conn.prepare(&sql)?;
                    let rows = stmt.query_map(params_from_iter(params.iter()), |row| {
                        row.get::<_, String>(0)
                    })?;
                    rows.collect()
                },
            )
            .await
            .map_err(|e| UpstreamError::Mapping(e.to_string()))?
            .map_err(|e| {
                error!(key = %key, table = %self.table, error = %e, "Failed to query mapping table");
                UpstreamError::Mapping(e.to_string())
            })?;

            debug!(key = %key, destinations = destinations.len(), "SQLite mapping lookup");
            if destinations.is_empty() {
                Ok(None)
            } else {
                Ok(Some(destinations))
            }
        })
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

/// Quotes a table name so that names such as `SesForwarder.mapping` are
/// taken literally.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_sqlite_store_composite() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteMappingStore::new(temp_dir.path().join("mapping.db"), "SesForwarder.mapping");
        store.create_table(KeySchema::Composite).await.unwrap();

        let key = KeySchema::Composite.key("a", "x.com");
        store.insert(&key, "b@y.com").await.unwrap();
        store.insert(&key, "c@y.com").await.unwrap();

        assert_eq!(
            store.get(&key).await,
            Ok(Some(vec!["b@y.com".to_string(), "c@y.com".to_string()]))
        );
        assert_eq!(
            store.get(&KeySchema::Composite.key("*", "x.com")).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn test_sqlite_store_address() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteMappingStore::new(temp_dir.path().join("mapping.db"), "mapping");
        store.create_table(KeySchema::Address).await.unwrap();

        let key = KeySchema::Address.wildcard_key("*", "x.com");
        store.insert(&key, "z@w.com").await.unwrap();

        assert_eq!(store.get(&key).await, Ok(Some(vec!["z@w.com".to_string()])));
        assert_eq!(
            store.get(&MappingKey::Address("a@x.com".to_string())).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn test_sqlite_store_missing_table() {
        let temp_dir = TempDir::new().unwrap();
        let store = SqliteMappingStore::new(temp_dir.path().join("mapping.db"), "absent");

        let result = store.get(&KeySchema::Composite.key("a", "x.com")).await;
        assert!(matches!(result, Err(UpstreamError::Mapping(_))));
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("SesForwarder.mapping"), "\"SesForwarder.mapping\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}
