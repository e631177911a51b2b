//! services/kiosk/src/adapters/sqlite_store.rs
//!
//! This module contains the standard credential store: the cached worker
//! passport kept as a JSON value in a small SQLite key/value table.

use async_trait::async_trait;
use chrono::Utc;
use sitepass_core::domain::WorkerPassport;
use sitepass_core::ports::{CredentialStore, PortError, PortResult};
use sqlx::{FromRow, SqlitePool};

use super::record::{self, PASSPORT_KEY};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A credential store that implements the `CredentialStore` port on SQLite.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: SqlitePool,
}

impl SqliteCredentialStore {
    /// Creates a new `SqliteCredentialStore`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

#[derive(FromRow)]
struct KeyValueRecord {
    value: String,
}

//=========================================================================================
// `CredentialStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn load(&self) -> PortResult<Option<WorkerPassport>> {
        let row = sqlx::query_as::<_, KeyValueRecord>("SELECT value FROM key_value WHERE key = ?")
            .bind(PASSPORT_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        row.map(|r| record::decode(&r.value)).transpose()
    }

    async fn save(&self, passport: &WorkerPassport) -> PortResult<()> {
        let value = record::encode(passport)?;
        sqlx::query(
            "INSERT INTO key_value (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(PASSPORT_KEY)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> PortResult<()> {
        sqlx::query("DELETE FROM key_value WHERE key = ?")
            .bind(PASSPORT_KEY)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sitepass_core::domain::OshaCardType;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> SqliteCredentialStore {
        // One connection, so every query sees the same in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let store = SqliteCredentialStore::new(pool);
        store.run_migrations().await.unwrap();
        store
    }

    fn passport(id: &str) -> WorkerPassport {
        WorkerPassport {
            passport_id: id.to_string(),
            name: "Jordan Rivera".to_string(),
            osha_number: "12-345678".to_string(),
            osha_card_type: OshaCardType::Thirty,
            osha_expiry_date: Some("2029-01-31".to_string()),
            trade: "Electrician".to_string(),
            company: "Volt Co".to_string(),
            phone: None,
            emergency_contact: Some("Sam 555-0100".to_string()),
        }
    }

    #[tokio::test]
    async fn empty_store_loads_nothing() {
        let store = store().await;
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn save_overwrites_and_clear_removes() {
        let store = store().await;
        store.save(&passport("p1")).await.unwrap();
        store.save(&passport("p2")).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, passport("p2"));

        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
        // Clearing twice is fine.
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_value_is_an_error() {
        let store = store().await;
        sqlx::query("INSERT INTO key_value (key, value, updated_at) VALUES (?, 'not json', '')")
            .bind(PASSPORT_KEY)
            .execute(&store.pool)
            .await
            .unwrap();

        assert_matches!(store.load().await, Err(PortError::Unexpected(_)));
    }
}
