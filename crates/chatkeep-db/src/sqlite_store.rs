use async_trait::async_trait;
use chatkeep_common::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::migrations::MIGRATIONS;
use crate::store::{DurableStore, Namespace};

/// SQLite-backed durable store for settings and chat records.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening chat store at {}", db_path.display());
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Store(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Store(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(|e| Error::Store(format!("failed to set pragmas: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Store(format!("failed to open in-memory database: {e}")))?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Apply pending schema steps. Safe to call repeatedly; existing rows are kept.
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        let current: i32 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| Error::Store(format!("failed to read schema version: {e}")))?;

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            conn.execute_batch(migration.sql)
                .map_err(|e| Error::Store(format!("migration failed: {e}")))?;
            conn.execute_batch(&format!("PRAGMA user_version = {}", migration.version))
                .map_err(|e| Error::Store(format!("failed to record schema version: {e}")))?;
            debug!("applied schema migration v{}", migration.version);
        }

        Ok(())
    }

    pub fn schema_version(&self) -> Result<i32> {
        self.conn()?
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .map_err(|e| Error::Store(format!("failed to read schema version: {e}")))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Store("connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl DurableStore for SqliteStore {
    async fn get(&self, namespace: Namespace, key: &str) -> Result<Option<serde_json::Value>> {
        let sql = match namespace {
            Namespace::Settings => "SELECT value FROM settings WHERE key = ?1",
            Namespace::Chats => "SELECT record FROM chats WHERE id = ?1",
        };

        let raw: Option<String> = self
            .conn()?
            .query_row(sql, params![key], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Store(format!("failed to read {key}: {e}")))?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        namespace: Namespace,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<()> {
        let raw = value.to_string();
        let conn = self.conn()?;
        let written = match namespace {
            Namespace::Settings => conn.execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, raw],
            ),
            Namespace::Chats => {
                let updated_at = value
                    .get("updatedAt")
                    .and_then(|v| v.as_i64())
                    .unwrap_or(0);
                conn.execute(
                    "INSERT INTO chats (id, record, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(id) DO UPDATE SET
                       record = excluded.record,
                       updated_at = excluded.updated_at",
                    params![key, raw, updated_at],
                )
            }
        };
        written.map_err(|e| Error::Store(format!("failed to write {key}: {e}")))?;
        Ok(())
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<()> {
        let sql = match namespace {
            Namespace::Settings => "DELETE FROM settings WHERE key = ?1",
            Namespace::Chats => "DELETE FROM chats WHERE id = ?1",
        };
        self.conn()?
            .execute(sql, params![key])
            .map_err(|e| Error::Store(format!("failed to delete {key}: {e}")))?;
        Ok(())
    }

    async fn list_all(&self, namespace: Namespace) -> Result<HashMap<String, serde_json::Value>> {
        let sql = match namespace {
            Namespace::Settings => "SELECT key, value FROM settings",
            Namespace::Chats => "SELECT id, record FROM chats ORDER BY updated_at DESC",
        };

        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| Error::Store(format!("failed to prepare list query: {e}")))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e| Error::Store(format!("failed to list records: {e}")))?;

        let mut records = HashMap::new();
        for row in rows {
            let (key, raw) =
                row.map_err(|e| Error::Store(format!("failed to read record row: {e}")))?;
            records.insert(key, serde_json::from_str(&raw)?);
        }
        Ok(records)
    }
}
