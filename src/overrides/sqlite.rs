#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::Path,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use rusqlite::{Connection, OptionalExtension, params};

use super::store::{OverrideContext, OverrideStore};
use crate::{
    error::{OverrideError, Result},
    fields::Field,
    types::Location,
};

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Override store persisted in a SQLite database.
#[derive(Clone)]
pub struct SqliteOverrideStore {
    /// Shared connection.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteOverrideStore {
    /// Opens (or creates) the database at `path` and ensures the schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::from_connection(conn)
    }

    /// Opens the database at `path` only if it already exists. Read-only
    /// commands use this so they never leave an empty database behind.
    pub fn open_existing(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            tracing::debug!("No override store at {}", path.display());
            return Ok(None);
        }
        Self::open(path).map(Some)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection and ensures the schema.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Locks the connection.
    fn get_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| OverrideError::Storage(format!("connection lock poisoned: {e}")))
    }

    /// Creates the override table if it does not exist yet.
    pub fn ensure_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS field_override (
              context TEXT NOT NULL,
              location TEXT NOT NULL,
              field TEXT NOT NULL,
              value TEXT NOT NULL,
              updated_at TEXT NOT NULL DEFAULT (datetime('now')),
              PRIMARY KEY (context, location, field)
            );
            "#,
        )?;
        Ok(())
    }
}

impl OverrideStore for SqliteOverrideStore {
    fn read_raw(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
    ) -> Result<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM field_override WHERE context = ?1 AND location = ?2 AND field = ?3",
                params![context.key(), location.as_str(), field.name()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_raw(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
        raw: &str,
    ) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO field_override (context, location, field, value, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT (context, location, field)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
            params![context.key(), location.as_str(), field.name(), raw],
        )?;
        Ok(())
    }

    fn delete_raw(
        &self,
        context: &OverrideContext,
        location: &Location,
        field: Field,
    ) -> Result<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "DELETE FROM field_override WHERE context = ?1 AND location = ?2 AND field = ?3",
            params![context.key(), location.as_str(), field.name()],
        )?;
        Ok(changed > 0)
    }

    fn list_raw(&self, context: &OverrideContext) -> Result<Vec<(Location, Field, String)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT location, field, value FROM field_override WHERE context = ?1 ORDER BY location",
        )?;
        let rows = stmt
            .query_map(params![context.key()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = rows
            .into_iter()
            .map(|(location, field, value)| {
                Ok((Location(location), field.parse::<Field>()?, value))
            })
            .collect::<Result<Vec<_>>>()?;
        out.sort_by(|a, b| (&a.0, a.1).cmp(&(&b.0, b.1)));
        Ok(out)
    }
}
