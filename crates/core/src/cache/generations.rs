//! Cache generation bookkeeping.
//!
//! A generation is one named bucket of stored responses. Names follow
//! `<app-id>-cache-<version>`; the store itself treats them as opaque.

use super::connection::CacheDb;
use crate::Error;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// Summary of a stored generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationInfo {
    pub name: String,
    pub created_at: String,
    /// When the full app shell was stored. `None` means the generation is
    /// empty or degraded and must not be treated as fresh.
    pub populated_at: Option<String>,
    pub entry_count: i64,
}

impl GenerationInfo {
    pub fn is_populated(&self) -> bool {
        self.populated_at.is_some()
    }
}

impl CacheDb {
    /// Open a generation, creating it if absent.
    ///
    /// Returns true if the generation was created by this call.
    pub async fn open_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let created = conn.execute(
                    "INSERT INTO generations (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                Ok(created == 1)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every generation in storage, oldest first.
    pub async fn generation_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// List generations with their entry counts, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<GenerationInfo>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<GenerationInfo>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT g.name, g.created_at, g.populated_at, COUNT(e.key)
                     FROM generations g
                     LEFT JOIN entries e ON e.generation = g.name
                     GROUP BY g.name
                     ORDER BY g.created_at ASC, g.name ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(GenerationInfo {
                            name: row.get(0)?,
                            created_at: row.get(1)?,
                            populated_at: row.get(2)?,
                            entry_count: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
            .map_err(Error::from)
    }

    /// Check whether a generation holds a complete app shell.
    ///
    /// Returns false if the generation doesn't exist or was never populated.
    pub async fn is_generation_populated(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let populated: bool = conn.query_row(
                    "SELECT EXISTS(
                        SELECT 1 FROM generations WHERE name = ?1 AND populated_at IS NOT NULL
                    )",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(populated)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation and, by cascade, all of its entries.
    ///
    /// Returns false if no generation had that name.
    pub async fn delete_generation(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }
}
