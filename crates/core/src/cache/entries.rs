//! Stored response operations.
//!
//! Entries belong to exactly one generation and are keyed by request
//! identity (see [`super::hash::compute_request_key`]).

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A stored response, served back verbatim on a cache hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub key: String,
    pub method: String,
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub headers_json: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: String,
}

impl CacheDb {
    /// Replace the contents of a generation with `entries` and mark it populated.
    ///
    /// Runs in a single transaction: either every entry is stored and the
    /// generation is marked populated, or nothing changes.
    pub async fn populate_generation(&self, name: &str, entries: Vec<CachedResponse>) -> Result<usize, Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT INTO generations (name, created_at) VALUES (?1, ?2)
                     ON CONFLICT(name) DO NOTHING",
                    params![name, now],
                )?;
                tx.execute("DELETE FROM entries WHERE generation = ?1", params![name])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries (
                            generation, key, method, url, status_code,
                            content_type, headers_json, body, fetched_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                        ON CONFLICT(generation, key) DO UPDATE SET
                            method = excluded.method,
                            url = excluded.url,
                            status_code = excluded.status_code,
                            content_type = excluded.content_type,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            fetched_at = excluded.fetched_at",
                    )?;
                    for entry in &entries {
                        stmt.execute(params![
                            &name,
                            &entry.key,
                            &entry.method,
                            &entry.url,
                            entry.status_code,
                            &entry.content_type,
                            &entry.headers_json,
                            &entry.body,
                            &entry.fetched_at,
                        ])?;
                    }
                }
                tx.execute("UPDATE generations SET populated_at = ?2 WHERE name = ?1", params![name, now])?;
                tx.commit()?;
                Ok(entries.len())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up a stored response by request key within a generation.
    ///
    /// Returns None if the generation or the key doesn't exist.
    pub async fn match_entry(&self, generation: &str, key: &str) -> Result<Option<CachedResponse>, Error> {
        let generation = generation.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CachedResponse>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT key, method, url, status_code, content_type, headers_json, body, fetched_at
                     FROM entries WHERE generation = ?1 AND key = ?2",
                )?;

                let result = stmt.query_row(params![generation, key], |row| {
                    Ok(CachedResponse {
                        key: row.get(0)?,
                        method: row.get(1)?,
                        url: row.get(2)?,
                        status_code: row.get(3)?,
                        content_type: row.get(4)?,
                        headers_json: row.get(5)?,
                        body: row.get(6)?,
                        fetched_at: row.get(7)?,
                    })
                });

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a generation, sorted.
    pub async fn entry_urls(&self, generation: &str) -> Result<Vec<String>, Error> {
        let generation = generation.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE generation = ?1 ORDER BY url ASC")?;
                let urls = stmt
                    .query_map(params![generation], |row| row.get(0))?
                    .collect::<Result<Vec<String>, rusqlite::Error>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}
