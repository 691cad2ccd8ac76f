//! SQLite-backed store for versioned cache generations.
//!
//! This module provides a persistent, named key-value store using SQLite
//! with async access via tokio-rusqlite. It supports:
//!
//! - One bucket ("generation") per released version
//! - Atomic bulk population of a generation
//! - Request-identity keys using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access

pub mod connection;
pub mod entries;
pub mod generations;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CachedResponse;
pub use generations::GenerationInfo;
pub use storage::CacheStorage;
