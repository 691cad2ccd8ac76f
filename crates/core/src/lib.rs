//! Core types and shared functionality for shellcache.
//!
//! This crate provides:
//! - Versioned cache generation store with SQLite backend
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheDb, CacheStorage, CachedResponse, GenerationInfo};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
