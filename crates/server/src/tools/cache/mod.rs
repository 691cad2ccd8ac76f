//! Cache-related MCP tools.
//!
//! This module provides tools for inspecting the generation store.

pub mod generations;

pub use generations::{CacheGenerationsOutput, generations_impl};
