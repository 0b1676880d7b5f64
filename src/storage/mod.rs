//! Storage layer for medivault.
//!
//! This module provides SQLite-based persistence for:
//! - The key-value store (offline queue, session)
//! - The delivery failure log

mod database;
mod kv;
mod migrations;

pub use database::Database;
pub use kv::{KeyValueStore, MemoryKvStore, SqliteKvStore};
