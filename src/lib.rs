//! medivault - offline mutation queue for MediVault
//!
//! Patient and prescription mutations made without connectivity are queued
//! durably and replayed, in submission order, against the MediVault REST
//! service once it is reachable again.

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod features;
pub mod logging;
pub mod output;
pub mod storage;

pub use cli::args::{Cli, Commands, OutputFormat};
pub use error::MedivaultError;
pub use features::offline::{OfflineQueue, QueuedAction, SyncService};
