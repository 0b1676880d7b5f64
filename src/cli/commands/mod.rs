//! Command implementations for medivault.
//!
//! Each command returns the text to print; `main` prints it.

mod auth;
mod completions;
mod queue;
mod sync;

pub use auth::{login, logout, whoami};
pub use completions::completions;
pub use queue::queue;
pub use sync::sync;

use crate::api::{HttpApiClient, Session};
use crate::cli::args::OutputFormat;
use crate::config::{Config, Paths};
use crate::error::MedivaultError;
use crate::features::offline::{FailureLog, KvQueueStore, SyncService};
use crate::storage::{Database, SqliteKvStore};

/// Queue owner backed by the on-disk key-value store.
pub type DiskSyncService = SyncService<KvQueueStore<SqliteKvStore>>;

/// Resolved paths, configuration and output format for one invocation.
pub struct Context {
    pub paths: Paths,
    pub config: Config,
    pub format: OutputFormat,
}

impl Context {
    /// Resolve paths and load configuration.
    ///
    /// `output` overrides `general.default_output` when given.
    ///
    /// # Errors
    ///
    /// Returns an error if the data root cannot be resolved or the config
    /// file is malformed.
    pub fn load(output: Option<OutputFormat>) -> Result<Self, MedivaultError> {
        let paths = Paths::new()?;
        let config = Config::load(&paths)?;
        let format = output.unwrap_or(config.general.default_output);
        Ok(Self {
            paths,
            config,
            format,
        })
    }

    fn open_database(&self) -> Result<Database, MedivaultError> {
        self.paths.ensure_dirs()?;
        Database::open_at(&self.paths.database)
    }

    /// Hydrate the offline queue from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or the persisted
    /// queue is unreadable.
    pub fn sync_service(&self) -> Result<DiskSyncService, MedivaultError> {
        let kv = SqliteKvStore::new(self.open_database()?);
        SyncService::hydrate(KvQueueStore::new(kv))
    }

    /// Open the delivery failure log.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn failure_log(&self) -> Result<FailureLog, MedivaultError> {
        Ok(FailureLog::new(self.open_database()?))
    }

    /// Open the stored session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn session(&self) -> Result<Session<SqliteKvStore>, MedivaultError> {
        Ok(Session::new(SqliteKvStore::new(self.open_database()?)))
    }

    /// HTTP client carrying the stored bearer token, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read or the client cannot
    /// be built.
    pub fn api_client(&self) -> Result<HttpApiClient, MedivaultError> {
        let token = self.session()?.token()?;
        Ok(HttpApiClient::new(&self.config.api, &self.config.sync)?.with_token(token))
    }
}
