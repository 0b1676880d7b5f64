//! Path resolution for medivault configuration and data files.
//!
//! All medivault data is stored in `~/.medivault/` unless `MEDIVAULT_HOME`
//! points somewhere else:
//! - `config.yaml` - Main configuration file
//! - `medivault.db` - SQLite database holding the offline queue, session and
//!   delivery failure log

use std::path::PathBuf;

use crate::error::MedivaultError;

/// Environment variable overriding the data root.
pub const HOME_ENV: &str = "MEDIVAULT_HOME";

/// Paths to medivault configuration and data files.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Root directory: `~/.medivault/`
    pub root: PathBuf,
    /// Config file: `~/.medivault/config.yaml`
    pub config_file: PathBuf,
    /// Database file: `~/.medivault/medivault.db`
    pub database: PathBuf,
}

impl Paths {
    /// Resolve paths from `MEDIVAULT_HOME`, falling back to `$HOME/.medivault`.
    ///
    /// # Errors
    ///
    /// Returns an error if neither variable is set.
    pub fn new() -> Result<Self, MedivaultError> {
        if let Ok(root) = std::env::var(HOME_ENV) {
            if !root.is_empty() {
                return Ok(Self::with_root(PathBuf::from(root)));
            }
        }

        let home = std::env::var("HOME").map_err(|_| {
            MedivaultError::Config("Could not determine home directory".to_string())
        })?;

        Ok(Self::with_root(PathBuf::from(home).join(".medivault")))
    }

    /// Create paths with a custom root directory (useful for testing).
    #[must_use]
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            config_file: root.join("config.yaml"),
            database: root.join("medivault.db"),
            root,
        }
    }

    /// Ensure the root directory exists.
    ///
    /// # Errors
    ///
    /// Returns an error if directory creation fails.
    pub fn ensure_dirs(&self) -> Result<(), MedivaultError> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                MedivaultError::Config(format!(
                    "Failed to create directory {}: {e}",
                    self.root.display()
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_with_root() {
        let root = PathBuf::from("/tmp/test-medivault");
        let paths = Paths::with_root(root.clone());

        assert_eq!(paths.root, root);
        assert_eq!(paths.config_file, root.join("config.yaml"));
        assert_eq!(paths.database, root.join("medivault.db"));
    }

    #[test]
    fn test_ensure_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let paths = Paths::with_root(temp_dir.path().join("nested").join("root"));

        paths.ensure_dirs().unwrap();
        assert!(paths.root.exists());

        // Second call is a no-op
        paths.ensure_dirs().unwrap();
    }
}
