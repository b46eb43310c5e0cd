//! Connection configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! path: data/app.db
//! echo: true
//! debug: false
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings used by [`Dba::open`](crate::Dba::open).
///
/// Every field has a default, so a YAML file only needs to name the fields
/// it changes.
///
/// # Examples
///
/// ```
/// use dba_sqlite::DbaConfig;
///
/// let cfg = DbaConfig::default();
/// assert!(cfg.path.is_none());
/// assert!(!cfg.echo);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbaConfig {
    /// Database file; `None` opens a private in-memory database.
    pub path: Option<PathBuf>,
    /// Echo every statement through `tracing` (target `dba::echo`).
    pub echo: bool,
    /// Emit additional debugging events.
    pub debug: bool,
}

impl DbaConfig {
    /// Configuration for a database file at `path`.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DbaError::IoError) if the file cannot be
    /// read, or [`ConfigError`](crate::DbaError::ConfigError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::DbaError::IoError) if the file cannot be
    /// written, or [`ConfigError`](crate::DbaError::ConfigError) if
    /// serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: DbaConfig = serde_yaml::from_str("echo: true\n").unwrap();
        assert!(config.echo);
        assert!(!config.debug);
        assert!(config.path.is_none());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
path: /tmp/app.db
echo: false
debug: true
"#;
        let config: DbaConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.path, Some(PathBuf::from("/tmp/app.db")));
        assert!(config.debug);
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dba.yml");

        let original = DbaConfig {
            path: Some(PathBuf::from("data.db")),
            echo: true,
            debug: true,
        };
        original.save(&path).unwrap();

        assert_eq!(DbaConfig::load(&path).unwrap(), original);
    }
}
