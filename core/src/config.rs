//! User configuration for the `ankiframe` tools.
//!
//! # Example YAML
//!
//! ```yaml
//! collection: /home/me/.local/share/Anki2/User 1/collection.anki2
//! fields_prefix: nfld_
//! write_mode: update
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::source::WriteMode;
use crate::table::DEFAULT_FIELDS_PREFIX;

fn default_fields_prefix() -> String {
    DEFAULT_FIELDS_PREFIX.to_string()
}

/// Settings shared by every command.
///
/// # Examples
///
/// ```
/// use ankiframe_core::{Config, WriteMode};
///
/// let config: Config = serde_yaml::from_str("write_mode: replace").unwrap();
/// assert_eq!(config.write_mode, WriteMode::Replace);
/// assert_eq!(config.fields_prefix, "nfld_");
/// assert!(config.collection.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Collection file opened when none is given on the command line.
    #[serde(default)]
    pub collection: Option<PathBuf>,
    /// Prefix of per-field columns.
    #[serde(default = "default_fields_prefix")]
    pub fields_prefix: String,
    /// Default mode for writes.
    #[serde(default)]
    pub write_mode: WriteMode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection: None,
            fields_prefix: default_fields_prefix(),
            write_mode: WriteMode::default(),
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](crate::Error::IoError) if the file cannot be
    /// read, or [`YamlError`](crate::Error::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
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
    use tempfile::TempDir;

    #[test]
    fn test_config_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ankiframe.yml");
        let config = Config {
            collection: Some(PathBuf::from("/tmp/collection.anki2")),
            fields_prefix: "f_".into(),
            write_mode: WriteMode::Append,
        };
        config.save(&path).unwrap();
        assert_eq!(Config::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Config::load(dir.path().join("nope.yml")),
            Err(crate::Error::IoError(_))
        ));
    }

    #[test]
    fn test_bad_yaml_is_yaml_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        std::fs::write(&path, "write_mode: sideways").unwrap();
        assert!(matches!(Config::load(&path), Err(crate::Error::YamlError(_))));
    }
}
