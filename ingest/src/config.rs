//! Ingestion configuration, read from a TOML file.

use crate::error::{ParseConfigSnafu, ReadConfigSnafu, Result};
use dicomview_store::StoreOptions;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// The name of the application directory
/// under the user's configuration and data directories.
const APP_DIR: &str = "dicomview";

/// Settings of the index and of batch ingestion.
///
/// Every field is optional in the configuration file:
///
/// ```toml
/// database_path = "/srv/dicom/index.sqlite"
/// worker_threads = 4
/// recognized_extensions = ["dcm", "ima"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Where the index database is kept.
    pub database_path: PathBuf,
    /// The number of threads reading files, 0 for one per core.
    pub worker_threads: usize,
    /// How many extracted records may wait for the writer.
    pub channel_capacity: usize,
    /// How long store operations wait for locks, in milliseconds.
    pub busy_timeout_ms: u64,
    /// File extensions taken as DICOM files when scanning directories.
    /// Files without an extension are checked for the DICM magic code.
    pub recognized_extensions: Vec<String>,
    /// Whether to descend into symbolic links when scanning directories.
    pub follow_symlinks: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        IngestConfig {
            database_path: default_database_path(),
            worker_threads: 0,
            channel_capacity: 64,
            busy_timeout_ms: 5000,
            recognized_extensions: vec!["dcm".to_string(), "dicom".to_string()],
            follow_symlinks: false,
        }
    }
}

impl IngestConfig {
    /// Load the configuration from the given file.
    /// A missing file yields the default configuration.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No configuration at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e).context(ReadConfigSnafu { path }),
        };
        toml::from_str(&text).context(ParseConfigSnafu { path })
    }

    /// Load the configuration from the default location,
    /// `<config dir>/dicomview/config.toml`.
    pub fn load_default() -> Result<Self> {
        match default_config_path() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// The options for opening the index store.
    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    /// Whether a path found while scanning directories
    /// has one of the recognized extensions.
    /// Extensionless paths are accepted if they start like a DICOM file.
    pub fn is_candidate(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self
                .recognized_extensions
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext)),
            None => dicomview_parser::is_dicom_file(path),
        }
    }
}

/// The default location of the configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// The default location of the index database,
/// `<data dir>/dicomview/index.sqlite`.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("index.sqlite")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = IngestConfig::load(dir.path().join("none.toml")).unwrap();
        assert_eq!(config, IngestConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "database_path = \"/tmp/index.sqlite\"\nworker_threads = 3\nrecognized_extensions = [\"IMA\"]\n",
        )
        .unwrap();
        let config = IngestConfig::load(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/index.sqlite"));
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.channel_capacity, 64);
        assert!(config.is_candidate(Path::new("scan/slice.ima")));
        assert!(!config.is_candidate(Path::new("scan/slice.dcm")));
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "worker_threads = \"many\"").unwrap();
        let err = IngestConfig::load(&path).unwrap_err();
        assert!(matches!(err, crate::Error::ParseConfig { .. }));
    }
}
