//! Bootstrap configuration loading and root folder resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`EMIS_*`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! Only the TOML layer lives here; CLI and ENV are merged by the service
//! binary, which owns its argument parser.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Database file name inside the root folder
pub const DATABASE_FILE_NAME: &str = "emis.db";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "EMIS_ROOT_FOLDER";

/// Bootstrap configuration loaded from TOML file
///
/// Every section is optional; missing keys take compiled defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding the database (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Address the HTTP server binds to (optional)
    #[serde(default)]
    pub bind_address: Option<String>,

    /// HTTP server port (optional)
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ingest: IngestSettings,

    #[serde(default)]
    pub suggester: SuggesterConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Ingestion pipeline limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSettings {
    /// Maximum accepted upload size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Maximum number of problems listed in a preview response
    #[serde(default = "default_problem_cap")]
    pub problem_cap: usize,

    /// Number of data rows checked by preview (None = whole file)
    #[serde(default)]
    pub preview_sample_rows: Option<usize>,

    /// Maximum time to keep retrying a locked database write
    #[serde(default = "default_max_lock_wait_ms")]
    pub max_lock_wait_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            problem_cap: default_problem_cap(),
            preview_sample_rows: None,
            max_lock_wait_ms: default_max_lock_wait_ms(),
        }
    }
}

/// Which column-mapping suggester backs `/ai/map-columns`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggesterKind {
    /// Built-in alias table
    #[default]
    Heuristic,
    /// External HTTP service
    Remote,
    /// Always returns an empty mapping
    None,
}

/// Column-mapping suggester configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuggesterConfig {
    #[serde(default)]
    pub kind: SuggesterKind,

    /// Endpoint receiving `{"headers": [...]}` (required for `remote`)
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_suggester_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SuggesterConfig {
    fn default() -> Self {
        Self {
            kind: SuggesterKind::default(),
            url: None,
            timeout_ms: default_suggester_timeout_ms(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_problem_cap() -> usize {
    10
}

fn default_max_lock_wait_ms() -> u64 {
    5000
}

fn default_suggester_timeout_ms() -> u64 {
    10_000
}

impl TomlConfig {
    /// Check cross-field constraints the deserializer cannot express
    pub fn validate(&self) -> Result<()> {
        if self.ingest.max_upload_bytes == 0 {
            return Err(Error::Config("ingest.max_upload_bytes must be > 0".to_string()));
        }
        if self.ingest.preview_sample_rows == Some(0) {
            return Err(Error::Config(
                "ingest.preview_sample_rows must be > 0 when set".to_string(),
            ));
        }
        if self.suggester.kind == SuggesterKind::Remote && self.suggester.url.is_none() {
            return Err(Error::Config(
                "suggester.url is required when suggester.kind = \"remote\"".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load and validate a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
    config.validate()?;
    Ok(config)
}

/// Load the TOML config if one exists, else compiled defaults
///
/// An explicitly given path must exist; the platform default is optional.
pub fn load_or_default(explicit: Option<&Path>, file_name: &str) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }
    match default_config_path(file_name) {
        Some(path) if path.exists() => load_toml_config(&path),
        _ => Ok(TomlConfig::default()),
    }
}

/// Platform config file location (`~/.config/emis/<file_name>` on Linux)
pub fn default_config_path(file_name: &str) -> Option<PathBuf> {
    if cfg!(target_os = "linux") {
        let user_config = dirs::config_dir().map(|d| d.join("emis").join(file_name));
        if let Some(path) = user_config.as_ref().filter(|p| p.exists()) {
            return Some(path.clone());
        }
        let system_config = PathBuf::from("/etc/emis").join(file_name);
        if system_config.exists() {
            return Some(system_config);
        }
        user_config
    } else {
        dirs::config_dir().map(|d| d.join("emis").join(file_name))
    }
}

/// Resolve the root folder: CLI → ENV → TOML → OS default
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("emis"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/emis"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("emis"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/emis"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("emis"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\emis"))
    } else {
        PathBuf::from("./emis_data")
    }
}

/// Database file inside a root folder
pub fn database_path(root_folder: &Path) -> PathBuf {
    root_folder.join(DATABASE_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TomlConfig::default();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.ingest.problem_cap, 10);
        assert_eq!(config.ingest.preview_sample_rows, None);
        assert_eq!(config.suggester.kind, SuggesterKind::Heuristic);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            port = 5800

            [ingest]
            problem_cap = 25
            "#,
        )
        .unwrap();

        assert_eq!(config.port, Some(5800));
        assert_eq!(config.ingest.problem_cap, 25);
        assert_eq!(config.ingest.max_lock_wait_ms, 5000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_remote_suggester_requires_url() {
        let config: TomlConfig = toml::from_str(
            r#"
            [suggester]
            kind = "remote"
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_zero_sample_rows_rejected() {
        let mut config = TomlConfig::default();
        config.ingest.preview_sample_rows = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_root_folder_wins() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };
        let resolved = resolve_root_folder(Some(Path::new("/from/cli")), &toml);
        assert_eq!(resolved, PathBuf::from("/from/cli"));
    }

    #[test]
    #[serial_test::serial]
    fn test_env_root_folder_beats_toml() {
        let toml = TomlConfig {
            root_folder: Some(PathBuf::from("/from/toml")),
            ..Default::default()
        };

        std::env::set_var(ROOT_FOLDER_ENV, "/from/env");
        let resolved = resolve_root_folder(None, &toml);
        std::env::remove_var(ROOT_FOLDER_ENV);
        assert_eq!(resolved, PathBuf::from("/from/env"));

        let resolved = resolve_root_folder(None, &toml);
        assert_eq!(resolved, PathBuf::from("/from/toml"));
    }

    #[test]
    fn test_database_path_joins_root() {
        assert_eq!(
            database_path(Path::new("/data/emis")),
            PathBuf::from("/data/emis/emis.db")
        );
    }
}
