//! Configuration
//!
//! Settings come from, in order of precedence: command-line flags, the
//! environment (`TALLY_DB`), the optional `config.toml`, and built-in
//! defaults. The database passphrase is only ever read from `TALLY_DB_KEY`
//! (see `db::DB_KEY_ENV`), never from the file.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the database path
pub const DB_PATH_ENV: &str = "TALLY_DB";

pub const DEFAULT_DB_FILE: &str = "tally.db";
pub const DEFAULT_CURRENCY: &str = "MVR";

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub database_path: Option<PathBuf>,
    pub export_dir: Option<PathBuf>,
    /// Display only; amounts are stored without a currency
    pub default_currency: Option<String>,
}

/// Resolved settings
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub database_path: PathBuf,
    pub export_dir: PathBuf,
    pub default_currency: String,
}

/// Per-user data directory (`~/.local/share/tally` on Linux)
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tally"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tally").join("config.toml"))
}

/// Parse config from TOML content
pub fn parse_config(content: &str) -> Result<FileConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
}

/// Load the config file (override first, then default); a missing file means defaults
pub fn load_file_config(override_path: Option<&Path>) -> Result<FileConfig> {
    let path = match override_path {
        Some(path) => Some(path.to_path_buf()),
        None => default_config_path(),
    };
    match path {
        Some(path) if path.exists() => {
            let content = fs::read_to_string(&path).map_err(|e| {
                Error::Config(format!("Failed to read {}: {}", path.display(), e))
            })?;
            parse_config(&content)
        }
        _ => Ok(FileConfig::default()),
    }
}

impl Config {
    /// Combine the sources; earlier arguments win
    pub fn resolve(cli_db: Option<PathBuf>, env_db: Option<PathBuf>, file: FileConfig) -> Self {
        let dir = data_dir();
        Self {
            database_path: cli_db
                .or(env_db)
                .or(file.database_path)
                .unwrap_or_else(|| dir.join(DEFAULT_DB_FILE)),
            export_dir: file.export_dir.unwrap_or(dir),
            default_currency: file
                .default_currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        }
    }

    /// Resolve against the real environment and config file
    pub fn load(cli_db: Option<PathBuf>, config_path: Option<&Path>) -> Result<Self> {
        let env_db = std::env::var_os(DB_PATH_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let file = load_file_config(config_path)?;
        Ok(Self::resolve(cli_db, env_db, file))
    }
}
