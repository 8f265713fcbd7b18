//! Configuration system for the journal chat dev server.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/journal-chat-devserver/config.toml`)
//! 4. Compiled defaults

use std::path::{Path, PathBuf};

use crate::state::SeedUser;

/// Errors that can occur when loading dev server configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration or seed file.
    #[error("failed to read {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse a TOML file.
    #[error("failed to parse TOML: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct DevConfigFile {
    server: ServerFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    bind_addr: Option<String>,
    seed_file: Option<PathBuf>,
}

/// Seed file: a list of `[[users]]` tables.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SeedFile {
    users: Vec<SeedUser>,
}

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// CLI arguments for the dev server.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Journal chat development server")]
pub struct DevCliArgs {
    /// Address to bind to.
    #[arg(short, long, env = "JOURNAL_CHAT_DEV_ADDR")]
    pub bind: Option<String>,

    /// Path to config file (default: `~/.config/journal-chat-devserver/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TOML file with the `[[users]]` to seed instead of the built-in accounts.
    #[arg(long)]
    pub seed: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "JOURNAL_CHAT_DEV_LOG")]
    pub log_level: String,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved dev server configuration.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Address to bind the server to.
    pub bind_addr: String,
    /// Seed file; the built-in accounts are used when absent.
    pub seed_file: Option<PathBuf>,
    /// Log level filter string.
    pub log_level: String,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            seed_file: None,
            log_level: "info".to_string(),
        }
    }
}

impl DevServerConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &DevCliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Priority: CLI > file > default.
    fn resolve(cli: &DevCliArgs, file: &DevConfigFile) -> Self {
        let defaults = Self::default();
        Self {
            bind_addr: cli
                .bind
                .clone()
                .or_else(|| file.server.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            seed_file: cli.seed.clone().or_else(|| file.server.seed_file.clone()),
            log_level: cli.log_level.clone(),
        }
    }

    /// Accounts to seed: the seed file's, or the built-in ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the seed file cannot be read or parsed.
    pub fn seed(&self) -> Result<Vec<SeedUser>, ConfigError> {
        match &self.seed_file {
            Some(path) => load_seed(path),
            None => Ok(crate::state::default_seed()),
        }
    }
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn read(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

fn load_seed(path: &Path) -> Result<Vec<SeedUser>, ConfigError> {
    let file: SeedFile = toml::from_str(&read(path)?)?;
    Ok(file.users)
}

fn load_config_file(explicit_path: Option<&Path>) -> Result<DevConfigFile, ConfigError> {
    if let Some(p) = explicit_path {
        return Ok(toml::from_str(&read(p)?)?);
    }
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(DevConfigFile::default());
    };
    let path = config_dir.join("journal-chat-devserver").join("config.toml");

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DevConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
