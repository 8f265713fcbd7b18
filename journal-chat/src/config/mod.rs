//! Configuration system for the journal chat client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/journal-chat/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error. The bearer token is
//! never read from the file.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::session::Credential;
use crate::transport::ConnectorConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    /// A URL setting is not usable.
    #[error("invalid {field}: {reason}")]
    InvalidUrl {
        /// Which setting.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    transport: TransportFileConfig,
    presence: PresenceFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    api_base: Option<String>,
    socket_url: Option<String>,
}

/// `[transport]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct TransportFileConfig {
    reconnect_attempts: Option<u32>,
    reconnect_delay_ms: Option<u64>,
    connect_timeout_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

/// `[presence]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct PresenceFileConfig {
    poll_interval_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST API root, e.g. `https://host/api`.
    pub api_base: String,
    /// Event channel URL (`ws://` or `wss://`).
    pub socket_url: String,
    /// Bearer token. Only ever comes from the CLI or the environment.
    pub token: Option<Credential>,
    /// Automatic reconnect attempts before giving up.
    pub reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Upper bound on a single dial.
    pub connect_timeout: Duration,
    /// Capacity of the transport event channel.
    pub channel_capacity: usize,
    /// Presence refresh period. Also bounds each presence request.
    pub poll_interval: Duration,
}

const DEFAULT_API_BASE: &str = "http://127.0.0.1:3000/api";

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            socket_url: "ws://127.0.0.1:3000/ws".to_string(),
            token: None,
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(1000),
            connect_timeout: Duration::from_secs(10),
            channel_capacity: 256,
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// If `--config` is given and the file does not exist, returns an
    /// error. Otherwise the default path is tried and silently ignored if
    /// missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config file cannot be read or parsed,
    /// or if a resolved URL is invalid.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Self::resolve(cli, &file)
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. When no socket URL is configured it
    /// is derived from the API base.
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base = cli
            .api_base
            .clone()
            .or_else(|| file.server.api_base.clone())
            .unwrap_or(defaults.api_base);
        let api_url = parse_url("api_base", &api_base, &["http", "https"])?;

        let socket_url = match cli
            .socket_url
            .clone()
            .or_else(|| file.server.socket_url.clone())
        {
            Some(explicit) => parse_url("socket_url", &explicit, &["ws", "wss"])?.to_string(),
            None => derive_socket_url(&api_url)?,
        };

        Ok(Self {
            api_base,
            socket_url,
            token: cli
                .token
                .as_deref()
                .map(Credential::new)
                .filter(|c| !c.is_blank()),
            reconnect_attempts: file
                .transport
                .reconnect_attempts
                .unwrap_or(defaults.reconnect_attempts),
            reconnect_delay: file
                .transport
                .reconnect_delay_ms
                .map_or(defaults.reconnect_delay, Duration::from_millis),
            connect_timeout: file
                .transport
                .connect_timeout_secs
                .map_or(defaults.connect_timeout, Duration::from_secs),
            channel_capacity: file
                .transport
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
            poll_interval: file
                .presence
                .poll_interval_secs
                .map_or(defaults.poll_interval, Duration::from_secs),
        })
    }

    /// Build the [`ConnectorConfig`] for the event channel.
    #[must_use]
    pub fn connector_config(&self) -> ConnectorConfig {
        ConnectorConfig {
            url: self.socket_url.clone(),
            reconnect_attempts: self.reconnect_attempts,
            reconnect_delay: self.reconnect_delay,
            connect_timeout: self.connect_timeout,
            request_timeout: self.poll_interval,
            channel_capacity: self.channel_capacity,
        }
    }
}

/// CLI arguments parsed by clap.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Author/admin chat client for the journal platform")]
pub struct CliArgs {
    /// REST API root (e.g. `https://host/api`).
    #[arg(long, env = "JOURNAL_CHAT_API")]
    pub api_base: Option<String>,

    /// WebSocket URL of the messaging server (default: derived from the API root).
    #[arg(long, env = "JOURNAL_CHAT_SOCKET")]
    pub socket_url: Option<String>,

    /// Bearer token of the logged-in user.
    #[arg(long, env = "JOURNAL_CHAT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Path to config file (default: `~/.config/journal-chat/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "JOURNAL_CHAT_LOG")]
    pub log_level: String,

    /// Path to log file (default: `$TMPDIR/journal-chat.log`).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn parse_url(field: &'static str, raw: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::InvalidUrl {
            field,
            reason: format!("unsupported scheme `{}`", url.scheme()),
        });
    }
    Ok(url)
}

/// `http(s)://host[:port]/anything` → `ws(s)://host[:port]/ws`.
fn derive_socket_url(api: &Url) -> Result<String, ConfigError> {
    let scheme = if api.scheme() == "https" { "wss" } else { "ws" };
    let mut socket = api.clone();
    socket
        .set_scheme(scheme)
        .map_err(|()| ConfigError::InvalidUrl {
            field: "api_base",
            reason: "cannot derive a socket URL".to_string(),
        })?;
    socket.set_path("/ws");
    socket.set_query(None);
    socket.set_fragment(None);
    Ok(socket.to_string())
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            return Ok(ConfigFile::default());
        };
        config_dir.join("journal-chat").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
