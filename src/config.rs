//! Configuration for the ticketboard CLI and server.
//!
//! Settings live in `.ticketboard/board.toml` (optional). Values are layered
//! CLI flag → environment → file → default.
//!
//! ```toml
//! [store]
//! api_url = "http://localhost:8080/api/v1"
//! token = "secret"
//! timeout_secs = 30
//!
//! [server]
//! port = 8080
//! db_path = ".ticketboard/tickets.db"
//!
//! [logging]
//! filter = "info"
//! json = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::server::{DEFAULT_PORT, ServerConfig};
use crate::store::http::{DEFAULT_TIMEOUT_SECS, HttpTicketStore};

pub const CONFIG_DIR: &str = ".ticketboard";
pub const CONFIG_FILE: &str = "board.toml";
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";

pub const ENV_API_URL: &str = "TICKETBOARD_API_URL";
pub const ENV_TOKEN: &str = "TICKETBOARD_TOKEN";

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_db_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("tickets.db")
}

fn default_filter() -> String {
    "info".to_string()
}

/// Remote ticket store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSection {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Bearer token sent with every request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// `ticketboard serve` settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            db_path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
        }
    }
}

/// The complete board.toml structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BoardToml {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

impl BoardToml {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse board.toml")
    }

    /// Load `<dir>/board.toml`, or defaults if it does not exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize board.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !is_http_url(&self.store.api_url) {
            warnings.push(format!(
                "Invalid api_url '{}': should start with http:// or https://",
                self.store.api_url
            ));
        }
        if self.store.timeout_secs == 0 {
            warnings.push("timeout_secs is 0: every store request will time out".to_string());
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.filter) {
            warnings.push(format!("Invalid logging filter '{}': {}", self.logging.filter, e));
        }
        warnings
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Resolved configuration: board.toml merged with environment and CLI.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub toml: BoardToml,
    /// CLI override for the ticket API base URL.
    pub cli_api_url: Option<String>,
    pub verbose: bool,
    pub cli_json_logs: bool,
}

impl BoardConfig {
    /// Load from an explicit file (which must exist) or from
    /// `.ticketboard/board.toml` under the working directory.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let toml = match config_path {
            Some(path) => BoardToml::load(path)?,
            None => BoardToml::load_or_default(Path::new(CONFIG_DIR))?,
        };
        Ok(Self::from_toml(toml))
    }

    pub fn from_toml(toml: BoardToml) -> Self {
        Self {
            toml,
            cli_api_url: None,
            verbose: false,
            cli_json_logs: false,
        }
    }

    pub fn with_cli_args(
        config_path: Option<&Path>,
        api_url: Option<String>,
        verbose: bool,
        json_logs: bool,
    ) -> Result<Self> {
        let mut config = Self::load(config_path)?;
        config.cli_api_url = api_url;
        config.verbose = verbose;
        config.cli_json_logs = json_logs;
        Ok(config)
    }

    /// Ticket API base URL (CLI → env → file → default).
    pub fn api_url(&self) -> String {
        self.cli_api_url
            .clone()
            .or_else(|| env_value(ENV_API_URL))
            .unwrap_or_else(|| self.toml.store.api_url.clone())
    }

    /// Bearer token (env → file).
    pub fn token(&self) -> Option<String> {
        env_value(ENV_TOKEN).or_else(|| self.toml.store.token.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.toml.store.timeout_secs)
    }

    /// Default tracing filter; `--verbose` raises it to `debug`.
    pub fn log_filter(&self) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            self.toml.logging.filter.clone()
        }
    }

    pub fn json_logs(&self) -> bool {
        self.cli_json_logs || self.toml.logging.json
    }

    /// Server settings with CLI overrides applied.
    pub fn server_config(&self, port: Option<u16>, db_path: Option<PathBuf>, dev_mode: bool) -> ServerConfig {
        ServerConfig {
            port: port.unwrap_or(self.toml.server.port),
            db_path: db_path.unwrap_or_else(|| self.toml.server.db_path.clone()),
            dev_mode,
        }
    }

    pub fn ticket_store(&self) -> Result<HttpTicketStore> {
        HttpTicketStore::new(&self.api_url(), self.token(), self.timeout())
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.toml.validate();
        if let Some(url) = &self.cli_api_url
            && !is_http_url(url)
        {
            warnings.push(format!("Invalid --api-url '{}'", url));
        }
        warnings
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}
