//! Bridge configuration
//!
//! Settings come from an optional TOML file, then individual command-line
//! flags (or their `DOC_BRIDGE_*` environment fallbacks) override fields.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::command::DispatchConfig;
use crate::connection::TransportConfig;
use crate::document::{DocumentConfig, ScriptConfig};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid controller endpoint: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("Script backend selected but no helper program configured")]
    MissingScriptProgram,

    #[error("poll_interval_ms must be greater than zero")]
    ZeroPollInterval,
}

/// Document backend selectable from the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// In-process simulated editor
    Memory,
    /// External automation helper
    Script,
}

/// Command-line interface of the bridge
#[derive(Parser, Debug, Default)]
#[command(name = "doc-bridge", version, about = "Remote command bridge for a document editor")]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, env = "DOC_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Controller host
    #[arg(long, env = "DOC_BRIDGE_HOST")]
    pub host: Option<String>,

    /// Controller port
    #[arg(long, env = "DOC_BRIDGE_PORT")]
    pub port: Option<u16>,

    /// WebSocket path on the controller
    #[arg(long, env = "DOC_BRIDGE_PATH")]
    pub path: Option<String>,

    /// Dispatch loop period in milliseconds
    #[arg(long, env = "DOC_BRIDGE_POLL_INTERVAL_MS")]
    pub poll_interval_ms: Option<u64>,

    /// Delay between reconnection attempts in milliseconds
    #[arg(long, env = "DOC_BRIDGE_RECONNECT_DELAY_MS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Document backend
    #[arg(long, value_enum, env = "DOC_BRIDGE_BACKEND")]
    pub backend: Option<Backend>,

    /// Helper program for the script backend
    #[arg(long, env = "DOC_BRIDGE_SCRIPT")]
    pub script: Option<String>,
}

/// Complete bridge configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub transport: TransportConfig,
    pub dispatch: DispatchConfig,
    pub document: DocumentConfig,
}

impl BridgeConfig {
    /// Parse a TOML document
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read a TOML config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Load the file named on the command line (if any) and apply the flag
    /// overrides on top
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load_from(path)?,
            None => Self::default(),
        };
        config.apply(cli)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the bridge cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        self.endpoint()?;
        Ok(())
    }

    /// Apply command-line overrides
    pub fn apply(&mut self, cli: &Cli) -> Result<(), ConfigError> {
        if let Some(host) = &cli.host {
            self.transport.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.transport.port = port;
        }
        if let Some(path) = &cli.path {
            self.transport.path = path.clone();
        }
        if let Some(ms) = cli.poll_interval_ms {
            self.dispatch.poll_interval_ms = ms;
        }
        if let Some(ms) = cli.reconnect_delay_ms {
            self.transport.reconnect_delay_ms = ms;
        }

        match (cli.backend, &cli.script) {
            (Some(Backend::Memory), _) => {
                if !matches!(self.document, DocumentConfig::Memory { .. }) {
                    self.document = DocumentConfig::default();
                }
            }
            (Some(Backend::Script), Some(program)) | (None, Some(program)) => match &mut self.document {
                DocumentConfig::Script(script) => script.program = program.clone(),
                DocumentConfig::Memory { .. } => {
                    self.document = DocumentConfig::Script(ScriptConfig::new(program.clone()))
                }
            },
            (Some(Backend::Script), None) => {
                if !matches!(self.document, DocumentConfig::Script(_)) {
                    return Err(ConfigError::MissingScriptProgram);
                }
            }
            (None, None) => {}
        }
        Ok(())
    }

    /// Controller endpoint URL
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        Ok(self.transport.endpoint()?)
    }
}
