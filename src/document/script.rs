//! Facade binding through an external automation helper
//!
//! Every operation runs `program [args...] <verb> [operands...]` and reads
//! the trimmed stdout:
//!
//! | verb                      | stdout                  |
//! |---------------------------|-------------------------|
//! | `ping`                    | ignored, exit status    |
//! | `active-path`             | path, or empty for none |
//! | `is-saved`                | `true` / `false`        |
//! | `save`                    | ignored                 |
//! | `set-track-revisions off` | ignored                 |
//! | `accept-revisions`        | ignored                 |
//! | `replace <format> <file>` | ignored                 |

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docbridge_shared::ContentFormat;
use serde::Deserialize;
use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{DocumentControl, DocumentError};

/// Helper program configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptConfig {
    /// Helper executable
    pub program: String,
    /// Arguments placed before the verb
    #[serde(default)]
    pub args: Vec<String>,
    /// Bound on a single helper invocation
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_call_timeout_ms() -> u64 {
    30_000
}

impl ScriptConfig {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Document host driven by a helper program
pub struct ScriptDocument {
    config: ScriptConfig,
    connected: bool,
}

impl ScriptDocument {
    pub fn new(config: ScriptConfig) -> Self {
        Self {
            config,
            connected: false,
        }
    }

    /// Run one helper verb and return its trimmed stdout
    async fn run(&self, verb: &str, operands: &[&str]) -> Result<String, DocumentError> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.args)
            .arg(verb)
            .args(operands)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let after = self.config.call_timeout();
        let output = timeout(after, command.output())
            .await
            .map_err(|_| DocumentError::Timeout {
                verb: verb.into(),
                after,
            })??;

        if !output.status.success() {
            return Err(DocumentError::HelperFailed {
                verb: verb.into(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn ping(&mut self) -> bool {
        if !self.connected {
            return false;
        }
        if let Err(e) = self.run("ping", &[]).await {
            warn!("[DOC] Document host disconnected: {}", e);
            self.connected = false;
            return false;
        }
        true
    }

    async fn read_saved(&self) -> Result<bool, DocumentError> {
        let output = self.run("is-saved", &[]).await?;
        match output.as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(DocumentError::UnexpectedOutput {
                verb: "is-saved".into(),
                output,
            }),
        }
    }

    async fn replace_staged(&self, staged: &NamedTempFile, format: ContentFormat) -> Result<(), DocumentError> {
        let file = staged.path().to_string_lossy().into_owned();

        if let Err(e) = self.run("set-track-revisions", &["off"]).await {
            warn!("[DOC] Could not suspend revision tracking: {}", e);
        }
        if let Err(e) = self.run("accept-revisions", &[]).await {
            warn!("[DOC] Could not accept prior revisions: {}", e);
        }

        let result = self.run("replace", &[format.as_str(), file.as_str()]).await;

        if let Err(e) = self.run("set-track-revisions", &["off"]).await {
            warn!("[DOC] Could not restore revision tracking to off: {}", e);
        }

        result.map(|_| ())
    }
}

/// Write the content to a temp file with the extension the host expects
fn stage_content(content: &str, format: ContentFormat) -> Result<NamedTempFile, DocumentError> {
    let bytes = match format {
        ContentFormat::Base64 => STANDARD.decode(content.trim())?,
        ContentFormat::Html | ContentFormat::Plain => content.as_bytes().to_vec(),
    };

    let mut staged = tempfile::Builder::new()
        .prefix("doc_bridge_")
        .suffix(&format!(".{}", format.extension()))
        .tempfile()?;
    staged.write_all(&bytes)?;
    staged.flush()?;
    Ok(staged)
}

#[async_trait]
impl DocumentControl for ScriptDocument {
    async fn connect(&mut self) -> bool {
        if self.connected {
            return true;
        }
        match self.run("ping", &[]).await {
            Ok(_) => {
                self.connected = true;
                info!("[DOC] Connected to document host via {}", self.config.program);
                true
            }
            Err(e) => {
                debug!("[DOC] Document host not reachable: {}", e);
                false
            }
        }
    }

    async fn is_connected(&mut self) -> bool {
        self.ping().await
    }

    async fn current_document_path(&mut self) -> Option<String> {
        if !self.ping().await {
            return None;
        }
        match self.run("active-path", &[]).await {
            Ok(path) if !path.is_empty() => Some(path),
            Ok(_) => None,
            Err(e) => {
                warn!("[DOC] Could not read document path: {}", e);
                None
            }
        }
    }

    async fn is_document_saved(&mut self) -> Option<bool> {
        if !self.ping().await {
            return None;
        }
        match self.read_saved().await {
            Ok(saved) => Some(saved),
            Err(e) => {
                debug!("[DOC] Could not read saved state: {}", e);
                None
            }
        }
    }

    async fn save(&mut self) -> bool {
        if !self.ping().await {
            return false;
        }
        match self.run("save", &[]).await {
            Ok(_) => true,
            Err(e) => {
                warn!("[DOC] Save failed: {}", e);
                false
            }
        }
    }

    async fn replace(&mut self, content: &str, format: ContentFormat) -> bool {
        if !self.ping().await {
            return false;
        }

        let staged = match stage_content(content, format) {
            Ok(staged) => staged,
            Err(e) => {
                warn!("[DOC] Could not stage replacement content: {}", e);
                return false;
            }
        };

        match self.replace_staged(&staged, format).await {
            Ok(()) => true,
            Err(e) => {
                warn!("[DOC] Replace failed: {}", e);
                false
            }
        }
    }
}
