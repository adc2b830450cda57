//! Document Control Facade
//!
//! The boundary over the externally automated document editor. The dispatch
//! loop is the only caller, so the trait takes `&mut self`.

mod memory;
mod script;

pub use memory::MemoryDocument;
pub use script::{ScriptConfig, ScriptDocument};

use async_trait::async_trait;
use docbridge_shared::ContentFormat;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Failures inside a facade binding. They are logged and reported to the
/// dispatch loop as a plain `false`/`None`.
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Document host not connected")]
    NotConnected,

    #[error("No active document")]
    NoActiveDocument,

    #[error("Invalid base64 content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Helper `{verb}` timed out after {after:?}")]
    Timeout { verb: String, after: Duration },

    #[error("Helper `{verb}` failed ({status}): {stderr}")]
    HelperFailed {
        verb: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("Helper `{verb}` printed unexpected output: {output:?}")]
    UnexpectedOutput { verb: String, output: String },
}

/// Operations the bridge needs from the editing application
#[async_trait]
pub trait DocumentControl: Send {
    /// Bind to the running application. Returns true on success.
    async fn connect(&mut self) -> bool;

    /// Actively check liveness. A failed check releases any cached handle.
    async fn is_connected(&mut self) -> bool;

    /// Full path of the active document
    async fn current_document_path(&mut self) -> Option<String>;

    /// Saved flag of the active document; `None` when there is no active
    /// document or the check failed
    async fn is_document_saved(&mut self) -> Option<bool>;

    /// Save the active document
    async fn save(&mut self) -> bool;

    /// Replace the whole content of the active document. Revision tracking
    /// is suspended for the duration and left off afterwards.
    async fn replace(&mut self, content: &str, format: ContentFormat) -> bool;

    /// Whether the active document lives at `expected`
    async fn path_matches(&mut self, expected: &str) -> bool {
        match self.current_document_path().await {
            Some(current) => paths_equal(&current, expected),
            None => false,
        }
    }
}

/// Lowercase and unify separators to backslashes
pub fn normalize_path(path: &str) -> String {
    path.to_ascii_lowercase().replace('/', "\\")
}

/// Case-insensitive, separator-insensitive path equality
pub fn paths_equal(current: &str, expected: &str) -> bool {
    let current = normalize_path(current);
    let expected = normalize_path(expected);
    if current != expected {
        tracing::warn!(
            "[DOC] Path mismatch. Current: {}, Target: {}",
            current,
            expected
        );
        return false;
    }
    true
}

/// Which facade binding to run
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DocumentConfig {
    /// In-process simulated editor
    Memory {
        /// Path of the initially open document
        #[serde(default = "default_memory_path")]
        path: String,
    },
    /// External automation helper program
    Script(ScriptConfig),
}

fn default_memory_path() -> String {
    "untitled.docx".into()
}

impl Default for DocumentConfig {
    fn default() -> Self {
        DocumentConfig::Memory {
            path: default_memory_path(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("C:/Docs/Report.DOCX"), "c:\\docs\\report.docx");
    }

    #[test]
    fn test_paths_equal_ignores_case_and_separators() {
        assert!(paths_equal("C:\\Docs\\Report.docx", "c:/docs/report.DOCX"));
        assert!(!paths_equal("C:\\Docs\\Report.docx", "C:\\Docs\\Other.docx"));
        assert!(!paths_equal("C:\\Docs\\Report.docx", "Report.docx"));
    }

    #[tokio::test]
    async fn test_default_path_matches() {
        let mut doc = MemoryDocument::with_document("C:\\Docs\\Report.docx");
        assert!(doc.connect().await);
        assert!(doc.path_matches("c:/docs/report.docx").await);
        assert!(!doc.path_matches("c:/docs/other.docx").await);

        doc.close_document();
        assert!(!doc.path_matches("c:/docs/report.docx").await);
    }

    #[test]
    fn test_document_config_from_toml() {
        let config: DocumentConfig = toml::from_str(
            r#"
            backend = "script"
            program = "word-helper"
            args = ["--profile", "default"]
            "#,
        )
        .unwrap();
        match config {
            DocumentConfig::Script(script) => {
                assert_eq!(script.program, "word-helper");
                assert_eq!(script.args, vec!["--profile", "default"]);
                assert_eq!(script.call_timeout_ms, 30_000);
            }
            other => panic!("unexpected config: {:?}", other),
        }

        let config: DocumentConfig = toml::from_str(r#"backend = "memory""#).unwrap();
        assert!(matches!(config, DocumentConfig::Memory { ref path } if path == "untitled.docx"));
    }
}
