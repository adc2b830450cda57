//! Line-oriented operator console
//!
//! ```text
//! save
//! replace <html|base64|plain> <file> [checkPath]
//! status
//! quit
//! ```

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use docbridge_shared::ContentFormat;
use std::path::{Path, PathBuf};

/// One parsed console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Save,
    Replace {
        format: ContentFormat,
        file: PathBuf,
        check_path: String,
    },
    Status,
    Help,
    Quit,
}

pub const USAGE: &str = "commands: save | replace <html|base64|plain> <file> [checkPath] | status | help | quit";

/// Parse a console line; blank lines yield `None`
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Ok(None);
    };

    let command = match verb {
        "save" => ConsoleCommand::Save,
        "status" => ConsoleCommand::Status,
        "help" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        "replace" => {
            let (Some(format), Some(file)) = (words.next(), words.next()) else {
                bail!("usage: replace <html|base64|plain> <file> [checkPath]");
            };
            let format = format.parse::<ContentFormat>().map_err(anyhow::Error::msg)?;
            ConsoleCommand::Replace {
                format,
                file: PathBuf::from(file),
                // Paths may contain spaces
                check_path: words.collect::<Vec<_>>().join(" "),
            }
        }
        other => bail!("unknown command: {}", other),
    };
    Ok(Some(command))
}

/// Read a file into the wire form of `format`
pub fn load_content(format: ContentFormat, file: &Path) -> Result<String> {
    match format {
        ContentFormat::Base64 => {
            let bytes = std::fs::read(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            Ok(STANDARD.encode(bytes))
        }
        ContentFormat::Html | ContentFormat::Plain => std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display())),
    }
}
