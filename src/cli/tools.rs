//! `locally tools` - Small helpers

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use clap::{Subcommand, ValueEnum};
use std::process::ExitCode;

/// Helper tools
#[derive(Subcommand, Debug)]
pub enum ToolsAction {
    /// Encode or decode base64
    Base64 {
        /// Direction
        #[arg(value_enum)]
        direction: Base64Direction,
        /// Value to convert
        value: String,
    },
}

/// Base64 direction
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Base64Direction {
    /// Text to base64
    Encode,
    /// Base64 to text
    Decode,
}

/// Converts `value` in `direction`
pub fn base64(direction: Base64Direction, value: &str) -> Result<String> {
    match direction {
        Base64Direction::Encode => Ok(STANDARD.encode(value)),
        Base64Direction::Decode => {
            let bytes = STANDARD
                .decode(value.trim())
                .context("Value is not valid base64")?;
            String::from_utf8(bytes).context("Decoded value is not UTF-8 text")
        }
    }
}

/// Executes a `tools` subcommand
pub fn run(action: ToolsAction) -> Result<ExitCode> {
    match action {
        ToolsAction::Base64 { direction, value } => println!("{}", base64(direction, &value)?),
    }
    Ok(ExitCode::SUCCESS)
}
