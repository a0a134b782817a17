//! Centralized configuration for the ipatool core.
//!
//! Constants for the resolver, the artwork lookup and the tool itself, plus
//! the user-facing [`Preferences`] handed to every invocation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{IpatoolError, Result};

/// External tool configuration.
pub struct ToolConfig;

impl ToolConfig {
    pub const EXECUTABLE_NAME: &'static str = "ipatool";
    pub const FALLBACK_PATH: &'static str = "/usr/local/bin/ipatool";
    pub const WELL_KNOWN_PATHS: [&'static str; 2] =
        ["/opt/homebrew/bin/ipatool", "/usr/local/bin/ipatool"];
    pub const REDACTED: &'static str = "***";
    pub const SECRET_FLAGS: [&'static str; 2] = ["--password", "--keychain-passphrase"];
}

/// Ownership resolution configuration.
pub struct ResolverConfig;

impl ResolverConfig {
    pub const DEFAULT_CONCURRENCY: usize = 4;
    pub const ATTEMPTS_PER_CANDIDATE: u32 = 2;
    pub const RETRY_DELAY: Duration = Duration::from_millis(400);
    pub const CHECK_TIMEOUT: Duration = Duration::from_secs(60);
    pub const UPDATE_CHANNEL_CAPACITY: usize = 256;
}

/// Artwork lookup configuration.
pub struct LookupConfig;

impl LookupConfig {
    pub const ENDPOINT: &'static str = "https://itunes.apple.com/lookup";
    pub const BATCH_SIZE: usize = 50;
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const USER_AGENT: &'static str = "ipatool-orchestrator/0.3";
}

/// Output format requested from the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    #[default]
    Json,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Behavioral preferences applied to every tool invocation.
///
/// The core only ever reads these; persisting them is the caller's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub ipatool_path: PathBuf,
    pub non_interactive: bool,
    pub verbose_logs: bool,
    pub output_format: OutputFormat,
    pub keychain_passphrase: String,
    /// Per-invocation timeout in seconds. `None` waits indefinitely.
    pub command_timeout_secs: Option<u64>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            ipatool_path: crate::process::detect_executable()
                .unwrap_or_else(|| PathBuf::from(ToolConfig::FALLBACK_PATH)),
            non_interactive: true,
            verbose_logs: false,
            output_format: OutputFormat::Json,
            keychain_passphrase: String::new(),
            command_timeout_secs: None,
        }
    }
}

impl Preferences {
    /// Load preferences from a JSON file, filling unset fields with defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| IpatoolError::io_with_path(e, path))?;
        serde_json::from_str(&raw).map_err(|e| IpatoolError::Config {
            message: format!("Invalid preferences file {}: {}", path.display(), e),
        })
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }
}
