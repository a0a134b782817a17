//! Invocation of the external `ipatool` executable.
//!
//! - [`runner`] - spawns the tool and captures its streams
//! - [`decode`] - pulls typed payloads out of captured stdout
//! - [`log`] - append-only record of every invocation
//!
//! [`CommandEnvironment`] bundles the runner, the user's preferences and the
//! log sink. It is cloned into every unit of work so that a scheduled task
//! never reads shared mutable settings.

mod decode;
mod log;
mod runner;

pub use decode::decode;
pub use log::{redact_arguments, InvocationLog, InvocationRecord};
pub use runner::{invocation_arguments, ProcessRunner};

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{Preferences, ToolConfig};
use crate::error::{IpatoolError, Result};
use crate::models::{ErrorEvent, ToolEvent};

/// Raw result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Best available description of why the invocation failed.
    pub fn failure_message(&self) -> String {
        if let Some(message) = decode::<ErrorEvent>(&self.stdout)
            .ok()
            .and_then(ErrorEvent::into_message)
        {
            return message;
        }

        for stream in [&self.stderr, &self.stdout] {
            let text = String::from_utf8_lossy(stream);
            let text = text.trim();
            if !text.is_empty() {
                return text.to_string();
            }
        }

        format!("exit code {}", self.exit_code)
    }
}

/// Something that can run the tool with a list of subcommand arguments.
///
/// [`ProcessRunner`] is the production implementation; tests substitute
/// scripted runners.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the tool once and capture its output.
    ///
    /// Fails only when the tool could not be run at all; a non-zero exit is
    /// still `Ok`.
    async fn run(
        &self,
        arguments: &[String],
        environment: &CommandEnvironment,
    ) -> Result<CommandOutput>;
}

/// Immutable snapshot of everything an invocation needs.
#[derive(Clone)]
pub struct CommandEnvironment {
    runner: Arc<dyn CommandRunner>,
    preferences: Arc<Preferences>,
    log: Arc<InvocationLog>,
}

impl std::fmt::Debug for CommandEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEnvironment")
            .field("preferences", &self.preferences)
            .field("log_len", &self.log.len())
            .finish()
    }
}

impl CommandEnvironment {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        preferences: Preferences,
        log: Arc<InvocationLog>,
    ) -> Self {
        Self {
            runner,
            preferences: Arc::new(preferences),
            log,
        }
    }

    /// Environment backed by the real process runner.
    pub fn with_process_runner(preferences: Preferences, log: Arc<InvocationLog>) -> Self {
        Self::new(Arc::new(ProcessRunner::new()), preferences, log)
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn log(&self) -> &Arc<InvocationLog> {
        &self.log
    }

    /// Copy of this environment that times out invocations after `timeout`
    /// unless the preferences already specify a timeout.
    pub fn with_default_timeout(&self, timeout: Duration) -> Self {
        if self.preferences.command_timeout_secs.is_some() {
            return self.clone();
        }
        let mut preferences = (*self.preferences).clone();
        preferences.command_timeout_secs = Some(timeout.as_secs().max(1));
        Self {
            runner: self.runner.clone(),
            preferences: Arc::new(preferences),
            log: self.log.clone(),
        }
    }

    /// Run the tool without interpreting the exit code.
    pub async fn run(&self, arguments: &[String]) -> Result<CommandOutput> {
        self.runner.run(arguments, self).await
    }

    /// Run the tool and turn a non-zero exit into [`IpatoolError::CommandFailed`].
    pub async fn execute(&self, arguments: &[String]) -> Result<CommandOutput> {
        let output = self.run(arguments).await?;
        if output.success() {
            return Ok(output);
        }
        let message = output.failure_message();
        debug!(
            "{} exited with {}: {}",
            arguments.first().map(String::as_str).unwrap_or("ipatool"),
            output.exit_code,
            message
        );
        Err(IpatoolError::CommandFailed(message))
    }

    /// Run the tool and decode its stdout as `T`.
    pub async fn query<T: ToolEvent>(&self, arguments: &[String]) -> Result<T> {
        let output = self.execute(arguments).await?;
        decode::<T>(&output.stdout)
    }
}

/// Locate the tool on this machine.
///
/// Searches `PATH` first, then the usual install locations.
pub fn detect_executable() -> Option<PathBuf> {
    let from_path = std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths)
                .map(|dir| dir.join(ToolConfig::EXECUTABLE_NAME))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let well_known = ToolConfig::WELL_KNOWN_PATHS.iter().map(PathBuf::from);
    let user_local = dirs::home_dir().map(|home| {
        home.join(".local")
            .join("bin")
            .join(ToolConfig::EXECUTABLE_NAME)
    });

    from_path
        .into_iter()
        .chain(well_known)
        .chain(user_local)
        .find(|candidate| candidate.is_file())
}
