//! Spawning of the tool as a child process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{CommandEnvironment, CommandOutput, CommandRunner, InvocationLog, InvocationRecord};
use crate::config::Preferences;
use crate::error::{IpatoolError, Result};

/// Full argument vector for a subcommand under the given preferences.
///
/// Behavior flags always follow the subcommand arguments in a fixed order so
/// identical requests produce identical argument vectors.
pub fn invocation_arguments(arguments: &[String], preferences: &Preferences) -> Vec<String> {
    let mut argv = arguments.to_vec();
    argv.push("--format".to_string());
    argv.push(preferences.output_format.as_str().to_string());
    if preferences.non_interactive {
        argv.push("--non-interactive".to_string());
    }
    if preferences.verbose_logs {
        argv.push("--verbose".to_string());
    }
    if !preferences.keychain_passphrase.is_empty() {
        argv.push("--keychain-passphrase".to_string());
        argv.push(preferences.keychain_passphrase.clone());
    }
    argv
}

/// Runs the tool found at the preferences' `ipatool_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

/// The log entry for one invocation, written exactly once.
///
/// If the invocation future is dropped before [`finish`](Self::finish) or
/// [`fail`](Self::fail), the entry is written on drop as abandoned.
struct PendingRecord<'a> {
    log: &'a InvocationLog,
    program: String,
    argv: Vec<String>,
    started_at: DateTime<Utc>,
    clock: Instant,
    written: bool,
}

impl<'a> PendingRecord<'a> {
    fn start(log: &'a InvocationLog, program: String, argv: Vec<String>) -> Self {
        Self {
            log,
            program,
            argv,
            started_at: Utc::now(),
            clock: Instant::now(),
            written: false,
        }
    }

    fn finish(mut self, stdout: &[u8], stderr: &[u8], exit_code: i32) {
        self.write(stdout, stderr, exit_code);
    }

    fn fail(mut self, message: &str) {
        self.write(b"", message.as_bytes(), -1);
    }

    fn write(&mut self, stdout: &[u8], stderr: &[u8], exit_code: i32) {
        if self.written {
            return;
        }
        self.written = true;
        self.log.append(InvocationRecord::new(
            self.program.clone(),
            &self.argv,
            self.started_at,
            self.clock.elapsed(),
            stdout,
            stderr,
            exit_code,
        ));
    }
}

impl Drop for PendingRecord<'_> {
    fn drop(&mut self) {
        if !self.written {
            debug!("{} abandoned before completion", self.program);
            self.write(b"", b"abandoned before completion", -1);
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        arguments: &[String],
        environment: &CommandEnvironment,
    ) -> Result<CommandOutput> {
        let preferences = environment.preferences();
        let program = preferences.ipatool_path.clone();
        let program_name = program.display().to_string();
        let argv = invocation_arguments(arguments, preferences);
        let record = PendingRecord::start(environment.log(), program_name.clone(), argv.clone());

        let child = Command::new(&program)
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let child = match child {
            Ok(child) => child,
            Err(e) => {
                let message = if e.kind() == std::io::ErrorKind::NotFound {
                    "executable not found".to_string()
                } else {
                    e.to_string()
                };
                warn!("Failed to spawn {}: {}", program_name, message);
                record.fail(&message);
                return Err(IpatoolError::Execution {
                    path: program,
                    message,
                    source: Some(e),
                });
            }
        };

        // Dropping the wait future on timeout drops the child, which kills it.
        let waited = match preferences.command_timeout() {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(waited) => waited,
                Err(_) => {
                    warn!("{} timed out after {:?}", program_name, limit);
                    record.fail(&format!("timed out after {:?}", limit));
                    return Err(IpatoolError::Timeout(limit));
                }
            },
            None => child.wait_with_output().await,
        };

        let output = match waited {
            Ok(output) => output,
            Err(e) => {
                record.fail(&e.to_string());
                return Err(IpatoolError::Execution {
                    path: program,
                    message: format!("failed to collect output: {}", e),
                    source: Some(e),
                });
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            "{} {} finished with exit code {}",
            program_name,
            arguments.first().map(String::as_str).unwrap_or_default(),
            exit_code
        );
        record.finish(&output.stdout, &output.stderr, exit_code);

        Ok(CommandOutput {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }
}
