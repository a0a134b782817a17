//! Append-only log of tool invocations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

use crate::config::ToolConfig;

/// One finished (or failed-to-start) invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationRecord {
    pub program: String,
    /// Arguments after redaction of secret values.
    pub arguments: Vec<String>,
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub success: bool,
}

impl InvocationRecord {
    pub fn new(
        program: impl Into<String>,
        arguments: &[String],
        started_at: DateTime<Utc>,
        duration: Duration,
        stdout: &[u8],
        stderr: &[u8],
        exit_code: i32,
    ) -> Self {
        Self {
            program: program.into(),
            arguments: redact_arguments(arguments),
            started_at,
            duration,
            stdout: String::from_utf8_lossy(stdout).into_owned(),
            stderr: String::from_utf8_lossy(stderr).into_owned(),
            exit_code,
            success: exit_code == 0,
        }
    }

    /// Shell-like rendering of the command line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.arguments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Replace the value following any secret-bearing flag.
pub fn redact_arguments(arguments: &[String]) -> Vec<String> {
    let mut redacted = Vec::with_capacity(arguments.len());
    let mut hide_next = false;
    for argument in arguments {
        if hide_next {
            redacted.push(ToolConfig::REDACTED.to_string());
            hide_next = false;
            continue;
        }
        hide_next = ToolConfig::SECRET_FLAGS.contains(&argument.as_str());
        redacted.push(argument.clone());
    }
    redacted
}

/// Ordered record of invocations, kept until explicitly cleared.
#[derive(Debug, Default)]
pub struct InvocationLog {
    records: Mutex<Vec<InvocationRecord>>,
}

impl InvocationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: InvocationRecord) {
        debug!(
            exit_code = record.exit_code,
            elapsed_ms = record.duration.as_millis() as u64,
            "{}",
            record.command_line()
        );
        self.records().push(record);
    }

    /// Records, most recent first.
    pub fn snapshot(&self) -> Vec<InvocationRecord> {
        self.records().iter().rev().cloned().collect()
    }

    pub fn clear(&self) {
        self.records().clear();
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while appending cannot leave the Vec half-written, so a
    // poisoned lock is still safe to use.
    fn records(&self) -> MutexGuard<'_, Vec<InvocationRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

mod duration_millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
