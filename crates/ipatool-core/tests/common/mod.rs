//! Scripted stand-in for the tool, shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use ipatool_core::{
    CommandEnvironment, CommandOutput, CommandRunner, IpatoolApi, InvocationLog, Preferences,
    Result,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LICENSE_REQUIRED: &str =
    r#"{"error":"failed to get versions: a license is required","level":"error"}"#;
pub const OWNED: &str = r#"{"bundleID":"com.foo.app","externalVersionIdentifiers":["1","2"],"success":true}"#;

/// Canned response for one invocation.
#[derive(Debug, Clone)]
pub struct Reply {
    pub exit_code: i32,
    pub stdout: String,
}

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.to_string(),
        }
    }

    pub fn fail(stdout: &str) -> Self {
        Self {
            exit_code: 1,
            stdout: stdout.to_string(),
        }
    }
}

/// Answers invocations from a script keyed by the space-joined arguments.
///
/// Unscripted commands fail with a generic error. Every call is recorded and
/// the number of calls running at once is tracked.
#[derive(Default)]
pub struct ScriptedRunner {
    replies: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<Vec<String>>>,
    active: AtomicUsize,
    peak: AtomicUsize,
    latency: Option<Duration>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn reply(self, command: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(command.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn joined_calls(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.join(" ")).collect()
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        arguments: &[String],
        _environment: &CommandEnvironment,
    ) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(arguments.to_vec());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let reply = self
            .replies
            .lock()
            .unwrap()
            .get(&arguments.join(" "))
            .cloned()
            .unwrap_or_else(|| Reply::fail(r#"{"error":"something went wrong"}"#));
        self.active.fetch_sub(1, Ordering::SeqCst);

        Ok(CommandOutput {
            stdout: reply.stdout.into_bytes(),
            stderr: Vec::new(),
            exit_code: reply.exit_code,
        })
    }
}

pub fn environment(runner: Arc<ScriptedRunner>) -> CommandEnvironment {
    CommandEnvironment::new(runner, Preferences::default(), Arc::new(InvocationLog::new()))
}

pub fn api(runner: Arc<ScriptedRunner>) -> IpatoolApi {
    IpatoolApi::builder()
        .runner(runner)
        .build()
        .expect("api should build with default preferences")
}
