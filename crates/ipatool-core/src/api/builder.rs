//! Builder for configuring IpatoolApi initialization.

use std::sync::Arc;

use crate::config::Preferences;
use crate::error::{IpatoolError, Result};
use crate::process::{CommandEnvironment, CommandRunner, InvocationLog, ProcessRunner};
use crate::IpatoolApi;

/// Builder for [`IpatoolApi`].
///
/// # Example
///
/// ```rust,ignore
/// let api = IpatoolApi::builder()
///     .preferences(Preferences::load(path)?)
///     .build()?;
/// ```
#[derive(Default)]
pub struct IpatoolApiBuilder {
    preferences: Option<Preferences>,
    runner: Option<Arc<dyn CommandRunner>>,
    log: Option<Arc<InvocationLog>>,
}

impl IpatoolApiBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preferences to apply. Default: [`Preferences::default`].
    pub fn preferences(mut self, preferences: Preferences) -> Self {
        self.preferences = Some(preferences);
        self
    }

    /// Replace the process runner, e.g. with a scripted one in tests.
    pub fn runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    /// Share an existing invocation log.
    pub fn log(mut self, log: Arc<InvocationLog>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn build(self) -> Result<IpatoolApi> {
        let preferences = self.preferences.unwrap_or_default();
        if preferences.ipatool_path.as_os_str().is_empty() {
            return Err(IpatoolError::Config {
                message: "ipatool path is empty".to_string(),
            });
        }

        let runner = self
            .runner
            .unwrap_or_else(|| Arc::new(ProcessRunner::new()));
        let log = self.log.unwrap_or_default();
        Ok(IpatoolApi::new(CommandEnvironment::new(runner, preferences, log)))
    }
}
