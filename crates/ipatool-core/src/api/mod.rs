//! Top-level user operations.
//!
//! Each submodule contains `impl IpatoolApi` blocks for one area of the
//! tool. Unlike per-item ownership checks, these operations surface the first
//! terminal error to the caller.

mod auth;
mod builder;
mod catalog;
mod requests;

pub use builder::IpatoolApiBuilder;
pub(crate) use catalog::normalize_term;
pub use requests::{AppTarget, Credentials, DownloadRequest, PurchaseOutcome};

use std::sync::Arc;

use crate::process::{CommandEnvironment, InvocationLog};

/// Entry point for running tool commands.
#[derive(Debug, Clone)]
pub struct IpatoolApi {
    environment: CommandEnvironment,
}

impl IpatoolApi {
    pub fn new(environment: CommandEnvironment) -> Self {
        Self { environment }
    }

    pub fn builder() -> IpatoolApiBuilder {
        IpatoolApiBuilder::new()
    }

    /// Snapshot handed to every invocation made through this API.
    pub fn environment(&self) -> &CommandEnvironment {
        &self.environment
    }

    pub fn invocation_log(&self) -> &Arc<InvocationLog> {
        self.environment.log()
    }
}

fn arguments<const N: usize>(raw: [&str; N]) -> Vec<String> {
    raw.iter().map(|s| s.to_string()).collect()
}
