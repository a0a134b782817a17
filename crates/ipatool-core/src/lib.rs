//! ipatool core - headless orchestration for the `ipatool` command-line tool.
//!
//! This crate runs the external tool, decodes its JSON payloads, keeps a log
//! of every invocation and tracks which catalog entries the signed-in account
//! already owns. It has no UI of its own; the `ipatool-orchestrator` binary is
//! one consumer.
//!
//! # Example
//!
//! ```rust,ignore
//! use ipatool_core::{ArtworkLookupService, IpatoolApi, SearchSession};
//!
//! #[tokio::main]
//! async fn main() -> ipatool_core::Result<()> {
//!     let api = IpatoolApi::builder().build()?;
//!     let session = SearchSession::new(api, ArtworkLookupService::public()?);
//!
//!     let results = session.search("maps", 25).await?;
//!     println!("Found {} apps", results.apps.len());
//!
//!     session.wait_idle().await;
//!     for status in session.view() {
//!         println!("{} {:?}", status.entry.display_name(), status.ownership);
//!     }
//!     Ok(())
//! }
//! ```

pub mod artwork;
pub mod config;
pub mod error;
pub mod gate;
pub mod models;
pub mod ownership;
pub mod process;
pub mod session;

mod api;

pub use api::{AppTarget, Credentials, DownloadRequest, IpatoolApi, IpatoolApiBuilder, PurchaseOutcome};
pub use artwork::{ArtworkLookupService, ItunesLookupClient, LookupResponse, LookupResult, LookupTransport};
pub use config::{OutputFormat, Preferences};
pub use error::{IpatoolError, Result};
pub use gate::{AdmissionGate, GatePermit};
pub use models::{
    AccountInfo, CatalogEntry, DownloadResult, SearchResults, StatusResult, ToolEvent, VersionList,
    VersionMetadata,
};
pub use ownership::{OwnershipKey, OwnershipResolver, OwnershipState, OwnershipUpdate, RetryPolicy};
pub use process::{
    CommandEnvironment, CommandOutput, CommandRunner, InvocationLog, InvocationRecord, ProcessRunner,
};
pub use session::{EntryStatus, SearchSession};
