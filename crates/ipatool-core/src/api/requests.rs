//! Request types for top-level operations.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{IpatoolError, Result};

/// Identifies the app a command targets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppTarget {
    pub track_id: Option<i64>,
    pub bundle_id: Option<String>,
}

impl AppTarget {
    pub fn bundle(bundle_id: impl Into<String>) -> Self {
        Self {
            track_id: None,
            bundle_id: Some(bundle_id.into()),
        }
    }

    pub fn track(track_id: i64) -> Self {
        Self {
            track_id: Some(track_id),
            bundle_id: None,
        }
    }

    /// Identifying flags for the tool, bundle form preferred.
    pub fn identifier_arguments(&self) -> Result<Vec<String>> {
        let bundle = self
            .bundle_id
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty());

        match (bundle, self.track_id) {
            (Some(bundle), _) => Ok(vec![
                "--bundle-identifier".to_string(),
                bundle.to_string(),
            ]),
            (None, Some(track_id)) => Ok(vec!["--app-id".to_string(), track_id.to_string()]),
            (None, None) => Err(IpatoolError::InvalidInput(
                "an app id or bundle identifier is required".into(),
            )),
        }
    }
}

/// Apple ID sign-in details.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
    pub auth_code: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .field("auth_code", &self.auth_code.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Parameters of `download`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownloadRequest {
    pub target: AppTarget,
    pub external_version_id: Option<String>,
    pub output: Option<PathBuf>,
    /// Acquire a license first when the account has none.
    pub auto_purchase: bool,
}

/// Result of `purchase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOutcome {
    /// The tool reported success; the app is now owned.
    Purchased,
    /// The command ran but did not report success.
    Finished,
}
