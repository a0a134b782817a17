//! Data types shared across the core: catalog entries and the result
//! payloads the tool prints on stdout.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// A distributable item as returned by a search.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "trackID", alias = "id", default)]
    pub track_id: Option<i64>,
    #[serde(rename = "bundleID", default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(rename = "artworkURL", default)]
    pub artwork_url: Option<String>,
}

impl CatalogEntry {
    /// Bundle identifier, ignoring blank values.
    pub fn bundle(&self) -> Option<&str> {
        self.bundle_id
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
    }

    /// Directly supplied artwork, if it parses as a URL.
    pub fn direct_artwork(&self) -> Option<Url> {
        self.artwork_url.as_deref().and_then(|u| Url::parse(u).ok())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }
}

/// Marker for payload shapes the event decoder recognizes.
pub trait ToolEvent: DeserializeOwned {
    /// Human readable shape name used in decode errors.
    const SHAPE: &'static str;
}

/// Payload of `search`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub apps: Vec<CatalogEntry>,
    #[serde(default)]
    pub count: Option<usize>,
}

impl ToolEvent for SearchResults {
    const SHAPE: &'static str = "search results";
}

/// Payload of commands that only report success, such as `purchase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResult {
    pub success: bool,
}

impl ToolEvent for StatusResult {
    const SHAPE: &'static str = "status";
}

/// Payload of `list-versions`. Decoding one at all confirms ownership.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionList {
    #[serde(rename = "externalVersionIdentifiers", default)]
    pub external_version_ids: Vec<String>,
    #[serde(rename = "bundleID", default)]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
}

impl ToolEvent for VersionList {
    const SHAPE: &'static str = "version list";
}

/// Payload of `get-version-metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionMetadata {
    #[serde(default)]
    pub display_version: Option<String>,
    #[serde(rename = "externalVersionID", default)]
    pub external_version_id: Option<String>,
    #[serde(default)]
    pub release_date: Option<DateTime<Utc>>,
}

impl ToolEvent for VersionMetadata {
    const SHAPE: &'static str = "version metadata";
}

/// Payload of `auth login` and `auth info`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
}

impl ToolEvent for AccountInfo {
    const SHAPE: &'static str = "account info";
}

/// Payload of `download`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DownloadResult {
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub purchased: Option<bool>,
    #[serde(default)]
    pub success: Option<bool>,
}

impl ToolEvent for DownloadResult {
    const SHAPE: &'static str = "download";
}

/// Failure report the tool prints alongside a non-zero exit.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ErrorEvent {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ToolEvent for ErrorEvent {
    const SHAPE: &'static str = "error";
}

impl ErrorEvent {
    pub fn into_message(self) -> Option<String> {
        self.error
            .or(self.message)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_accepts_tool_field_names() {
        let entry: CatalogEntry = serde_json::from_str(
            r#"{"id": 389801252, "bundleID": "com.burbn.instagram", "name": "Instagram",
                "version": "300.0", "price": 0}"#,
        )
        .unwrap();
        assert_eq!(entry.track_id, Some(389801252));
        assert_eq!(entry.bundle(), Some("com.burbn.instagram"));
        assert_eq!(entry.price, Some(0.0));
    }

    #[test]
    fn test_blank_bundle_is_ignored() {
        let entry = CatalogEntry {
            bundle_id: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(entry.bundle(), None);
    }

    #[test]
    fn test_error_event_prefers_error_field() {
        let event: ErrorEvent =
            serde_json::from_str(r#"{"error": " boom ", "message": "other"}"#).unwrap();
        assert_eq!(event.into_message().as_deref(), Some("boom"));
    }
}
