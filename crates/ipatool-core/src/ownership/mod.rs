//! Ownership ("already purchased") resolution for catalog entries.
//!
//! - [`OwnershipKey`] - canonical identity used for deduplication
//! - [`OwnershipResolver`] - bounded, deduplicating, retrying checks
//! - [`Generation`] - result-set tag for discarding stale completions
//! - [`retry_async`] - the fixed-delay retry loop used per candidate

mod generation;
mod resolver;
mod retry;

pub use generation::Generation;
pub use resolver::{OwnershipResolver, OwnershipUpdate};
pub use retry::{retry_async, RetryPolicy, RetryStats};

use serde::Serialize;

use crate::models::CatalogEntry;

/// Stable identity of a catalog entry for status checks.
///
/// Bundle identifiers win over track identifiers and compare
/// case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct OwnershipKey(String);

impl OwnershipKey {
    /// Derive the key for an entry; `None` when it has no usable identifier.
    pub fn for_entry(entry: &CatalogEntry) -> Option<Self> {
        entry
            .bundle()
            .map(Self::for_bundle)
            .or_else(|| entry.track_id.map(Self::for_track))
    }

    pub fn for_bundle(bundle_id: &str) -> Self {
        Self(format!("bundle::{}", bundle_id.trim().to_lowercase()))
    }

    pub fn for_track(track_id: i64) -> Self {
        Self(format!("track::{}", track_id))
    }

    /// Every key an entry can be known under, bundle form first.
    pub fn all_for_entry(entry: &CatalogEntry) -> Vec<Self> {
        entry
            .bundle()
            .map(Self::for_bundle)
            .into_iter()
            .chain(entry.track_id.map(Self::for_track))
            .collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnershipKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolution progress for one key within a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipState {
    #[default]
    Unknown,
    Pending,
    Owned,
    /// Either confirmed not owned or the check could not complete.
    NotOwnedOrFailed,
}

impl OwnershipState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OwnershipState::Owned | OwnershipState::NotOwnedOrFailed)
    }
}

/// Verification commands for an entry, bundle form first.
///
/// Each succeeds only when the signed-in account owns the app.
pub fn candidate_commands(entry: &CatalogEntry) -> Vec<Vec<String>> {
    let mut commands = Vec::new();
    if let Some(bundle) = entry.bundle() {
        commands.push(vec![
            "list-versions".to_string(),
            "--bundle-identifier".to_string(),
            bundle.to_string(),
        ]);
    }
    if let Some(track_id) = entry.track_id {
        commands.push(vec![
            "list-versions".to_string(),
            "--app-id".to_string(),
            track_id.to_string(),
        ]);
    }
    commands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(track_id: Option<i64>, bundle_id: Option<&str>) -> CatalogEntry {
        CatalogEntry {
            track_id,
            bundle_id: bundle_id.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_bundle_key_is_preferred_and_lowercased() {
        let key = OwnershipKey::for_entry(&entry(Some(999), Some("Com.Foo.App"))).unwrap();
        assert_eq!(key.as_str(), "bundle::com.foo.app");
        assert_eq!(
            OwnershipKey::for_entry(&entry(None, Some("com.foo.app"))),
            Some(key)
        );
    }

    #[test]
    fn test_track_key_fallback() {
        let key = OwnershipKey::for_entry(&entry(Some(42), Some(""))).unwrap();
        assert_eq!(key.to_string(), "track::42");
        assert_eq!(OwnershipKey::for_entry(&entry(None, None)), None);
    }

    #[test]
    fn test_candidates_prefer_bundle_form() {
        let commands = candidate_commands(&entry(Some(7), Some("com.foo")));
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0], ["list-versions", "--bundle-identifier", "com.foo"]);
        assert_eq!(commands[1], ["list-versions", "--app-id", "7"]);
        assert!(candidate_commands(&entry(None, None)).is_empty());
    }

    #[test]
    fn test_all_keys_for_entry() {
        let keys = OwnershipKey::all_for_entry(&entry(Some(7), Some("com.foo")));
        assert_eq!(
            keys,
            vec![OwnershipKey::for_bundle("com.foo"), OwnershipKey::for_track(7)]
        );
    }
}
