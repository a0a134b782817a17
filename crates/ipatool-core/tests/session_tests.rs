//! Integration tests for SearchSession: search, background refresh, purchase.

mod common;

use async_trait::async_trait;
use common::{api, Reply, ScriptedRunner, OWNED};
use ipatool_core::{
    ArtworkLookupService, IpatoolError, LookupResponse, LookupResult, LookupTransport,
    OwnershipState, PurchaseOutcome, Result, SearchSession,
};
use std::sync::Arc;

const SEARCH: &str = r#"{"count":3,"apps":[
    {"id":1,"bundleID":"com.Owned.App","name":"Owned"},
    {"id":2,"bundleID":"com.other.app","name":"Other"},
    {"id":3,"bundleID":"com.art.app","name":"Art","artworkURL":"https://direct.test/3.png"}
]}"#;

/// Serves 512px artwork for every identifier.
struct EveryIdTransport;

#[async_trait]
impl LookupTransport for EveryIdTransport {
    async fn fetch(&self, track_ids: &[i64]) -> Result<LookupResponse> {
        Ok(LookupResponse {
            results: track_ids
                .iter()
                .map(|&id| LookupResult {
                    track_id: id,
                    artwork_url512: Some(format!("https://lookup.test/{}.png", id)),
                    ..Default::default()
                })
                .collect(),
        })
    }
}

fn session(runner: Arc<ScriptedRunner>) -> SearchSession {
    SearchSession::new(api(runner), ArtworkLookupService::new(Arc::new(EveryIdTransport)))
}

fn search_runner() -> ScriptedRunner {
    ScriptedRunner::new()
        .reply("search apps --limit 10", Reply::ok(SEARCH))
        .reply("list-versions --bundle-identifier com.Owned.App", Reply::ok(OWNED))
}

#[tokio::test(start_paused = true)]
async fn test_search_refreshes_ownership_and_artwork() {
    let runner = Arc::new(search_runner());
    let session = session(runner.clone());

    let results = session.search("apps", 10).await.unwrap();
    assert_eq!(results.apps.len(), 3);
    session.wait_idle().await;

    let view = session.view();
    assert_eq!(view.len(), 3);
    assert_eq!(view[0].ownership, OwnershipState::Owned);
    assert_eq!(view[1].ownership, OwnershipState::NotOwnedOrFailed);
    assert_eq!(
        view[0].artwork.as_ref().map(|u| u.as_str()),
        Some("https://lookup.test/1.png")
    );
    assert_eq!(
        view[2].artwork.as_ref().map(|u| u.as_str()),
        Some("https://direct.test/3.png")
    );
    assert!(session.is_owned(&view[0].entry));
    assert!(!session.is_checking(&view[1].entry));
}

#[tokio::test(start_paused = true)]
async fn test_purchase_marks_entry_owned() {
    let runner = Arc::new(search_runner().reply(
        "purchase --bundle-identifier com.other.app",
        Reply::ok(r#"{"success":true}"#),
    ));
    let session = session(runner);

    session.search("apps", 10).await.unwrap();
    session.wait_idle().await;
    let other = session.results()[1].clone();
    assert_eq!(session.ownership(&other), OwnershipState::NotOwnedOrFailed);

    let outcome = session.purchase("com.other.app").await.unwrap();
    assert_eq!(outcome, PurchaseOutcome::Purchased);
    assert_eq!(session.ownership(&other), OwnershipState::Owned);
}

#[tokio::test(start_paused = true)]
async fn test_blank_search_keeps_previous_results() {
    let runner = Arc::new(search_runner());
    let session = session(runner.clone());

    session.search("apps", 10).await.unwrap();
    session.wait_idle().await;
    let generation = session.resolver().generation();

    assert!(matches!(
        session.search("   ", 10).await,
        Err(IpatoolError::InvalidInput(_))
    ));
    assert_eq!(session.results().len(), 3);
    assert_eq!(session.resolver().generation(), generation);
}

#[tokio::test(start_paused = true)]
async fn test_new_search_resets_ownership() {
    let runner = Arc::new(
        search_runner().reply("search nothing --limit 10", Reply::ok(r#"{"apps":[]}"#)),
    );
    let session = session(runner.clone());

    session.search("apps", 10).await.unwrap();
    session.wait_idle().await;
    assert!(!session.resolver().snapshot().is_empty());

    session.search("nothing", 10).await.unwrap();
    session.wait_idle().await;
    assert!(session.results().is_empty());
    assert!(session.resolver().snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_search_keeps_results_and_ownership() {
    let runner = Arc::new(search_runner().reply(
        "purchase --bundle-identifier com.other.app",
        Reply::ok(r#"{"success":true}"#),
    ));
    let session = session(runner);

    session.search("apps", 10).await.unwrap();
    session.wait_idle().await;
    session.purchase("com.other.app").await.unwrap();
    let generation = session.resolver().generation();
    let before: Vec<OwnershipState> = session.view().iter().map(|s| s.ownership).collect();
    assert_eq!(
        before,
        vec![
            OwnershipState::Owned,
            OwnershipState::Owned,
            OwnershipState::NotOwnedOrFailed
        ]
    );

    // Unscripted, so the tool reports a failure.
    assert!(matches!(
        session.search("broken", 10).await,
        Err(IpatoolError::CommandFailed(_))
    ));
    session.wait_idle().await;

    let after: Vec<OwnershipState> = session.view().iter().map(|s| s.ownership).collect();
    assert_eq!(after, before);
    assert_eq!(session.results().len(), 3);
    assert_eq!(session.resolver().generation(), generation);
}
