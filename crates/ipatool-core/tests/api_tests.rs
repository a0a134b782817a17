//! Integration tests for the IpatoolApi public interface.

mod common;

use common::{api, Reply, ScriptedRunner};
use ipatool_core::{AppTarget, Credentials, DownloadRequest, IpatoolError, PurchaseOutcome};
use std::path::PathBuf;
use std::sync::Arc;

const SEARCH: &str = r#"{"count":2,"apps":[
    {"id":284882215,"bundleID":"com.facebook.Facebook","name":"Facebook","version":"1.0","price":0},
    {"id":389801252,"bundleID":"com.burbn.instagram","name":"Instagram","version":"2.0","price":0}
]}"#;

#[tokio::test]
async fn test_search_decodes_entries() {
    let runner = Arc::new(
        ScriptedRunner::new().reply("search social --limit 5", Reply::ok(SEARCH)),
    );
    let api = api(runner.clone());

    let results = api.search("  social ", 5).await.unwrap();

    assert_eq!(results.count, Some(2));
    assert_eq!(results.apps[0].track_id, Some(284882215));
    assert_eq!(results.apps[1].bundle(), Some("com.burbn.instagram"));
    assert_eq!(runner.joined_calls(), vec!["search social --limit 5"]);
}

#[tokio::test]
async fn test_blank_search_term_runs_nothing() {
    let runner = Arc::new(ScriptedRunner::new());
    let api = api(runner.clone());

    let err = api.search(" \t", 10).await.unwrap_err();

    assert!(matches!(err, IpatoolError::InvalidInput(_)));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_purchase_reports_outcome() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .reply(
                "purchase --bundle-identifier com.yes",
                Reply::ok(r#"{"success":true}"#),
            )
            .reply(
                "purchase --bundle-identifier com.no",
                Reply::ok(r#"{"success":false}"#),
            ),
    );
    let api = api(runner);

    assert_eq!(api.purchase("com.yes").await.unwrap(), PurchaseOutcome::Purchased);
    assert_eq!(api.purchase("com.no").await.unwrap(), PurchaseOutcome::Finished);
}

#[tokio::test]
async fn test_purchase_failure_surfaces_tool_message() {
    let runner = Arc::new(ScriptedRunner::new().reply(
        "purchase --bundle-identifier com.paid",
        Reply::fail(r#"{"error":"failed to purchase app: paid apps are not supported"}"#),
    ));
    let api = api(runner);

    match api.purchase("com.paid").await {
        Err(IpatoolError::CommandFailed(message)) => {
            assert!(message.contains("paid apps are not supported"));
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_payload_is_a_decode_error() {
    let runner = Arc::new(
        ScriptedRunner::new().reply("purchase --bundle-identifier com.odd", Reply::ok("done")),
    );
    let api = api(runner);

    assert!(matches!(
        api.purchase("com.odd").await,
        Err(IpatoolError::Decode { .. })
    ));
}

#[tokio::test]
async fn test_version_operations_use_identifier_flags() {
    let runner = Arc::new(
        ScriptedRunner::new()
            .reply(
                "list-versions --app-id 42",
                Reply::ok(r#"{"externalVersionIdentifiers":["100","200"],"success":true}"#),
            )
            .reply(
                "get-version-metadata --bundle-identifier com.x --external-version-id 200",
                Reply::ok(
                    r#"{"displayVersion":"2.0","externalVersionID":"200","releaseDate":"2024-01-02T03:04:05Z"}"#,
                ),
            ),
    );
    let api = api(runner);

    let versions = api.list_versions(&AppTarget::track(42)).await.unwrap();
    assert_eq!(versions.external_version_ids, vec!["100", "200"]);

    let metadata = api
        .version_metadata(&AppTarget::bundle("com.x"), "200")
        .await
        .unwrap();
    assert_eq!(metadata.display_version.as_deref(), Some("2.0"));
    assert!(metadata.release_date.is_some());

    assert!(matches!(
        api.list_versions(&AppTarget::default()).await,
        Err(IpatoolError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_download_arguments() {
    let runner = Arc::new(ScriptedRunner::new().reply(
        "download --bundle-identifier com.x --external-version-id 7 --output /tmp/x.ipa --purchase",
        Reply::ok(r#"{"output":"/tmp/x.ipa","purchased":true,"success":true}"#),
    ));
    let api = api(runner);

    let request = DownloadRequest {
        target: AppTarget::bundle("com.x"),
        external_version_id: Some("7".into()),
        output: Some(PathBuf::from("/tmp/x.ipa")),
        auto_purchase: true,
    };
    let result = api.download(&request).await.unwrap();
    assert_eq!(result.output, Some(PathBuf::from("/tmp/x.ipa")));
    assert_eq!(result.purchased, Some(true));
}

#[tokio::test]
async fn test_login_passes_auth_code() {
    let runner = Arc::new(ScriptedRunner::new().reply(
        "auth login --email me@example.com --password hunter2 --auth-code 123456",
        Reply::ok(r#"{"email":"me@example.com","name":"Me","success":true}"#),
    ));
    let api = api(runner);

    let credentials = Credentials {
        email: "me@example.com".into(),
        password: "hunter2".into(),
        auth_code: Some("123456".into()),
    };
    let account = api.login(&credentials).await.unwrap();
    assert_eq!(account.name.as_deref(), Some("Me"));
    assert!(!format!("{:?}", credentials).contains("hunter2"));
}
