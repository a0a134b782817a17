//! Search, purchase, version and download operations.

use tracing::info;

use super::{arguments, AppTarget, DownloadRequest, IpatoolApi, PurchaseOutcome};
use crate::error::{IpatoolError, Result};
use crate::models::{DownloadResult, SearchResults, StatusResult, VersionList, VersionMetadata};

/// Trimmed search term, or `InvalidInput` when blank.
pub(crate) fn normalize_term(term: &str) -> Result<&str> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return Err(IpatoolError::InvalidInput("enter a search term".into()));
    }
    Ok(trimmed)
}

impl IpatoolApi {
    /// Search the store for `term`, returning at most `limit` entries.
    pub async fn search(&self, term: &str, limit: u32) -> Result<SearchResults> {
        let term = normalize_term(term)?;
        let mut args = arguments(["search", term]);
        args.extend(arguments(["--limit", limit.max(1).to_string().as_str()]));

        let mut results: SearchResults = self.environment.query(&args).await?;
        if results.count.is_none() {
            results.count = Some(results.apps.len());
        }
        info!("Search for '{}' returned {} apps", term, results.apps.len());
        Ok(results)
    }

    /// Acquire a license for the app with `bundle_id`.
    pub async fn purchase(&self, bundle_id: &str) -> Result<PurchaseOutcome> {
        let bundle_id = bundle_id.trim();
        if bundle_id.is_empty() {
            return Err(IpatoolError::InvalidInput(
                "a bundle identifier is required".into(),
            ));
        }

        let status: StatusResult = self
            .environment
            .query(&arguments(["purchase", "--bundle-identifier", bundle_id]))
            .await?;
        if status.success {
            info!("Purchased {}", bundle_id);
            Ok(PurchaseOutcome::Purchased)
        } else {
            Ok(PurchaseOutcome::Finished)
        }
    }

    /// List the external version identifiers available for an app.
    pub async fn list_versions(&self, target: &AppTarget) -> Result<VersionList> {
        let mut args = arguments(["list-versions"]);
        args.extend(target.identifier_arguments()?);
        self.environment.query(&args).await
    }

    /// Fetch metadata for one external version of an app.
    pub async fn version_metadata(
        &self,
        target: &AppTarget,
        external_version_id: &str,
    ) -> Result<VersionMetadata> {
        let external_version_id = external_version_id.trim();
        if external_version_id.is_empty() {
            return Err(IpatoolError::InvalidInput(
                "an external version identifier is required".into(),
            ));
        }

        let mut args = arguments(["get-version-metadata"]);
        args.extend(target.identifier_arguments()?);
        args.extend(arguments(["--external-version-id", external_version_id]));
        self.environment.query(&args).await
    }

    /// Download an app package.
    pub async fn download(&self, request: &DownloadRequest) -> Result<DownloadResult> {
        let mut args = arguments(["download"]);
        args.extend(request.target.identifier_arguments()?);
        if let Some(version) = request
            .external_version_id
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
        {
            args.extend(arguments(["--external-version-id", version]));
        }
        if let Some(output) = &request.output {
            args.push("--output".to_string());
            args.push(output.display().to_string());
        }
        if request.auto_purchase {
            args.push("--purchase".to_string());
        }

        let result: DownloadResult = self.environment.query(&args).await?;
        info!(
            "Downloaded {}",
            result
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "package".to_string())
        );
        Ok(result)
    }
}
