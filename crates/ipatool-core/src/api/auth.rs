//! Account operations.

use tracing::info;

use super::{arguments, Credentials, IpatoolApi};
use crate::error::{IpatoolError, Result};
use crate::models::{AccountInfo, StatusResult};

impl IpatoolApi {
    /// Sign in with an Apple ID.
    pub async fn login(&self, credentials: &Credentials) -> Result<AccountInfo> {
        let email = credentials.email.trim();
        if email.is_empty() || credentials.password.is_empty() {
            return Err(IpatoolError::InvalidInput(
                "email and password are required".into(),
            ));
        }

        let mut args = arguments([
            "auth",
            "login",
            "--email",
            email,
            "--password",
            credentials.password.as_str(),
        ]);
        if let Some(code) = credentials
            .auth_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        {
            args.extend(arguments(["--auth-code", code]));
        }

        let account: AccountInfo = self.environment.query(&args).await?;
        info!("Signed in as {}", account.email.as_deref().unwrap_or(email));
        Ok(account)
    }

    /// Details of the signed-in account.
    pub async fn account_info(&self) -> Result<AccountInfo> {
        self.environment.query(&arguments(["auth", "info"])).await
    }

    /// Sign out and forget stored credentials.
    pub async fn revoke(&self) -> Result<StatusResult> {
        self.environment.query(&arguments(["auth", "revoke"])).await
    }
}
