// src/pipeline.rs
//! Session driver: one collection run with at most one token refresh.

use crate::auth::TokenLifecycle;
use crate::collector::Collector;
use crate::error::AppError;
use crate::types::AccessToken;

/// Supplies a new access token after the API rejected the current one.
#[async_trait::async_trait]
pub trait CredentialRefresher: Send + Sync {
    async fn refresh_access_token(&self) -> Result<AccessToken, AppError>;
}

#[async_trait::async_trait]
impl CredentialRefresher for TokenLifecycle {
    async fn refresh_access_token(&self) -> Result<AccessToken, AppError> {
        Ok(self.refresh_stored().await?.access_token)
    }
}

/// Runs the collector; on an expired token refreshes once and runs again.
///
/// Whether to resume comes from the collector's pagination mode. A second
/// expiry, or any other error, is returned as is.
pub async fn run_with_refresh(
    collector: &mut Collector,
    refresher: &dyn CredentialRefresher,
    max_pages: u32,
) -> Result<u32, AppError> {
    match collector.run_configured(max_pages).await {
        Err(e) if e.is_auth_expired() => {
            log::warn!("{}", e);
            log::info!("Refreshing access token and retrying once");
            let token = refresher.refresh_access_token().await?;
            collector.set_access_token(token);
            collector.run_configured(max_pages).await
        }
        other => other,
    }
}
