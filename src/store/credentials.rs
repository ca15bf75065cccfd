// src/store/credentials.rs
//! The persisted OAuth credential set.

use super::atomic::{read_json, restrict_to_owner, write_json};
use crate::error::AppError;
use crate::types::{AccessToken, RefreshToken};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Tokens as returned by the token endpoint, plus when they were received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    pub access_token: AccessToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<RefreshToken>,
    /// Lifetime of the access token in seconds, as issued.
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obtained_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl CredentialSet {
    /// Keeps `previous` when the endpoint did not rotate the refresh token.
    pub fn retaining_refresh_token(mut self, previous: Option<&RefreshToken>) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous.cloned();
        }
        self
    }

    /// When the access token stops working, if it is known.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        if self.expires_in == 0 {
            return None;
        }
        let lifetime = i64::try_from(self.expires_in).ok()?;
        self.obtained_at
            .map(|obtained| obtained + Duration::seconds(lifetime))
    }

    /// Whether the token is expired (or within `skew_secs` of it) at `now`.
    ///
    /// Unknown expiry counts as not expired; the API's 401 is the fallback.
    pub fn is_expired_at(&self, now: DateTime<Utc>, skew_secs: i64) -> bool {
        self.expires_at()
            .is_some_and(|expires| now + Duration::seconds(skew_secs) >= expires)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scope.split_whitespace()
    }
}

/// Token file on disk, readable only by its owner.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored set, `None` when nothing was stored yet.
    pub fn load_optional(&self) -> Result<Option<CredentialSet>, AppError> {
        read_json::<CredentialSet>(&self.path)
    }

    /// Loads the stored set, failing when the authorization flow never ran.
    pub fn load(&self) -> Result<CredentialSet, AppError> {
        self.load_optional()?.ok_or_else(|| {
            AppError::MissingConfiguration(format!(
                "{} not found; run `xlikes auth` first",
                self.path.display()
            ))
        })
    }

    pub fn save(&self, set: &CredentialSet) -> Result<(), AppError> {
        write_json(&self.path, set)?;
        restrict_to_owner(&self.path)?;
        log::info!(
            "Saved tokens -> {} (access {}, refresh {})",
            self.path.display(),
            set.access_token.masked(),
            set.refresh_token
                .as_ref()
                .map(RefreshToken::masked)
                .unwrap_or_else(|| "none".to_string())
        );
        Ok(())
    }
}
