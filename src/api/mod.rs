// src/api/mod.rs
//! X API interaction: reading the liked posts of an account.
//!
//! Layers, bottom-up: `client` performs one HTTP exchange, `rate_limit`
//! classifies statuses and absorbs 429s, `parser` turns bodies into pages.
//! [`LikesApi`] ties them together for the collector.

pub mod client;
pub mod parser;
pub mod rate_limit;
pub mod responses;

use crate::config::CollectorConfig;
use crate::error::AppError;
use crate::types::{AccessToken, AccountId, ItemId};
use client::HttpRequest;
use rate_limit::RateLimitedTransport;
use responses::PageResult;

pub use client::{HttpReply, HttpTransport, ReqwestTransport};
pub use rate_limit::{Clock, RetryPolicy, SystemClock};

/// Authenticated access to the liked-posts endpoint.
pub struct LikesApi {
    transport: RateLimitedTransport,
    config: CollectorConfig,
    token: AccessToken,
}

impl LikesApi {
    pub fn new(transport: RateLimitedTransport, config: CollectorConfig, token: AccessToken) -> Self {
        Self {
            transport,
            config,
            token,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Installs a freshly refreshed access token for subsequent calls.
    pub fn set_access_token(&mut self, token: AccessToken) {
        log::debug!("Access token replaced ({})", token.masked());
        self.token = token;
    }

    /// Builds the page request for `account`.
    ///
    /// `since_id` constrains the query to newer items; a `pagination_token`
    /// continues a previous page.
    pub fn page_request(
        &self,
        account: &AccountId,
        since_id: Option<&ItemId>,
        pagination_token: Option<&str>,
    ) -> HttpRequest {
        let url = format!(
            "{}/users/{}/liked_tweets",
            self.config.api_base.trim_end_matches('/'),
            account.as_str()
        );
        let mut request = HttpRequest::get(url)
            .with_bearer(self.token.clone())
            .with_query("max_results", self.config.max_results.to_string())
            .with_query("expansions", self.config.expansions.clone());
        for (name, fields) in &self.config.field_selectors {
            request = request.with_query(name.clone(), fields.clone());
        }
        if let Some(since_id) = since_id {
            request = request.with_query("since_id", since_id.as_str());
        }
        if let Some(token) = pagination_token {
            request = request.with_query("pagination_token", token);
        }
        request
    }

    /// Issues a page request and returns the successful reply untouched.
    pub async fn fetch_raw(&self, request: &HttpRequest) -> Result<HttpReply, AppError> {
        self.transport.execute(request).await
    }

    /// Parses a reply obtained from [`fetch_raw`](Self::fetch_raw).
    pub fn parse_page(&self, reply: HttpReply) -> Result<PageResult, AppError> {
        parser::parse_likes_page(reply.body)
    }

    /// Looks up the id of the account that owns the access token.
    pub async fn fetch_account(&self) -> Result<AccountId, AppError> {
        let url = format!("{}/users/me", self.config.api_base.trim_end_matches('/'));
        let request = HttpRequest::get(url).with_bearer(self.token.clone());
        let reply = self.transport.execute(&request).await?;
        parser::parse_account(&reply.body)
    }
}
