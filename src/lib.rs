// src/lib.rs
//! xlikes library: collects the liked posts of an X account into local
//! JSONL files and manages the OAuth 2.0 (PKCE) tokens needed to do so.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling**: `AppError`, `HandshakeFailure`, `ValidationError`
//! - **Configuration**: `CollectorConfig`, `OAuthConfig`, `AppPaths`
//! - **Domain types**: `ItemId`, `AccountId`, `AccessToken`, `RefreshToken`
//! - **API client**: `LikesApi`, `HttpTransport`, `RateLimitedTransport`
//! - **Authorization**: `TokenLifecycle`, `PkceHandshake`, `CallbackListener`
//! - **Collection**: `Collector`, `run_with_refresh`, sinks and stores

pub mod api;
pub mod auth;
pub mod collector;
pub mod config;
pub mod constants;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod types;

// --- Error Handling ---
pub use crate::error::{AppError, HandshakeFailure};
pub use crate::types::ValidationError;

// --- Configuration ---
pub use crate::config::{AppPaths, CollectorConfig, OAuthConfig, PaginationMode};

// --- Domain Types ---
pub use crate::types::{
    mask_token, AccessToken, AccountId, ClientId, ClientSecret, ItemId, RefreshToken,
    ValidatedUrl,
};

// --- API Client ---
pub use crate::api::{
    client::{HttpRequest, Method},
    rate_limit::RateLimitedTransport,
    responses::{Includes, Item, PageResult},
    Clock, HttpReply, HttpTransport, LikesApi, ReqwestTransport, RetryPolicy, SystemClock,
};

// --- Authorization ---
pub use crate::auth::{
    AuthSession, CallbackListener, CallbackOutcome, HandshakeState, PkceHandshake,
    TokenLifecycle,
};

// --- Collection ---
pub use crate::collector::{Collector, DedupSet};
pub use crate::output::{ItemSink, JsonlSink, RawSnapshots};
pub use crate::pipeline::{run_with_refresh, CredentialRefresher};
pub use crate::store::{CredentialSet, CredentialStore, CursorState, CursorStore};
