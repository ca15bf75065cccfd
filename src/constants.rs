// src/constants.rs
//! Operational boundaries of the collector and the OAuth handshake.

use std::time::Duration;

// ---------------------------------------------------------------------------
// X API boundaries
// ---------------------------------------------------------------------------

/// Base URL for every v2 API call.
pub const X_API_BASE: &str = "https://api.x.com/2";

/// How many liked posts the API returns per page of results.
///
/// 100 is the endpoint's maximum; using it minimizes round-trips.
pub const X_API_PAGE_SIZE: u32 = 100;

/// Post fields requested on every page.
pub const DEFAULT_TWEET_FIELDS: &str = "created_at,public_metrics,entities,lang,possibly_sensitive,referenced_tweets,author_id,conversation_id";

/// Author fields requested through the `author_id` expansion.
pub const DEFAULT_USER_FIELDS: &str = "username,name,description,public_metrics,verified,created_at";

/// Expansions requested on every page.
pub const DEFAULT_EXPANSIONS: &str = "author_id";

/// Header carrying the epoch second at which the rate-limit window resets.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Timeout applied to every HTTP request.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Rate limiting
// ---------------------------------------------------------------------------

/// Added to every computed rate-limit sleep to absorb clock skew.
pub const RATE_LIMIT_BUFFER: Duration = Duration::from_secs(5);

/// Assumed wait when a 429 carries no reset header.
pub const RATE_LIMIT_DEFAULT_RESET: Duration = Duration::from_secs(60);

/// Consecutive 429 retries before the request is given up.
pub const RATE_LIMIT_MAX_RETRIES: u32 = 5;

// ---------------------------------------------------------------------------
// OAuth
// ---------------------------------------------------------------------------

pub const X_AUTHORIZE_URL: &str = "https://x.com/i/oauth2/authorize";
pub const X_TOKEN_URL: &str = "https://api.x.com/2/oauth2/token";

pub const DEFAULT_SCOPES: &str = "tweet.read users.read like.read offline.access";
pub const DEFAULT_REDIRECT_URI: &str = "http://127.0.0.1:8765/callback";

/// How long the handshake waits for the browser to come back.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(600);

/// Random bytes behind the PKCE code verifier (43 base64url chars).
pub const CODE_VERIFIER_BYTES: usize = 32;

/// Random bytes behind the CSRF state nonce.
pub const STATE_NONCE_BYTES: usize = 16;

/// Access tokens this close to expiry are refreshed before a run.
pub const TOKEN_EXPIRY_SKEW_SECS: i64 = 60;

// ---------------------------------------------------------------------------
// Error display
// ---------------------------------------------------------------------------

/// Maximum characters shown when previewing error response bodies.
pub const ERROR_BODY_PREVIEW_LENGTH: usize = 200;
