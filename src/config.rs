// src/config.rs
use crate::constants::{
    CALLBACK_TIMEOUT, DEFAULT_EXPANSIONS, DEFAULT_REDIRECT_URI, DEFAULT_SCOPES, DEFAULT_TWEET_FIELDS,
    DEFAULT_USER_FIELDS, X_API_BASE, X_API_PAGE_SIZE, X_AUTHORIZE_URL, X_TOKEN_URL,
};
use crate::error::AppError;
use crate::types::{ClientId, ClientSecret, ValidatedUrl, ValidationError};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Parsed command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// Output directory root (holds data/ and raw/)
    #[arg(long, global = true, default_value = ".")]
    pub out_dir: PathBuf,

    /// Token file written by `auth` and `refresh`
    #[arg(long, global = true, env = "X_TOKENS_PATH", default_value = "x_tokens.json")]
    pub tokens: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the OAuth 2.0 PKCE flow and save tokens
    Auth {
        /// Seconds to wait for the browser callback
        #[arg(long, default_value_t = CALLBACK_TIMEOUT.as_secs())]
        timeout: u64,
    },
    /// Trade the stored refresh token for a new access token
    Refresh,
    /// Pull liked posts into data/tweets.jsonl
    Collect(CollectArgs),
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct ModeFlags {
    /// Backfill all pages
    #[arg(long)]
    pub full: bool,

    /// Fetch newest likes since last run
    #[arg(long)]
    pub since: bool,
}

#[derive(Args, Debug)]
pub struct CollectArgs {
    #[command(flatten)]
    pub mode: ModeFlags,

    /// Max pages per run (0 = no limit)
    #[arg(long, default_value_t = 0)]
    pub max_pages: u32,

    /// Time zone for temporal features
    #[arg(long, default_value = "America/Los_Angeles")]
    pub tz: String,
}

/// How a collection run walks the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationMode {
    /// Walk from the newest like back to the oldest.
    Full,
    /// Only ask for likes newer than the stored cursor.
    Since,
}

impl PaginationMode {
    pub fn resumes(self) -> bool {
        matches!(self, PaginationMode::Since)
    }
}

/// Request shape handed to the collector at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub api_base: String,
    pub max_results: u32,
    /// `(parameter, comma-separated fields)` pairs, e.g. `tweet.fields`.
    pub field_selectors: Vec<(String, String)>,
    pub expansions: String,
    pub pagination_mode: PaginationMode,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            api_base: X_API_BASE.to_string(),
            max_results: X_API_PAGE_SIZE,
            field_selectors: vec![
                ("tweet.fields".to_string(), DEFAULT_TWEET_FIELDS.to_string()),
                ("user.fields".to_string(), DEFAULT_USER_FIELDS.to_string()),
            ],
            expansions: DEFAULT_EXPANSIONS.to_string(),
            pagination_mode: PaginationMode::Full,
        }
    }
}

/// OAuth client settings for the PKCE flow and refreshes.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: ClientId,
    pub client_secret: Option<ClientSecret>,
    pub redirect_uri: ValidatedUrl,
    pub scopes: String,
    pub authorize_url: String,
    pub token_url: String,
}

impl OAuthConfig {
    /// Reads `X_CLIENT_ID`, `X_CLIENT_SECRET`, `X_REDIRECT_URI` and `X_SCOPES`.
    ///
    /// `.env` is loaded first when present; real environment variables win.
    pub fn from_env() -> Result<Self, AppError> {
        if let Ok(path) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", path.display());
        }

        let client_id = std::env::var("X_CLIENT_ID").map_err(|_| {
            AppError::MissingConfiguration("X_CLIENT_ID is required (set it in .env)".to_string())
        })?;
        let client_secret = std::env::var("X_CLIENT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(ClientSecret::new)
            .transpose()?;
        let redirect_uri = std::env::var("X_REDIRECT_URI")
            .unwrap_or_else(|_| DEFAULT_REDIRECT_URI.to_string());
        let scopes = std::env::var("X_SCOPES").unwrap_or_else(|_| DEFAULT_SCOPES.to_string());

        Self::new(ClientId::new(client_id)?, client_secret, &redirect_uri, scopes)
    }

    pub fn new(
        client_id: ClientId,
        client_secret: Option<ClientSecret>,
        redirect_uri: &str,
        scopes: impl Into<String>,
    ) -> Result<Self, AppError> {
        let scopes = scopes.into();
        if !scopes.split_whitespace().any(|s| s == "offline.access") {
            log::warn!("Scopes lack 'offline.access'; the token endpoint will not issue a refresh token");
        }
        Ok(Self {
            client_id,
            client_secret,
            redirect_uri: ValidatedUrl::parse(redirect_uri)?,
            scopes,
            authorize_url: X_AUTHORIZE_URL.to_string(),
            token_url: X_TOKEN_URL.to_string(),
        })
    }

    /// Points the flow at a different authorization server.
    pub fn with_endpoints(
        mut self,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.authorize_url = authorize_url.into();
        self.token_url = token_url.into();
        self
    }
}

/// Where persisted artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub tokens_file: PathBuf,
    pub state_file: PathBuf,
    pub data_dir: PathBuf,
    pub raw_dir: PathBuf,
}

impl AppPaths {
    pub fn new(out_dir: &std::path::Path, tokens_file: PathBuf) -> Self {
        let data_dir = out_dir.join("data");
        Self {
            tokens_file,
            state_file: data_dir.join("state.json"),
            raw_dir: out_dir.join("raw"),
            data_dir,
        }
    }
}

/// Parses an IANA time zone name such as `Europe/Berlin`.
pub fn parse_time_zone(name: &str) -> Result<Tz, ValidationError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ValidationError::InvalidTimeZone(name.to_string()))
}
