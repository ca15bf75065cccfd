// src/auth/token_endpoint.rs
//! Requests to the OAuth authorize and token endpoints.

use super::pkce::AuthSession;
use crate::api::client::{BasicAuth, HttpRequest};
use crate::api::{HttpReply, HttpTransport};
use crate::config::OAuthConfig;
use crate::error::AppError;
use crate::store::CredentialSet;
use crate::types::{AccessToken, RefreshToken};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<Value>,
    scope: Option<String>,
    token_type: Option<String>,
}

/// Browser URL that starts the authorization for `session`.
pub fn authorize_url(config: &OAuthConfig, session: &AuthSession) -> Result<String, AppError> {
    let mut url = Url::parse(&config.authorize_url).map_err(|e| {
        AppError::MissingConfiguration(format!(
            "authorize URL {} is invalid: {}",
            config.authorize_url, e
        ))
    })?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", config.client_id.as_str())
        .append_pair("redirect_uri", &session.redirect_uri)
        .append_pair("scope", &config.scopes)
        .append_pair("state", &session.state_nonce)
        .append_pair("code_challenge", &session.code_challenge)
        .append_pair("code_challenge_method", "S256");
    Ok(url.into())
}

fn basic_auth(config: &OAuthConfig) -> Option<BasicAuth> {
    config.client_secret.clone().map(|client_secret| BasicAuth {
        client_id: config.client_id.clone(),
        client_secret,
    })
}

/// `authorization_code` grant for a code received on the callback.
pub fn code_grant_request(config: &OAuthConfig, session: &AuthSession, code: &str) -> HttpRequest {
    HttpRequest::post_form(config.token_url.clone())
        .with_form("grant_type", "authorization_code")
        .with_form("code", code)
        .with_form("client_id", config.client_id.as_str())
        .with_form("redirect_uri", session.redirect_uri.clone())
        .with_form("code_verifier", session.code_verifier.clone())
        .with_basic(basic_auth(config))
}

/// `refresh_token` grant.
pub fn refresh_grant_request(config: &OAuthConfig, refresh_token: &RefreshToken) -> HttpRequest {
    HttpRequest::post_form(config.token_url.clone())
        .with_form("grant_type", "refresh_token")
        .with_form("refresh_token", refresh_token.expose())
        .with_form("client_id", config.client_id.as_str())
        .with_basic(basic_auth(config))
}

/// Sends a grant request and parses the issued credentials.
pub async fn request_tokens(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
) -> Result<CredentialSet, AppError> {
    let reply = transport.send(request).await?;
    parse_token_reply(reply, Utc::now())
}

/// Turns a token endpoint reply into a [`CredentialSet`] stamped with `now`.
pub fn parse_token_reply(reply: HttpReply, now: DateTime<Utc>) -> Result<CredentialSet, AppError> {
    if !reply.is_success() {
        return Err(AppError::TokenExchange {
            status: reply.status,
            body: reply.body,
        });
    }

    let parsed: TokenResponse = match serde_json::from_str(&reply.body) {
        Ok(parsed) => parsed,
        Err(e) => {
            return Err(AppError::protocol(
                format!("token response is not valid JSON: {}", e),
                reply.body,
            ))
        }
    };

    let Some(access_token) = parsed.access_token.filter(|t| !t.trim().is_empty()) else {
        return Err(AppError::protocol(
            "token response has no access_token",
            reply.body,
        ));
    };

    Ok(CredentialSet {
        access_token: AccessToken::new(access_token)?,
        refresh_token: parsed
            .refresh_token
            .filter(|t| !t.trim().is_empty())
            .map(RefreshToken::new)
            .transpose()?,
        expires_in: parsed.expires_in.as_ref().and_then(lossy_u64).unwrap_or(0),
        scope: parsed.scope.unwrap_or_default(),
        token_type: parsed.token_type.unwrap_or_else(|| "bearer".to_string()),
        obtained_at: Some(now),
    })
}

fn lossy_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
