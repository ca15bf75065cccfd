// src/api/parser.rs
//! Turns raw response bodies into typed results.
//!
//! Any shape problem is a [`AppError::Protocol`] that carries the whole
//! body, so a bad page can be diagnosed from the error alone.

use super::responses::{Item, LikesEnvelope, MeEnvelope, PageResult};
use crate::error::AppError;
use crate::types::{AccountId, ItemId};
use serde_json::Value;

/// Parses one page of liked posts.
///
/// A body without `data` is an empty page. A blank `next_token` counts as
/// absent.
pub fn parse_likes_page(body: String) -> Result<PageResult, AppError> {
    let envelope: LikesEnvelope = serde_json::from_str(&body)
        .map_err(|e| AppError::protocol(format!("liked posts page is not valid: {}", e), body.clone()))?;

    let mut items = Vec::with_capacity(envelope.data.len());
    for (index, payload) in envelope.data.into_iter().enumerate() {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                AppError::protocol(format!("item {} has no string id", index), body.clone())
            })
            .and_then(|raw| {
                ItemId::parse(raw).map_err(|e| AppError::protocol(e.to_string(), body.clone()))
            })?;
        items.push(Item { id, payload });
    }

    let next_page_token = envelope
        .meta
        .next_token
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());

    Ok(PageResult {
        items,
        includes: envelope.includes,
        next_page_token,
        raw: body,
    })
}

/// Parses the authenticated account from `users/me`.
pub fn parse_account(body: &str) -> Result<AccountId, AppError> {
    let envelope: MeEnvelope = serde_json::from_str(body)
        .map_err(|e| AppError::protocol(format!("users/me response is not valid: {}", e), body))?;
    if let Some(username) = &envelope.data.username {
        log::info!("Authenticated as @{}", username);
    }
    AccountId::parse(&envelope.data.id).map_err(|e| AppError::protocol(e.to_string(), body))
}
