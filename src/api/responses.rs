// src/api/responses.rs
//! Wire shapes of the liked-posts and `users/me` endpoints.
//!
//! Items stay opaque JSON: the collector only needs their ids, and the
//! sink decides what to do with the rest.

use crate::types::ItemId;
use serde::Deserialize;
use serde_json::Value;

/// `GET /2/users/{id}/liked_tweets` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct LikesEnvelope {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default)]
    pub includes: Includes,
    #[serde(default)]
    pub meta: PageMeta,
}

/// Expanded objects referenced by the page's items.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<Value>,
}

impl Includes {
    /// Finds an included user by id.
    pub fn user(&self, id: &str) -> Option<&Value> {
        self.users
            .iter()
            .find(|u| u.get("id").and_then(Value::as_str) == Some(id))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    pub next_token: Option<String>,
    pub result_count: Option<u64>,
}

/// A liked post: its id plus the untouched object.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    pub payload: Value,
}

/// One fetched page, in the order the source returned it.
#[derive(Debug, Clone)]
pub struct PageResult {
    pub items: Vec<Item>,
    pub includes: Includes,
    pub next_page_token: Option<String>,
    /// The response body exactly as received.
    pub raw: String,
}

impl PageResult {
    pub fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }

    pub fn last_item_id(&self) -> Option<&ItemId> {
        self.items.last().map(|item| &item.id)
    }

    /// Largest id on the page under the source's id order.
    pub fn newest_item_id(&self) -> Option<&ItemId> {
        self.items.iter().map(|item| &item.id).max()
    }
}

/// `GET /2/users/me` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct MeEnvelope {
    pub data: MeData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeData {
    pub id: String,
    pub username: Option<String>,
}
