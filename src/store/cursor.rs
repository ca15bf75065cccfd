// src/store/cursor.rs
//! Resumption cursors for the collector.

use super::atomic::{read_json, write_json};
use crate::error::AppError;
use crate::types::{AccountId, ItemId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What a later run needs to pick up where this one stopped.
///
/// Aliases accept the key names of state files written by earlier
/// versions of the tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    #[serde(default, alias = "user_id", skip_serializing_if = "Option::is_none")]
    pub account_id: Option<AccountId>,
    #[serde(default, alias = "newest_like_id", skip_serializing_if = "Option::is_none")]
    pub newest_seen_id: Option<ItemId>,
    #[serde(default, alias = "oldest_like_id", skip_serializing_if = "Option::is_none")]
    pub oldest_seen_id: Option<ItemId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "pages_fetched")]
    pub pages_fetched_total: u64,
}

/// JSON file holding one [`CursorState`].
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the stored state, or the empty state when no file exists yet.
    pub fn load(&self) -> Result<CursorState, AppError> {
        let state = read_json::<CursorState>(&self.path)?.unwrap_or_default();
        log::debug!(
            "Cursor state: account={:?} newest={:?} oldest={:?} pages={}",
            state.account_id.as_ref().map(AccountId::as_str),
            state.newest_seen_id.as_ref().map(ItemId::as_str),
            state.oldest_seen_id.as_ref().map(ItemId::as_str),
            state.pages_fetched_total
        );
        Ok(state)
    }

    pub fn save(&self, state: &CursorState) -> Result<(), AppError> {
        write_json(&self.path, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn absent_file_is_a_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("data/state.json"));
        assert_eq!(store.load().unwrap(), CursorState::default());
    }

    #[test]
    fn saved_state_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = CursorStore::new(dir.path().join("state.json"));
        let state = CursorState {
            account_id: Some(AccountId::parse("12").unwrap()),
            newest_seen_id: Some(ItemId::parse("900").unwrap()),
            oldest_seen_id: Some(ItemId::parse("100").unwrap()),
            last_run_at: Some(Utc::now()),
            pages_fetched_total: 7,
        };
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), state);
    }

    #[test]
    fn legacy_key_names_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"user_id": "12", "newest_like_id": "900", "oldest_like_id": "100",
                "last_run_at": "2025-01-02T03:04:05+00:00", "pages_fetched": 3}"#,
        )
        .unwrap();
        let state = CursorStore::new(&path).load().unwrap();
        assert_eq!(state.account_id.unwrap().as_str(), "12");
        assert_eq!(state.newest_seen_id.unwrap().as_str(), "900");
        assert_eq!(state.oldest_seen_id.unwrap().as_str(), "100");
        assert_eq!(state.pages_fetched_total, 3);
    }

    #[test]
    fn wrong_shape_is_corruption_not_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"pages_fetched_total": "many"}"#).unwrap();
        assert!(matches!(
            CursorStore::new(&path).load(),
            Err(AppError::StateCorruption { .. })
        ));
    }
}
