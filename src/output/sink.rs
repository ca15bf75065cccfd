// src/output/sink.rs
//! Append-only JSONL logs of collected posts and their authors.

use super::normalize::normalize_item;
use crate::api::responses::{Includes, Item};
use crate::error::AppError;
use chrono_tz::Tz;
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const ITEMS_FILE: &str = "tweets.jsonl";
pub const USERS_FILE: &str = "users.jsonl";

/// Destination for items the collector has not seen before.
pub trait ItemSink: Send {
    /// Records one item. `source_page` names the raw snapshot it came from.
    fn write_item(&mut self, item: &Item, includes: &Includes, source_page: &str)
        -> Result<(), AppError>;

    /// Makes everything written for the current page durable.
    fn finish_page(&mut self) -> Result<(), AppError>;
}

/// Writes normalized posts to `tweets.jsonl` and each author once to
/// `users.jsonl`.
pub struct JsonlSink {
    items: BufWriter<File>,
    users: BufWriter<File>,
    items_path: PathBuf,
    seen_users: HashSet<String>,
    tz: Tz,
}

fn open_append(path: &Path) -> Result<BufWriter<File>, AppError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(BufWriter::new(file))
}

fn write_line(writer: &mut BufWriter<File>, value: &Value) -> Result<(), AppError> {
    serde_json::to_writer(&mut *writer, value).map_err(|e| AppError::InternalError {
        message: "could not encode JSONL record".to_string(),
        source: Some(Box::new(e)),
    })?;
    writer.write_all(b"\n")?;
    Ok(())
}

impl JsonlSink {
    /// Opens (creating if needed) both logs under `data_dir`.
    pub fn open(data_dir: &Path, tz: Tz) -> Result<Self, AppError> {
        fs::create_dir_all(data_dir)?;
        let items_path = data_dir.join(ITEMS_FILE);
        Ok(Self {
            items: open_append(&items_path)?,
            users: open_append(&data_dir.join(USERS_FILE))?,
            items_path,
            seen_users: HashSet::new(),
            tz,
        })
    }

    pub fn items_path(&self) -> &Path {
        &self.items_path
    }

    pub fn authors_written(&self) -> usize {
        self.seen_users.len()
    }
}

impl ItemSink for JsonlSink {
    fn write_item(
        &mut self,
        item: &Item,
        includes: &Includes,
        source_page: &str,
    ) -> Result<(), AppError> {
        write_line(
            &mut self.items,
            &normalize_item(&item.payload, self.tz, source_page),
        )?;

        let Some(author_id) = item.payload.get("author_id").and_then(Value::as_str) else {
            return Ok(());
        };
        if self.seen_users.contains(author_id) {
            return Ok(());
        }
        if let Some(user) = includes.user(author_id) {
            write_line(&mut self.users, user)?;
            self.seen_users.insert(author_id.to_string());
        }
        Ok(())
    }

    fn finish_page(&mut self) -> Result<(), AppError> {
        self.items.flush()?;
        self.users.flush()?;
        Ok(())
    }
}
