// src/output/normalize.rs
//! Derived features attached to every stored post.
//!
//! Pure functions; the sink decides where the records go.

use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TextFlags {
    pub contains_question: bool,
    /// Uppercase letters over all letters, rounded to 3 decimals.
    pub upper_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LocalTemporal {
    pub hour_local: u32,
    /// 0 = Monday.
    pub weekday: u32,
}

pub fn derive_flags(text: &str) -> TextFlags {
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
    let upper = text.chars().filter(|c| c.is_uppercase()).count();
    let ratio = if alpha == 0 {
        0.0
    } else {
        upper as f64 / alpha as f64
    };
    TextFlags {
        contains_question: text.contains('?'),
        upper_ratio: (ratio * 1000.0).round() / 1000.0,
    }
}

/// Hour and weekday of an RFC 3339 timestamp in `tz`.
pub fn local_temporal(created_at: &str, tz: Tz) -> Option<LocalTemporal> {
    let local = DateTime::parse_from_rfc3339(created_at).ok()?.with_timezone(&tz);
    Some(LocalTemporal {
        hour_local: local.hour(),
        weekday: local.weekday().num_days_from_monday(),
    })
}

/// The stored form of a post: its payload plus `flags`, `temporal` and
/// `source_page`.
///
/// Posts without `text` get flags computed over the empty string; posts
/// without a parsable `created_at` get `"temporal": null`.
pub fn normalize_item(payload: &Value, tz: Tz, source_page: &str) -> Value {
    let text = payload.get("text").and_then(Value::as_str).unwrap_or_default();
    let temporal = payload
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|created| local_temporal(created, tz));

    let mut record = payload.clone();
    if let Value::Object(map) = &mut record {
        map.insert("flags".to_string(), json!(derive_flags(text)));
        map.insert("temporal".to_string(), json!(temporal));
        map.insert("source_page".to_string(), json!(source_page));
    }
    record
}
