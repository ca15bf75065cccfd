// tests/common/mod.rs
//! Shared fakes for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use xlikes::{
    AccessToken, AppError, Clock, Collector, CollectorConfig, CredentialRefresher, CursorStore,
    HttpReply, HttpRequest, HttpTransport, JsonlSink, LikesApi, RateLimitedTransport,
    RawSnapshots, RetryPolicy,
};

/// Epoch seconds reported by [`FixedClock`] in tests.
pub const NOW: u64 = 1_700_000_000;

pub fn reply(status: u16, body: &str) -> HttpReply {
    HttpReply {
        status,
        headers: BTreeMap::new(),
        body: body.to_string(),
        url: "https://api.x.com/2/test".to_string(),
    }
}

pub fn rate_limited(reset_epoch_secs: u64) -> HttpReply {
    let mut reply = reply(429, r#"{"title":"Too Many Requests"}"#);
    reply
        .headers
        .insert("x-rate-limit-reset".to_string(), reset_epoch_secs.to_string());
    reply
}

/// Replays canned replies in order and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<HttpReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<HttpReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpReply, AppError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        let mut reply = next.unwrap_or_else(|| panic!("no scripted reply for {}", request.url));
        reply.url = request.url.clone();
        Ok(reply)
    }
}

pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_epoch_secs(&self) -> u64 {
        self.0
    }
}

/// Hands out a fixed token and counts how often it was asked.
pub struct CountingRefresher {
    token: String,
    calls: AtomicUsize,
}

impl CountingRefresher {
    pub fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialRefresher for CountingRefresher {
    async fn refresh_access_token(&self) -> Result<AccessToken, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(AccessToken::new(self.token.clone())?)
    }
}

/// A collector writing under `out` and talking to `transport`.
pub fn collector(transport: Arc<ScriptedTransport>, out: &Path) -> Collector {
    collector_with(transport, out, CollectorConfig::default())
}

pub fn collector_with(
    transport: Arc<ScriptedTransport>,
    out: &Path,
    config: CollectorConfig,
) -> Collector {
    let api = LikesApi::new(
        RateLimitedTransport::with_policy(
            transport,
            RetryPolicy::default(),
            Arc::new(FixedClock(NOW)),
        ),
        config,
        AccessToken::new("access-token-1").unwrap(),
    );
    Collector::new(
        api,
        CursorStore::new(out.join("data/state.json")),
        Box::new(JsonlSink::open(&out.join("data"), chrono_tz::UTC).unwrap()),
        RawSnapshots::new(out.join("raw")),
    )
}

/// A likes page with the given ids, one shared author and an optional
/// continuation token.
pub fn likes_page(ids: &[&str], next_token: Option<&str>) -> HttpReply {
    let data: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            serde_json::json!({
                "id": id,
                "text": format!("post {}", id),
                "author_id": "42",
                "created_at": "2025-01-06T12:00:00.000Z"
            })
        })
        .collect();
    let mut meta = serde_json::json!({ "result_count": ids.len() });
    if let Some(token) = next_token {
        meta["next_token"] = serde_json::json!(token);
    }
    let body = serde_json::json!({
        "data": data,
        "includes": { "users": [{ "id": "42", "username": "author42" }] },
        "meta": meta
    });
    reply(200, &body.to_string())
}

/// Ids of the JSONL lines written to `tweets.jsonl`.
pub fn emitted_ids(out: &Path) -> Vec<String> {
    std::fs::read_to_string(out.join("data/tweets.jsonl"))
        .unwrap_or_default()
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["id"].as_str().unwrap().to_string()
        })
        .collect()
}
