// tests/collector_scenarios.rs
//! End-to-end collector runs against a scripted X API.

mod common;

use common::{
    collector, collector_with, emitted_ids, likes_page, rate_limited, reply, CountingRefresher, ScriptedTransport,
    NOW,
};
use pretty_assertions::assert_eq;
use std::time::Duration;
use xlikes::{
    run_with_refresh, AccountId, AppError, CollectorConfig, CursorState, CursorStore, ItemId,
    PaginationMode,
};

const ME: &str = r#"{"data":{"id":"12","username":"me"}}"#;

fn store(out: &std::path::Path) -> CursorStore {
    CursorStore::new(out.join("data/state.json"))
}

fn seed_state(out: &std::path::Path, newest: Option<&str>, oldest: Option<&str>) -> CursorState {
    let state = CursorState {
        account_id: Some(AccountId::parse("12").unwrap()),
        newest_seen_id: newest.map(|id| ItemId::parse(id).unwrap()),
        oldest_seen_id: oldest.map(|id| ItemId::parse(id).unwrap()),
        last_run_at: None,
        pages_fetched_total: 4,
    };
    store(out).save(&state).unwrap();
    state
}

#[tokio::test]
async fn two_page_backfill_sets_both_cursors() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new(vec![
        reply(200, ME),
        reply(200, include_str!("fixtures/likes_page_first.json")),
        reply(200, include_str!("fixtures/likes_page_last.json")),
    ]);
    let mut collector = collector(transport.clone(), dir.path());

    let pages = collector.run(0, false).await.unwrap();
    assert_eq!(pages, 2);

    let requests = transport.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests[0].url.ends_with("/users/me"));
    assert!(requests[1].url.ends_with("/users/12/liked_tweets"));
    assert_eq!(requests[1].query_value("max_results"), Some("100"));
    assert_eq!(requests[1].query_value("expansions"), Some("author_id"));
    assert_eq!(requests[1].query_value("pagination_token"), None);
    assert_eq!(
        requests[2].query_value("pagination_token"),
        Some("7140dibdnow9c7btw481sth1g9abjek5i7f6b2m4uyr5a")
    );

    let state = store(dir.path()).load().unwrap();
    assert_eq!(state.account_id.unwrap().as_str(), "12");
    assert_eq!(state.newest_seen_id.unwrap().as_str(), "1879032344387702989");
    assert_eq!(state.oldest_seen_id.unwrap().as_str(), "1876543210987654321");
    assert_eq!(state.pages_fetched_total, 2);
    assert!(state.last_run_at.is_some());

    assert_eq!(emitted_ids(dir.path()).len(), 4);
    let users = std::fs::read_to_string(dir.path().join("data/users.jsonl")).unwrap();
    assert_eq!(users.lines().count(), 3);
    let raw_files = std::fs::read_dir(dir.path().join("raw")).unwrap().count();
    assert_eq!(raw_files, 2);
}

#[tokio::test]
async fn raw_snapshot_is_the_exact_body() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), None, None);
    let body = include_str!("fixtures/likes_page_last.json");
    let transport = ScriptedTransport::new(vec![reply(200, body)]);
    collector(transport, dir.path()).run(0, false).await.unwrap();

    let entry = std::fs::read_dir(dir.path().join("raw"))
        .unwrap()
        .next()
        .unwrap()
        .unwrap();
    let name = entry.file_name().into_string().unwrap();
    assert!(name.starts_with("page_") && name.ends_with("_0000.json"));
    assert_eq!(std::fs::read_to_string(entry.path()).unwrap(), body);

    let line = std::fs::read_to_string(dir.path().join("data/tweets.jsonl")).unwrap();
    let first: serde_json::Value = serde_json::from_str(line.lines().next().unwrap()).unwrap();
    assert_eq!(first["source_page"], name.as_str());
}

#[tokio::test]
async fn resume_sends_since_id_and_keeps_oldest() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), Some("300"), Some("100"));
    let transport = ScriptedTransport::new(vec![likes_page(&["400", "350"], None)]);
    let mut collector = collector(transport.clone(), dir.path());

    assert_eq!(collector.run(0, true).await.unwrap(), 1);
    assert_eq!(transport.requests()[0].query_value("since_id"), Some("300"));

    let state = store(dir.path()).load().unwrap();
    assert_eq!(state.newest_seen_id.unwrap().as_str(), "400");
    assert_eq!(state.oldest_seen_id.unwrap().as_str(), "100");
    assert_eq!(state.pages_fetched_total, 5);
}

#[tokio::test]
async fn malformed_page_is_snapshotted_before_it_fails() {
    let dir = tempfile::tempdir().unwrap();
    let before = seed_state(dir.path(), Some("300"), None);
    let body = r#"{"data":[{"text":"no id here"}],"meta":{}}"#;
    let transport = ScriptedTransport::new(vec![reply(200, body)]);

    let err = collector(transport, dir.path()).run(0, false).await.unwrap_err();
    assert!(matches!(err, AppError::Protocol { .. }));

    let files: Vec<_> = std::fs::read_dir(dir.path().join("raw"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), body);
    assert_eq!(store(dir.path()).load().unwrap(), before);
    assert!(emitted_ids(dir.path()).is_empty());
}

#[tokio::test]
async fn since_mode_in_config_drives_the_refreshing_run() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), Some("300"), Some("100"));
    let transport = ScriptedTransport::new(vec![likes_page(&["400"], None)]);
    let config = CollectorConfig {
        pagination_mode: PaginationMode::Since,
        ..CollectorConfig::default()
    };
    let mut collector = collector_with(transport.clone(), dir.path(), config);
    assert!(collector.resumes());

    let refresher = CountingRefresher::new("unused");
    assert_eq!(run_with_refresh(&mut collector, &refresher, 0).await.unwrap(), 1);
    assert_eq!(transport.requests()[0].query_value("since_id"), Some("300"));
    assert_eq!(store(dir.path()).load().unwrap().oldest_seen_id.unwrap().as_str(), "100");
}

#[tokio::test]
async fn resume_without_cursor_is_a_full_walk() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), None, None);
    let transport = ScriptedTransport::new(vec![likes_page(&["20", "10"], None)]);
    let mut collector = collector(transport.clone(), dir.path());

    collector.run(0, true).await.unwrap();
    assert_eq!(transport.requests()[0].query_value("since_id"), None);
    let state = store(dir.path()).load().unwrap();
    assert_eq!(state.newest_seen_id.unwrap().as_str(), "20");
    assert_eq!(state.oldest_seen_id.unwrap().as_str(), "10");
}

#[tokio::test]
async fn empty_first_page_still_finalizes() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), Some("300"), None);
    let transport = ScriptedTransport::new(vec![reply(200, r#"{"meta":{"result_count":0}}"#)]);
    let mut collector = collector(transport, dir.path());

    assert_eq!(collector.run(0, true).await.unwrap(), 1);
    let state = store(dir.path()).load().unwrap();
    assert_eq!(state.newest_seen_id.unwrap().as_str(), "300");
    assert!(state.last_run_at.is_some());
    assert_eq!(state.pages_fetched_total, 5);
    assert!(emitted_ids(dir.path()).is_empty());
}

#[tokio::test]
async fn duplicate_only_page_counts_and_advances() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), None, None);
    let transport = ScriptedTransport::new(vec![
        likes_page(&["3", "2"], Some("t2")),
        likes_page(&["2", "3"], Some("t3")),
        likes_page(&["1"], None),
    ]);
    let mut collector = collector(transport.clone(), dir.path());

    assert_eq!(collector.run(0, false).await.unwrap(), 3);
    assert_eq!(transport.requests()[2].query_value("pagination_token"), Some("t3"));
    assert_eq!(emitted_ids(dir.path()), vec!["3", "2", "1"]);
    assert_eq!(collector.dedup_len(), 3);
    assert_eq!(store(dir.path()).load().unwrap().pages_fetched_total, 7);
}

#[tokio::test]
async fn page_limit_stops_before_the_last_page() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), None, None);
    let transport = ScriptedTransport::new(vec![likes_page(&["9", "8"], Some("more"))]);
    let mut collector = collector(transport.clone(), dir.path());

    assert_eq!(collector.run(1, false).await.unwrap(), 1);
    assert_eq!(transport.requests().len(), 1);
    let state = store(dir.path()).load().unwrap();
    assert_eq!(state.newest_seen_id.unwrap().as_str(), "9");
    assert!(state.oldest_seen_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn rate_limited_first_request_waits_for_reset_then_retries_once() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), None, None);
    let transport = ScriptedTransport::new(vec![
        rate_limited(NOW + 5),
        likes_page(&["5"], None),
    ]);
    let mut collector = collector(transport.clone(), dir.path());

    let started = tokio::time::Instant::now();
    assert_eq!(collector.run(0, false).await.unwrap(), 1);
    let waited = started.elapsed();
    assert!(waited >= Duration::from_secs(10), "waited {:?}", waited);
    assert!(waited < Duration::from_secs(11), "waited {:?}", waited);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0], requests[1]);
}

#[tokio::test]
async fn unauthorized_mid_run_leaves_cursors_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let before = seed_state(dir.path(), Some("300"), Some("100"));
    let transport = ScriptedTransport::new(vec![
        likes_page(&["500", "400"], Some("t2")),
        reply(401, r#"{"title":"Unauthorized"}"#),
    ]);
    let mut collector = collector(transport, dir.path());

    let err = collector.run(0, false).await.unwrap_err();
    assert!(matches!(err, AppError::AuthExpired { .. }));
    assert_eq!(store(dir.path()).load().unwrap(), before);
}

#[tokio::test]
async fn refresh_once_then_rerun_from_same_cursor_without_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), None, None);
    let transport = ScriptedTransport::new(vec![
        likes_page(&["500", "400"], Some("t2")),
        reply(401, r#"{"title":"Unauthorized"}"#),
        likes_page(&["500", "400"], Some("t2")),
        likes_page(&["300"], None),
    ]);
    let refresher = CountingRefresher::new("access-token-2");
    let mut collector = collector(transport.clone(), dir.path());

    let pages = run_with_refresh(&mut collector, &refresher, 0)
        .await
        .unwrap();
    assert_eq!(pages, 2);
    assert_eq!(refresher.calls(), 1);

    let requests = transport.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[1].bearer.as_ref().unwrap().expose(), "access-token-1");
    assert_eq!(requests[2].query_value("pagination_token"), None);
    assert_eq!(requests[2].bearer.as_ref().unwrap().expose(), "access-token-2");

    assert_eq!(emitted_ids(dir.path()), vec!["500", "400", "300"]);
    let state = store(dir.path()).load().unwrap();
    assert_eq!(state.oldest_seen_id.unwrap().as_str(), "300");
    assert_eq!(state.pages_fetched_total, 6);
}

#[tokio::test]
async fn second_unauthorized_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), None, None);
    let transport = ScriptedTransport::new(vec![
        reply(401, "{}"),
        reply(401, "{}"),
    ]);
    let refresher = CountingRefresher::new("access-token-2");
    let mut collector = collector(transport.clone(), dir.path());

    let err = run_with_refresh(&mut collector, &refresher, 0)
        .await
        .unwrap_err();
    assert!(err.is_auth_expired());
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.remaining(), 0);
}

#[tokio::test]
async fn server_errors_are_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    seed_state(dir.path(), None, None);
    let transport = ScriptedTransport::new(vec![reply(503, "upstream down")]);
    let refresher = CountingRefresher::new("unused");
    let mut collector = collector(transport.clone(), dir.path());

    let err = run_with_refresh(&mut collector, &refresher, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UnexpectedStatus { status: 503, .. }));
    assert_eq!(refresher.calls(), 0);
    assert_eq!(transport.requests().len(), 1);
}
