// src/api/rate_limit.rs
//! Rate-limit aware request execution.
//!
//! A 429 is answered by sleeping until the server's reset time plus a
//! buffer and resending the identical request. The loop is bounded; any
//! other non-success status is classified and returned without a retry.

use super::client::{HttpReply, HttpRequest, HttpTransport};
use crate::constants::{
    RATE_LIMIT_BUFFER, RATE_LIMIT_DEFAULT_RESET, RATE_LIMIT_MAX_RETRIES,
    RATE_LIMIT_RESET_HEADER,
};
use crate::error::AppError;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Source of wall-clock time in epoch seconds.
pub trait Clock: Send + Sync {
    fn now_epoch_secs(&self) -> u64;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Knobs for the 429 backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub buffer: Duration,
    pub default_reset: Duration,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            buffer: RATE_LIMIT_BUFFER,
            default_reset: RATE_LIMIT_DEFAULT_RESET,
            max_retries: RATE_LIMIT_MAX_RETRIES,
        }
    }
}

impl RetryPolicy {
    /// `max(reset − now, 0) + buffer`, with a missing or unreadable reset
    /// header treated as `now + default_reset`.
    pub fn backoff_for(&self, reply: &HttpReply, now_epoch_secs: u64) -> Duration {
        let reset = reply
            .header(RATE_LIMIT_RESET_HEADER)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or_else(|| now_epoch_secs + self.default_reset.as_secs());
        Duration::from_secs(reset.saturating_sub(now_epoch_secs)) + self.buffer
    }
}

/// Wraps a transport with the rate-limit policy and status classification.
#[derive(Clone)]
pub struct RateLimitedTransport {
    inner: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl RateLimitedTransport {
    pub fn new(inner: Arc<dyn HttpTransport>) -> Self {
        Self::with_policy(inner, RetryPolicy::default(), Arc::new(SystemClock))
    }

    pub fn with_policy(
        inner: Arc<dyn HttpTransport>,
        policy: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner,
            policy,
            clock,
        }
    }

    /// Sends `request`, retrying only on 429.
    ///
    /// Returns the first 2xx reply. 401 becomes [`AppError::AuthExpired`],
    /// other statuses [`AppError::UnexpectedStatus`], and a 429 that
    /// outlasts the retry budget [`AppError::RateLimited`].
    pub async fn execute(&self, request: &HttpRequest) -> Result<HttpReply, AppError> {
        let mut retries = 0u32;
        let mut waited = Duration::ZERO;

        loop {
            let reply = self.inner.send(request).await?;

            match reply.status {
                s if (200..300).contains(&s) => return Ok(reply),
                401 => {
                    return Err(AppError::AuthExpired {
                        url: request.url.clone(),
                    })
                }
                429 => {
                    let sleep_for = self.policy.backoff_for(&reply, self.clock.now_epoch_secs());
                    if retries >= self.policy.max_retries {
                        log::error!(
                            "429 persisted through {} retries ({}s waited in total)",
                            retries,
                            waited.as_secs()
                        );
                        return Err(AppError::RateLimited {
                            attempts: retries,
                            retry_after_secs: sleep_for.as_secs(),
                        });
                    }
                    retries += 1;
                    waited += sleep_for;
                    log::warn!(
                        "429 rate limit. Sleeping {}s before retry {}/{}",
                        sleep_for.as_secs(),
                        retries,
                        self.policy.max_retries
                    );
                    tokio::time::sleep(sleep_for).await;
                }
                status => {
                    return Err(AppError::UnexpectedStatus {
                        status,
                        url: reply.url,
                        body: reply.body,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use tokio::sync::Mutex;

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now_epoch_secs(&self) -> u64 {
            self.0
        }
    }

    struct Scripted {
        replies: Mutex<VecDeque<HttpReply>>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<HttpReply>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for Scripted {
        async fn send(&self, request: &HttpRequest) -> Result<HttpReply, AppError> {
            self.seen.lock().await.push(request.clone());
            Ok(self
                .replies
                .lock()
                .await
                .pop_front()
                .expect("script exhausted"))
        }
    }

    fn reply(status: u16, reset: Option<u64>) -> HttpReply {
        let mut headers = BTreeMap::new();
        if let Some(reset) = reset {
            headers.insert(RATE_LIMIT_RESET_HEADER.to_string(), reset.to_string());
        }
        HttpReply {
            status,
            headers,
            body: format!("{{\"status\":{}}}", status),
            url: "https://api.x.com/2/test".to_string(),
        }
    }

    const NOW: u64 = 1_700_000_000;

    fn limited(inner: Arc<Scripted>) -> RateLimitedTransport {
        RateLimitedTransport::with_policy(inner, RetryPolicy::default(), Arc::new(FixedClock(NOW)))
    }

    #[test]
    fn backoff_uses_reset_header_plus_buffer() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_for(&reply(429, Some(NOW + 10)), NOW),
            Duration::from_secs(15)
        );
        // A reset in the past only waits the buffer.
        assert_eq!(
            policy.backoff_for(&reply(429, Some(NOW - 30)), NOW),
            Duration::from_secs(5)
        );
        // Missing header defaults to now + 60s.
        assert_eq!(
            policy.backoff_for(&reply(429, None), NOW),
            Duration::from_secs(65)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retries_identical_request_after_sleeping_until_reset() {
        let inner = Scripted::new(vec![reply(429, Some(NOW + 10)), reply(200, None)]);
        let transport = limited(inner.clone());
        let request = HttpRequest::get("https://api.x.com/2/test").with_query("max_results", "100");

        let started = tokio::time::Instant::now();
        let result = transport.execute(&request).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(result.status, 200);
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(10) + RATE_LIMIT_BUFFER + Duration::from_secs(1));

        let seen = inner.seen.lock().await;
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
        assert_eq!(seen[0], request);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_bounded_retries() {
        let replies = (0..=RATE_LIMIT_MAX_RETRIES)
            .map(|_| reply(429, Some(NOW)))
            .collect();
        let inner = Scripted::new(replies);
        let transport = limited(inner.clone());

        let err = transport
            .execute(&HttpRequest::get("https://api.x.com/2/test"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::RateLimited { attempts, .. } if attempts == RATE_LIMIT_MAX_RETRIES
        ));
        assert_eq!(
            inner.seen.lock().await.len() as u32,
            RATE_LIMIT_MAX_RETRIES + 1
        );
    }

    #[tokio::test]
    async fn unauthorized_is_not_retried() {
        let inner = Scripted::new(vec![reply(401, None)]);
        let err = limited(inner.clone())
            .execute(&HttpRequest::get("https://api.x.com/2/test"))
            .await
            .unwrap_err();
        assert!(err.is_auth_expired());
        assert_eq!(inner.seen.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn server_errors_propagate_unchanged() {
        let inner = Scripted::new(vec![reply(503, None)]);
        let err = limited(inner.clone())
            .execute(&HttpRequest::get("https://api.x.com/2/test"))
            .await
            .unwrap_err();
        match err {
            AppError::UnexpectedStatus { status, body, .. } => {
                assert_eq!(status, 503);
                assert_eq!(body, "{\"status\":503}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(inner.seen.lock().await.len(), 1);
    }
}
