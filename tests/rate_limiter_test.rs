mod common;

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use warp::http::StatusCode;

use common::{call, config_with};
use rusty_chat::core::rate_limiter::{RateDecision, RateLimitPolicy, RateLimiter};
use rusty_chat::storage::memory::MemoryRateLimitStore;
use rusty_chat::{routes, AppState, Storage};

fn limiter(max_requests: u32) -> RateLimiter {
    RateLimiter::new(
        Arc::new(MemoryRateLimitStore::new()),
        RateLimitPolicy {
            window: Duration::from_secs(60),
            max_requests,
            block_duration: Duration::from_secs(300),
        },
    )
}

#[tokio::test]
async fn test_http_requests_over_threshold_get_429() {
    let config = config_with(&[
        ("RUSTY_CHAT_RATE_LIMIT_MAX_REQUESTS", "3"),
        ("RUSTY_CHAT_RATE_LIMIT_BLOCK_SECS", "120"),
    ]);
    let routes = routes(AppState::new(config, Storage::memory()));

    for _ in 0..3 {
        let reply = call(&routes, "GET", "/health", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }

    let blocked = call(&routes, "GET", "/health", None, None).await;
    assert_eq!(blocked.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(blocked.body["success"], false);
    assert_eq!(
        blocked.body["error"],
        "Too many requests. Please try again after 120 seconds"
    );
    assert_eq!(blocked.headers.get("retry-after").unwrap(), "120");

    // Unknown routes are counted too and stay blocked
    let still_blocked = call(&routes, "GET", "/nope", None, None).await;
    assert_eq!(still_blocked.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_block_expires_and_counting_restarts() {
    let limiter = limiter(2);
    let start = Utc::now();

    assert!(limiter.check_at("10.0.0.1", start).await.unwrap().is_allowed());
    assert!(limiter.check_at("10.0.0.1", start).await.unwrap().is_allowed());
    assert_eq!(
        limiter.check_at("10.0.0.1", start).await.unwrap(),
        RateDecision::Rejected {
            retry_after: Duration::from_secs(300)
        }
    );

    let during_block = start + ChronoDuration::seconds(299);
    assert!(!limiter
        .check_at("10.0.0.1", during_block)
        .await
        .unwrap()
        .is_allowed());

    let after_block = start + ChronoDuration::seconds(301);
    assert_eq!(
        limiter.check_at("10.0.0.1", after_block).await.unwrap(),
        RateDecision::Allowed { remaining: 1 }
    );
}

#[tokio::test]
async fn test_ips_are_counted_separately() {
    let limiter = limiter(1);
    let now = Utc::now();

    assert!(limiter.check_at("10.0.0.1", now).await.unwrap().is_allowed());
    assert!(!limiter.check_at("10.0.0.1", now).await.unwrap().is_allowed());
    assert!(limiter.check_at("10.0.0.2", now).await.unwrap().is_allowed());
}

#[tokio::test]
async fn test_purge_drops_only_stale_entries() {
    let limiter = limiter(5);
    let start = Utc::now();

    limiter.check_at("10.0.0.1", start).await.unwrap();
    limiter
        .check_at("10.0.0.2", start + ChronoDuration::seconds(50))
        .await
        .unwrap();

    let removed = limiter
        .purge_stale(start + ChronoDuration::seconds(90))
        .await
        .unwrap();
    assert_eq!(removed, 1);
}
