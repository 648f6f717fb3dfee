//! Per-IP rate limiting to prevent abuse
//!
//! Every source IP walks the same state machine:
//! `Fresh -> Counting -> Blocked -> (block expired) -> Fresh`.
//! The transition itself is the pure [`step`] function; the entries live
//! behind a [`RateLimitStore`] so the table can be moved out of process.

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_RATE_LIMIT_BLOCK_SECS, DEFAULT_RATE_LIMIT_MAX_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW_SECS,
    RATE_LIMIT_CLEANUP_INTERVAL_SECS,
};
use crate::error::Result;
use crate::storage::traits::RateLimitStore;

/// Limits shared by every route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
    pub block_duration: Duration,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            block_duration: Duration::from_secs(DEFAULT_RATE_LIMIT_BLOCK_SECS),
        }
    }
}

/// Counter state for one source IP
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: DateTime<Utc>,
    pub blocked_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitState {
    Fresh,
    Counting,
    Blocked,
}

impl RateLimitEntry {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            count: 0,
            window_start: now,
            blocked_until: None,
        }
    }

    pub fn state(&self, now: DateTime<Utc>) -> RateLimitState {
        match self.blocked_until {
            Some(until) if until > now => RateLimitState::Blocked,
            Some(_) => RateLimitState::Fresh,
            None if self.count == 0 => RateLimitState::Fresh,
            None => RateLimitState::Counting,
        }
    }

    /// True when dropping the entry would not change any future decision.
    pub fn is_stale(&self, now: DateTime<Utc>, policy: &RateLimitPolicy) -> bool {
        match self.blocked_until {
            Some(until) => until <= now,
            None => window_elapsed(self.window_start, now, policy.window),
        }
    }
}

/// Outcome of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Rejected { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed { .. })
    }
}

fn window_elapsed(start: DateTime<Utc>, now: DateTime<Utc>, window: Duration) -> bool {
    // A negative delta (clock moved backwards) keeps the current window
    (now - start)
        .to_std()
        .map(|elapsed| elapsed > window)
        .unwrap_or(false)
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52))
}

/// Advance one IP's state by a single request.
pub fn step(
    entry: Option<RateLimitEntry>,
    now: DateTime<Utc>,
    policy: &RateLimitPolicy,
) -> (Option<RateLimitEntry>, RateDecision) {
    let mut entry = match entry {
        Some(existing) => match existing.blocked_until {
            Some(until) if until > now => {
                let retry_after = (until - now).to_std().unwrap_or(Duration::ZERO);
                return (Some(existing), RateDecision::Rejected { retry_after });
            }
            Some(_) => RateLimitEntry::fresh(now),
            None => existing,
        },
        None => RateLimitEntry::fresh(now),
    };

    if window_elapsed(entry.window_start, now, policy.window) {
        entry.count = 0;
        entry.window_start = now;
    }

    entry.count = entry.count.saturating_add(1);

    if entry.count > policy.max_requests {
        entry.blocked_until = Some(now + to_chrono(policy.block_duration));
        return (
            Some(entry),
            RateDecision::Rejected {
                retry_after: policy.block_duration,
            },
        );
    }

    let remaining = policy.max_requests - entry.count;
    (Some(entry), RateDecision::Allowed { remaining })
}

/// Rate limiter keyed by client IP
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    policy: RateLimitPolicy,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, policy: RateLimitPolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Record a request from `ip` and decide whether it may proceed
    pub async fn check(&self, ip: IpAddr) -> Result<RateDecision> {
        self.check_at(&ip.to_string(), Utc::now()).await
    }

    /// Same as [`RateLimiter::check`] with an explicit clock
    pub async fn check_at(&self, key: &str, now: DateTime<Utc>) -> Result<RateDecision> {
        let policy = self.policy;
        let decision = self
            .store
            .apply(key, &move |entry| step(entry, now, &policy))
            .await?;

        match decision {
            RateDecision::Rejected { retry_after } => {
                warn!("IP address {} is blocked for {}s", key, retry_after.as_secs());
            }
            RateDecision::Allowed { remaining } => {
                debug!("IP address {} allowed, {} requests left in window", key, remaining);
            }
        }

        Ok(decision)
    }

    /// Drop entries that no longer influence any decision
    pub async fn purge_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let policy = self.policy;
        self.store
            .retain(&move |entry| !entry.is_stale(now, &policy))
            .await
    }

    /// Start cleanup task for the rate-limit table
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(RATE_LIMIT_CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                match self.purge_stale(Utc::now()).await {
                    Ok(0) => {}
                    Ok(removed) => debug!("Purged {} stale rate-limit entries", removed),
                    Err(e) => error!("Failed to purge rate-limit entries: {}", e),
                }
            }
        });
    }
}
