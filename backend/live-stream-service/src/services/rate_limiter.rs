//! Fixed-window rate limiting for chat and reaction ingestion
//!
//! A window opens on the first request for a key and lasts `policy.window`.
//! The in-memory limiter serves single-replica deployments and tests; the
//! Redis limiter shares counters across replicas and fails open when Redis is
//! slow or unavailable.

use crate::error::{AppError, Result};
use crate::models::Actor;
use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::Script;
use std::fmt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use uuid::Uuid;

const WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
return {count, ttl}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Chat,
    Reaction,
}

impl RateLimitAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitAction::Chat => "chat",
            RateLimitAction::Reaction => "reaction",
        }
    }
}

/// (actor-or-connection, stream, action)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    identity: String,
    stream_id: Uuid,
    action: RateLimitAction,
}

impl RateLimitKey {
    pub fn new(actor: &Actor, stream_id: Uuid, action: RateLimitAction) -> Self {
        Self {
            identity: actor.identity(),
            stream_id,
            action,
        }
    }

    pub fn action(&self) -> RateLimitAction {
        self.action
    }

    fn redis_key(&self) -> String {
        format!("live:rl:{}", self)
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.action.as_str(),
            self.stream_id,
            self.identity
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitPolicy {
    pub fn per_window(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }

    fn window_seconds(&self) -> u64 {
        ceil_seconds(self.window)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub current_count: u32,
    pub policy: RateLimitPolicy,
    /// Time left in the current window
    pub reset_after: Duration,
}

impl RateDecision {
    fn allow_open(policy: RateLimitPolicy) -> Self {
        Self {
            allowed: true,
            current_count: 0,
            policy,
            reset_after: policy.window,
        }
    }

    pub fn retry_after_seconds(&self) -> u64 {
        ceil_seconds(self.reset_after).max(1)
    }

    /// `Ok(())` when allowed, otherwise the 429 error carrying retry details
    pub fn into_result(self) -> Result<()> {
        if self.allowed {
            return Ok(());
        }
        Err(AppError::RateLimited {
            limit: self.policy.max_requests,
            window_seconds: self.policy.window_seconds(),
            retry_after_seconds: self.retry_after_seconds(),
            current_count: self.current_count,
        })
    }
}

fn ceil_seconds(duration: Duration) -> u64 {
    let millis = duration.as_millis() as u64;
    (millis + 999) / 1000
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Counts one request against `key` and reports whether it is allowed
    async fn check(&self, key: &RateLimitKey, policy: RateLimitPolicy) -> RateDecision;

    /// Drops windows that have already closed. No-op for self-expiring backends.
    fn purge_expired(&self) -> usize {
        0
    }
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: u32,
    resets_at: Instant,
}

/// Process-local limiter backed by a DashMap entry per key
#[derive(Default)]
pub struct InMemoryRateLimiter {
    windows: DashMap<RateLimitKey, WindowState>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check_at(
        &self,
        key: &RateLimitKey,
        policy: RateLimitPolicy,
        now: Instant,
    ) -> RateDecision {
        let mut entry = self.windows.entry(key.clone()).or_insert(WindowState {
            count: 0,
            resets_at: now + policy.window,
        });

        if now >= entry.resets_at {
            *entry = WindowState {
                count: 0,
                resets_at: now + policy.window,
            };
        }

        entry.count = entry.count.saturating_add(1);

        RateDecision {
            allowed: entry.count <= policy.max_requests,
            current_count: entry.count,
            policy,
            reset_after: entry.resets_at.saturating_duration_since(now),
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: &RateLimitKey, policy: RateLimitPolicy) -> RateDecision {
        self.check_at(key, policy, Instant::now())
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, state| state.resets_at > now);
        before.saturating_sub(self.windows.len())
    }
}

/// Shared limiter: one atomic `INCR`/`PEXPIRE` script call per request
pub struct RedisRateLimiter {
    redis: ConnectionManager,
    script: Script,
    timeout: Duration,
}

impl RedisRateLimiter {
    pub fn new(redis: ConnectionManager, timeout: Duration) -> Self {
        Self {
            redis,
            script: Script::new(WINDOW_SCRIPT),
            timeout,
        }
    }

    async fn incr_window(
        &self,
        key: &RateLimitKey,
        policy: RateLimitPolicy,
    ) -> redis::RedisResult<(u32, i64)> {
        let mut conn = self.redis.clone();
        self.script
            .key(key.redis_key())
            .arg(policy.window.as_millis() as u64)
            .invoke_async(&mut conn)
            .await
    }
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: &RateLimitKey, policy: RateLimitPolicy) -> RateDecision {
        match timeout(self.timeout, self.incr_window(key, policy)).await {
            Ok(Ok((count, ttl_ms))) => {
                let reset_after = if ttl_ms > 0 {
                    Duration::from_millis(ttl_ms as u64)
                } else {
                    policy.window
                };
                RateDecision {
                    allowed: count <= policy.max_requests,
                    current_count: count,
                    policy,
                    reset_after,
                }
            }
            Ok(Err(e)) => {
                tracing::warn!(key = %key, error = %e, "Rate limit Redis error (allowing request)");
                RateDecision::allow_open(policy)
            }
            Err(_) => {
                tracing::warn!(
                    key = %key,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Rate limit Redis timeout (allowing request)"
                );
                RateDecision::allow_open(policy)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthenticatedUser;

    fn user_key(stream_id: Uuid, action: RateLimitAction) -> RateLimitKey {
        let actor = Actor::Authenticated(AuthenticatedUser {
            id: Uuid::nil(),
            display_name: "viewer".into(),
            kyc_tier: 0,
        });
        RateLimitKey::new(&actor, stream_id, action)
    }

    #[test]
    fn test_sixth_chat_in_window_is_rejected() {
        let limiter = InMemoryRateLimiter::new();
        let key = user_key(Uuid::new_v4(), RateLimitAction::Chat);
        let policy = RateLimitPolicy::per_window(5, Duration::from_secs(1));
        let now = Instant::now();

        for i in 1..=5 {
            let decision = limiter.check_at(&key, policy, now);
            assert!(decision.allowed, "request {i} should pass");
        }

        let decision = limiter.check_at(&key, policy, now + Duration::from_millis(200));
        assert!(!decision.allowed);
        assert_eq!(decision.current_count, 6);
        assert_eq!(decision.retry_after_seconds(), 1);

        match decision.into_result() {
            Err(AppError::RateLimited {
                limit,
                window_seconds,
                retry_after_seconds,
                current_count,
            }) => {
                assert_eq!(limit, 5);
                assert_eq!(window_seconds, 1);
                assert!(retry_after_seconds >= 1);
                assert_eq!(current_count, 6);
            }
            other => panic!("expected rate limit error, got {other:?}"),
        }
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = InMemoryRateLimiter::new();
        let key = user_key(Uuid::new_v4(), RateLimitAction::Reaction);
        let policy = RateLimitPolicy::per_window(10, Duration::from_secs(1));
        let now = Instant::now();

        for _ in 0..11 {
            limiter.check_at(&key, policy, now);
        }
        assert!(!limiter.check_at(&key, policy, now).allowed);

        let later = now + Duration::from_millis(1001);
        let decision = limiter.check_at(&key, policy, later);
        assert!(decision.allowed);
        assert_eq!(decision.current_count, 1);
    }

    #[test]
    fn test_keys_are_isolated_by_action_and_stream() {
        let limiter = InMemoryRateLimiter::new();
        let stream_id = Uuid::new_v4();
        let policy = RateLimitPolicy::per_window(1, Duration::from_secs(1));
        let now = Instant::now();

        assert!(limiter.check_at(&user_key(stream_id, RateLimitAction::Chat), policy, now).allowed);
        assert!(limiter.check_at(&user_key(stream_id, RateLimitAction::Reaction), policy, now).allowed);
        assert!(limiter.check_at(&user_key(Uuid::new_v4(), RateLimitAction::Chat), policy, now).allowed);
        assert!(!limiter.check_at(&user_key(stream_id, RateLimitAction::Chat), policy, now).allowed);
    }

    #[test]
    fn test_anonymous_identity_in_key() {
        let stream_id = Uuid::nil();
        let actor = Actor::Anonymous {
            connection_id: "10.1.2.3".into(),
        };
        let key = RateLimitKey::new(&actor, stream_id, RateLimitAction::Chat);
        assert_eq!(
            key.redis_key(),
            format!("live:rl:chat:{}:anon:10.1.2.3", stream_id)
        );
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let decision = RateDecision {
            allowed: false,
            current_count: 11,
            policy: RateLimitPolicy::per_window(10, Duration::from_secs(1)),
            reset_after: Duration::from_millis(1),
        };
        assert_eq!(decision.retry_after_seconds(), 1);

        let decision = RateDecision {
            reset_after: Duration::from_millis(1500),
            ..decision
        };
        assert_eq!(decision.retry_after_seconds(), 2);
    }

    #[tokio::test]
    async fn test_purge_drops_closed_windows() {
        let limiter = InMemoryRateLimiter::new();
        let policy = RateLimitPolicy::per_window(5, Duration::from_millis(10));
        limiter
            .check(&user_key(Uuid::new_v4(), RateLimitAction::Chat), policy)
            .await;
        assert_eq!(limiter.tracked_keys(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(limiter.purge_expired(), 1);
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
