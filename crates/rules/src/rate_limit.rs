//! Token-bucket admission control keyed by `(guild, category)`.
//!
//! Buckets are created lazily on the first check and refilled lazily on each
//! subsequent one; there are no background timers. Nothing is persisted, so
//! a restart simply hands every guild a full burst again.
//!
//! The outer map lock is held only long enough to find or create a bucket.
//! Each bucket has its own lock, which serializes concurrent checks for the
//! same key without contention across keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::error;

use guildwatch_core::{ConfigKey, RateLimitConfig};

/// Per-key bucket state.
///
/// The rate it was last refilled at is kept alongside the tokens so an idle
/// sweep can tell whether the bucket has refilled without a config at hand.
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    per_minute: u32,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(config: &RateLimitConfig, now: Instant) -> Self {
        Self {
            tokens: capacity(config),
            capacity: capacity(config),
            per_minute: config.per_minute,
            last_refill: now,
        }
    }

    fn refill(&mut self, config: &RateLimitConfig, now: Instant) {
        self.capacity = capacity(config);
        self.per_minute = config.per_minute;
        self.tokens = self.tokens_at(now);
        self.last_refill = self.last_refill.max(now);
    }

    /// Tokens the bucket would hold at `now` under its last known rate.
    fn tokens_at(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        // Multiply before dividing so whole refill periods land on exact
        // token counts.
        let refilled = elapsed * self.per_minute as f64 / 60.0;
        (self.tokens + refilled).min(self.capacity)
    }

    fn try_acquire(&mut self, config: &RateLimitConfig, now: Instant) -> bool {
        self.refill(config, now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Bucket capacity. A burst of zero would block the category forever, so
/// it is treated as one.
fn capacity(config: &RateLimitConfig) -> f64 {
    config.burst.max(1) as f64
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            // A poisoned bucket only risks a stale token count; refusing
            // every event for the key would be worse.
            error!(what, "rate limiter lock poisoned, recovering with stale state");
            poisoned.into_inner()
        }
    }
}

/// In-memory token buckets for every `(guild, category)` seen so far.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<ConfigKey, Arc<Mutex<TokenBucket>>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to consume one token for `key`.
    ///
    /// Always admits when the config has rate limiting disabled. A rejected
    /// check does not consume anything.
    pub fn admit(&self, key: ConfigKey, config: &RateLimitConfig) -> bool {
        self.admit_at(key, config, Instant::now())
    }

    /// Same as [`admit`](Self::admit) with an explicit clock.
    pub fn admit_at(&self, key: ConfigKey, config: &RateLimitConfig, now: Instant) -> bool {
        if !config.enabled {
            return true;
        }
        let bucket = self.bucket(key, config, now);
        let mut bucket = lock(&*bucket, "bucket");
        bucket.try_acquire(config, now)
    }

    /// Tokens currently available for `key`, after refilling to `now`.
    ///
    /// `None` if the key has never been checked.
    pub fn available_at(&self, key: ConfigKey, config: &RateLimitConfig, now: Instant) -> Option<f64> {
        let bucket = lock(&self.buckets, "buckets").get(&key).cloned()?;
        let mut bucket = lock(&*bucket, "bucket");
        bucket.refill(config, now);
        Some(bucket.tokens)
    }

    /// Drop buckets that have not been touched for `idle` and have refilled
    /// to capacity since.
    ///
    /// A bucket that is still short of tokens stays, however long it has
    /// been idle: recreating it would hand the key a fresh burst. Buckets a
    /// concurrent check is holding on to are skipped as well.
    pub fn evict_idle(&self, now: Instant, idle: Duration) -> usize {
        let mut buckets = lock(&self.buckets, "buckets");
        let before = buckets.len();
        buckets.retain(|_, bucket| {
            // Handles are only cloned under the map lock, which we hold.
            if Arc::strong_count(bucket) > 1 {
                return true;
            }
            let bucket = lock(&**bucket, "bucket");
            let untouched = now.saturating_duration_since(bucket.last_refill) >= idle;
            !(untouched && bucket.tokens_at(now) >= bucket.capacity)
        });
        before - buckets.len()
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        lock(&self.buckets, "buckets").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn bucket(&self, key: ConfigKey, config: &RateLimitConfig, now: Instant) -> Arc<Mutex<TokenBucket>> {
        let mut buckets = lock(&self.buckets, "buckets");
        buckets
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(TokenBucket::full(config, now))))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guildwatch_core::{Category, GuildId};

    fn limited(per_minute: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            per_minute,
            burst,
        }
    }

    const KEY: ConfigKey = (GuildId(1), Category::Channels);

    #[test]
    fn burst_then_reject_then_one_after_refill_period() {
        let limiter = RateLimiter::new();
        let cfg = limited(10, 5);
        let t0 = Instant::now();

        for _ in 0..5 {
            assert!(limiter.admit_at(KEY, &cfg, t0));
        }
        assert!(!limiter.admit_at(KEY, &cfg, t0));

        // 60 / perMinute = 6 seconds buys exactly one token.
        let t1 = t0 + Duration::from_secs(6);
        assert!(limiter.admit_at(KEY, &cfg, t1));
        assert!(!limiter.admit_at(KEY, &cfg, t1));
    }

    #[test]
    fn rejection_does_not_consume() {
        let limiter = RateLimiter::new();
        let cfg = limited(60, 1);
        let t0 = Instant::now();
        assert!(limiter.admit_at(KEY, &cfg, t0));
        for _ in 0..10 {
            assert!(!limiter.admit_at(KEY, &cfg, t0 + Duration::from_millis(500)));
        }
        assert!(limiter.admit_at(KEY, &cfg, t0 + Duration::from_secs(1)));
    }

    #[test]
    fn disabled_always_admits() {
        let limiter = RateLimiter::new();
        let cfg = RateLimitConfig {
            enabled: false,
            per_minute: 1,
            burst: 1,
        };
        for _ in 0..100 {
            assert!(limiter.admit(KEY, &cfg));
        }
        assert!(limiter.is_empty(), "disabled checks never create buckets");
    }

    #[test]
    fn refill_is_capped_at_burst() {
        let limiter = RateLimiter::new();
        let cfg = limited(60, 3);
        let t0 = Instant::now();
        assert!(limiter.admit_at(KEY, &cfg, t0));
        let later = t0 + Duration::from_secs(3600);
        assert_eq!(limiter.available_at(KEY, &cfg, later), Some(3.0));
    }

    #[test]
    fn shrinking_burst_clamps_stored_tokens() {
        let limiter = RateLimiter::new();
        let t0 = Instant::now();
        assert!(limiter.admit_at(KEY, &limited(10, 10), t0));
        let smaller = limited(10, 2);
        assert_eq!(limiter.available_at(KEY, &smaller, t0), Some(2.0));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let cfg = limited(1, 1);
        let t0 = Instant::now();
        assert!(limiter.admit_at(KEY, &cfg, t0));
        assert!(!limiter.admit_at(KEY, &cfg, t0));
        assert!(limiter.admit_at((GuildId(1), Category::Roles), &cfg, t0));
        assert!(limiter.admit_at((GuildId(2), Category::Channels), &cfg, t0));
    }

    #[test]
    fn zero_burst_still_admits_one() {
        let limiter = RateLimiter::new();
        let cfg = limited(0, 0);
        let t0 = Instant::now();
        assert!(limiter.admit_at(KEY, &cfg, t0));
        assert!(!limiter.admit_at(KEY, &cfg, t0 + Duration::from_secs(3600)));
    }

    #[test]
    fn evict_idle_drops_untouched_buckets() {
        let limiter = RateLimiter::new();
        let cfg = limited(10, 5);
        let t0 = Instant::now();
        limiter.admit_at(KEY, &cfg, t0);
        limiter.admit_at((GuildId(9), Category::Roles), &cfg, t0 + Duration::from_secs(500));

        let evicted = limiter.evict_idle(t0 + Duration::from_secs(700), Duration::from_secs(600));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn evict_idle_keeps_buckets_that_have_not_refilled() {
        let limiter = RateLimiter::new();
        let cfg = limited(1, 30);
        let t0 = Instant::now();
        let first = (0..40).filter(|_| limiter.admit_at(KEY, &cfg, t0)).count();
        assert_eq!(first, 30);

        // Ten minutes at one token a minute is ten tokens, not thirty.
        let t1 = t0 + Duration::from_secs(601);
        assert_eq!(limiter.evict_idle(t1, Duration::from_secs(600)), 0);
        let after = (0..40).filter(|_| limiter.admit_at(KEY, &cfg, t1)).count();
        assert_eq!(after, 10);

        // Thirty minutes of silence refills it, so it may go.
        let t2 = t1 + Duration::from_secs(1800);
        assert_eq!(limiter.evict_idle(t2, Duration::from_secs(600)), 1);
        assert!(limiter.is_empty());
    }

    #[test]
    fn evict_idle_never_drops_a_bucket_that_cannot_refill() {
        let limiter = RateLimiter::new();
        let cfg = limited(0, 2);
        let t0 = Instant::now();
        assert!(limiter.admit_at(KEY, &cfg, t0));
        let later = t0 + Duration::from_secs(86_400);
        assert_eq!(limiter.evict_idle(later, Duration::from_secs(600)), 0);
        assert!(limiter.admit_at(KEY, &cfg, later));
        assert!(!limiter.admit_at(KEY, &cfg, later));
    }

    #[test]
    fn evict_idle_skips_buckets_held_by_a_check() {
        let limiter = RateLimiter::new();
        let cfg = limited(60, 1);
        let t0 = Instant::now();
        let held = limiter.bucket(KEY, &cfg, t0);
        let later = t0 + Duration::from_secs(3600);
        assert_eq!(limiter.evict_idle(later, Duration::from_secs(600)), 0);
        drop(held);
        assert_eq!(limiter.evict_idle(later, Duration::from_secs(600)), 1);
    }

    #[test]
    fn concurrent_checks_never_overspend() {
        let limiter = Arc::new(RateLimiter::new());
        let cfg = limited(0, 50);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || (0..20).filter(|_| limiter.admit(KEY, &cfg)).count())
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 50);
    }
}
