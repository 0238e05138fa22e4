//! Core rate limiter implementation.

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use http::HeaderMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::bucket::{window_ms, Bucket};
use super::client::BucketKey;
use super::clock::{Clock, SystemClock};
use super::decision::Decision;

/// Default number of expired buckets removed per check.
pub const DEFAULT_CLEANUP_BATCH: usize = 5;

/// Buckets a single sweep may inspect per bucket it is allowed to remove.
const SWEEP_VISITS_PER_EVICTION: usize = 4;

/// Per-call rate limit options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitOptions {
    /// Maximum admitted requests per window
    pub limit: u32,
    /// Window length, anchored to each bucket's first request
    pub window: Duration,
    /// Route or operation being protected; `None` shares the default route
    pub key: Option<String>,
}

impl RateLimitOptions {
    /// Create options for `limit` requests per `window` on the default route.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            key: None,
        }
    }

    /// Scope these options to a named route.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

/// In-memory fixed-window rate limiter keyed by route and client.
///
/// Construct one per process and share it (typically behind an `Arc`) with
/// every request handler. The check for a single key is atomic with respect
/// to other checks on that key; checks on keys in different shards of the
/// store proceed without contention.
///
/// Cleanup walks a rotating queue of bucket keys rather than the store, so
/// each check inspects at most `cleanup_batch * 4` buckets however many are
/// live.
pub struct RateLimiter<C: Clock = SystemClock> {
    /// Buckets indexed by route and client
    buckets: DashMap<BucketKey, Bucket>,
    /// Keys of stored buckets in sweep order; each key appears once
    sweep: Mutex<VecDeque<BucketKey>>,
    /// Time source for window boundaries
    clock: C,
    /// Upper bound on expired buckets removed per check
    cleanup_batch: usize,
}

impl RateLimiter<SystemClock> {
    /// Create a rate limiter on the system clock.
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for RateLimiter<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a rate limiter on the given clock.
    pub fn with_clock(clock: C) -> Self {
        Self {
            buckets: DashMap::new(),
            sweep: Mutex::new(VecDeque::new()),
            clock,
            cleanup_batch: DEFAULT_CLEANUP_BATCH,
        }
    }

    /// Set how many expired buckets each check may remove.
    pub fn with_cleanup_batch(mut self, cleanup_batch: usize) -> Self {
        self.cleanup_batch = cleanup_batch;
        self
    }

    /// Check whether a request may proceed, counting it if so.
    ///
    /// The client is identified from the forwarding headers. This never
    /// fails: unusable headers degrade to the unknown-client identifier.
    pub fn check(&self, headers: &HeaderMap, options: &RateLimitOptions) -> Decision {
        let key = BucketKey::from_headers(options.key.as_deref(), headers);
        self.check_key(key, options)
    }

    /// Check a request for an already known client identifier.
    pub fn check_client(&self, client: &str, options: &RateLimitOptions) -> Decision {
        let key = BucketKey::new(options.key.as_deref(), client);
        self.check_key(key, options)
    }

    fn check_key(&self, key: BucketKey, options: &RateLimitOptions) -> Decision {
        let now = self.clock.now_ms();
        let limit = options.limit;

        trace!(key = %key, limit = limit, "Checking rate limit");

        self.evict_expired(now);

        if limit == 0 {
            debug!(key = %key, "Rate limit is zero, rejecting");
            let reset_after_ms = window_ms(options.window);
            return Decision {
                allowed: false,
                limit,
                remaining: 0,
                reset_at: now.saturating_add(reset_after_ms),
                reset_after_ms,
            };
        }

        // The entry guard holds the shard lock until the decision is made.
        let (allowed, bucket, created) = match self.buckets.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    let bucket = Bucket::open(now, options.window);
                    occupied.insert(bucket);
                    (true, bucket, None)
                } else {
                    let allowed = occupied.get_mut().try_admit(limit);
                    if !allowed {
                        debug!(key = %occupied.key(), "Rate limit exceeded");
                    }
                    (allowed, *occupied.get(), None)
                }
            }
            Entry::Vacant(vacant) => {
                debug!(
                    key = %vacant.key(),
                    limit = limit,
                    window_ms = window_ms(options.window),
                    "Creating new rate limit bucket"
                );
                let bucket = Bucket::open(now, options.window);
                let key = vacant.key().clone();
                vacant.insert(bucket);
                (true, bucket, Some(key))
            }
        };

        // Queued after the shard lock is released; sweeps lock the queue
        // before touching shards.
        if let Some(key) = created {
            if self.cleanup_batch > 0 {
                self.sweep.lock().push_back(key);
            }
        }

        Decision {
            allowed,
            limit,
            remaining: if allowed {
                limit.saturating_sub(bucket.count())
            } else {
                0
            },
            reset_at: bucket.reset_at(),
            reset_after_ms: bucket.remaining_ms(now),
        }
    }

    /// Remove up to `cleanup_batch` expired buckets.
    ///
    /// Keys are taken from the front of the sweep queue; live buckets go to
    /// the back so later sweeps reach the rest of the store. A sweep stops
    /// after `cleanup_batch` removals or `cleanup_batch * 4` visits, and is
    /// skipped when another check is already sweeping.
    fn evict_expired(&self, now: u64) -> Sweep {
        let mut sweep = Sweep::default();
        if self.cleanup_batch == 0 {
            return sweep;
        }

        let Some(mut queue) = self.sweep.try_lock() else {
            return sweep;
        };

        let max_visits = self
            .cleanup_batch
            .saturating_mul(SWEEP_VISITS_PER_EVICTION)
            .min(queue.len());

        while sweep.visited < max_visits && sweep.removed < self.cleanup_batch {
            let Some(key) = queue.pop_front() else {
                break;
            };
            sweep.visited += 1;

            if self
                .buckets
                .remove_if(&key, |_, bucket| bucket.is_expired(now))
                .is_some()
            {
                sweep.removed += 1;
            } else if self.buckets.contains_key(&key) {
                queue.push_back(key);
            }
        }

        if sweep.removed > 0 {
            debug!(
                removed = sweep.removed,
                visited = sweep.visited,
                "Evicted expired rate limit buckets"
            );
        }
        sweep
    }

    /// Requests counted so far in the live window for a route and client.
    ///
    /// Returns `None` if no live bucket exists.
    pub fn current_count(&self, route: Option<&str>, client: &str) -> Option<u32> {
        let now = self.clock.now_ms();
        let key = BucketKey::new(route, client);
        self.buckets
            .get(&key)
            .filter(|bucket| !bucket.is_expired(now))
            .map(|bucket| bucket.count())
    }

    /// Number of buckets held, including expired ones not yet evicted.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Clear all buckets.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        let mut queue = self.sweep.lock();
        self.buckets.clear();
        queue.clear();
    }
}

/// Outcome of one cleanup sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Sweep {
    visited: usize,
    removed: usize,
}
