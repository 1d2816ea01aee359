//! In-memory sliding-window rate limiter keyed by `(route, client)`.
//!
//! Each key keeps the timestamps of its accepted requests. A call is allowed
//! when fewer than `limit` of them fall inside the trailing minute. A
//! background task drops stale timestamps and empty keys so memory follows
//! active traffic only. Nothing is persisted; a restart resets all counters.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Enforcement window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// How often the background sweep runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Timestamps older than this are dropped by the sweep. Longer than
/// [`WINDOW`] to tolerate clock and processing skew.
pub const SWEEP_RETENTION: Duration = Duration::from_secs(2 * 60);

/// route -> client -> accepted request timestamps (oldest first)
type Windows = HashMap<String, HashMap<String, Vec<Instant>>>;

/// Concurrency-safe sliding-window limiter.
///
/// One mutex guards the whole map; [`RateLimiter::allow`] and the sweep are
/// mutually exclusive.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<Windows>,
    cancel: CancellationToken,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// `now - span`, or `None` when that predates the monotonic clock's origin.
fn cutoff(now: Instant, span: Duration) -> Option<Instant> {
    now.checked_sub(span)
}

fn is_recent(at: &Instant, cutoff: Option<Instant>) -> bool {
    cutoff.is_none_or(|c| *at > c)
}

impl RateLimiter {
    /// Create a limiter without a background sweep.
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            cancel: CancellationToken::new(),
            sweeper: Mutex::new(None),
        }
    }

    /// Create a limiter and spawn its periodic sweep on the current tokio
    /// runtime. Call [`RateLimiter::shutdown`] to stop it.
    pub fn start() -> Arc<Self> {
        Self::start_with_interval(SWEEP_INTERVAL)
    }

    /// [`RateLimiter::start`] with a custom sweep interval.
    pub fn start_with_interval(every: Duration) -> Arc<Self> {
        let limiter = Arc::new(Self::new());
        let handle = spawn_sweeper(Arc::downgrade(&limiter), limiter.cancel.clone(), every);
        *lock(&limiter.sweeper) = Some(handle);
        info!(every_secs = every.as_secs(), "rate limiter started");
        limiter
    }

    /// Record a request from `client_id` to `route` if it is within `limit`
    /// requests per minute. Denied requests are not recorded.
    pub fn allow(&self, client_id: &str, route: &str, limit: usize) -> bool {
        self.allow_at(client_id, route, limit, Instant::now())
    }

    fn allow_at(&self, client_id: &str, route: &str, limit: usize, now: Instant) -> bool {
        let window_start = cutoff(now, WINDOW);
        let mut windows = lock(&self.windows);
        let timestamps = windows
            .entry(route.to_string())
            .or_default()
            .entry(client_id.to_string())
            .or_default();

        timestamps.retain(|at| is_recent(at, window_start));
        if timestamps.len() >= limit {
            return false;
        }
        timestamps.push(now);
        true
    }

    /// Drop stale timestamps and empty keys. Returns the number of
    /// `(route, client)` keys removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let retain_after = cutoff(now, SWEEP_RETENTION);
        let mut windows = lock(&self.windows);
        let mut removed = 0;

        windows.retain(|_, clients| {
            clients.retain(|_, timestamps| {
                timestamps.retain(|at| is_recent(at, retain_after));
                let keep = !timestamps.is_empty();
                if !keep {
                    removed += 1;
                }
                keep
            });
            !clients.is_empty()
        });
        removed
    }

    /// Number of `(route, client)` keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        lock(&self.windows).values().map(HashMap::len).sum()
    }

    /// Whether the background sweep is still scheduled.
    pub fn is_sweeping(&self) -> bool {
        lock(&self.sweeper)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the background sweep and wait for it to exit. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = lock(&self.sweeper).take();
        if let Some(handle) = handle {
            let _ = handle.await;
            info!("rate limiter stopped");
        }
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// A panic while holding the lock cannot leave the map half-updated in a way
/// that matters for throttling, so poisoning is ignored.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn spawn_sweeper(
    limiter: Weak<RateLimiter>,
    cancel: CancellationToken,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(limiter) = limiter.upgrade() else { break };
                    let removed = limiter.sweep();
                    debug!(removed, remaining = limiter.tracked_keys(), "rate limiter sweep");
                }
            }
        }
        debug!("rate limiter sweep exited");
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_denies() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert!(limiter.allow("127.0.0.1", "/test", 10));
        }
        assert!(!limiter.allow("127.0.0.1", "/test", 10));
    }

    #[test]
    fn denied_requests_are_not_recorded() {
        let limiter = RateLimiter::new();
        let base = Instant::now();
        assert!(limiter.allow_at("c", "/r", 1, base));
        for i in 1..5 {
            assert!(!limiter.allow_at("c", "/r", 1, base + Duration::from_secs(i)));
        }
        // Only the accepted request ages out; the denials never counted.
        assert!(limiter.allow_at("c", "/r", 1, base + WINDOW + Duration::from_millis(1)));
    }

    #[test]
    fn routes_are_independent() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert!(limiter.allow("127.0.0.1", "/test1", 10));
        }
        assert!(limiter.allow("127.0.0.1", "/test2", 100));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = RateLimiter::new();
        for _ in 0..10 {
            assert!(limiter.allow("127.0.0.1", "/test", 10));
        }
        assert!(limiter.allow("127.0.0.2", "/test", 10));
        assert!(!limiter.allow("127.0.0.1", "/test", 10));
    }

    #[test]
    fn recent_requests_count_toward_limit() {
        let limiter = RateLimiter::new();
        let base = Instant::now();
        lock(&limiter.windows).insert(
            "/test".to_string(),
            HashMap::from([(
                "127.0.0.1".to_string(),
                vec![base, base + Duration::from_secs(10), base + Duration::from_secs(20)],
            )]),
        );

        let now = base + Duration::from_secs(30);
        assert!(limiter.allow_at("127.0.0.1", "/test", 5, now));
        assert!(limiter.allow_at("127.0.0.1", "/test", 5, now));
        assert!(!limiter.allow_at("127.0.0.1", "/test", 5, now));
    }

    #[test]
    fn old_requests_slide_out_of_window() {
        let limiter = RateLimiter::new();
        let base = Instant::now();
        lock(&limiter.windows).insert(
            "/test".to_string(),
            HashMap::from([("127.0.0.1".to_string(), vec![base; 5])]),
        );

        assert!(!limiter.allow_at("127.0.0.1", "/test", 5, base + Duration::from_secs(59)));

        let later = base + Duration::from_secs(61);
        for _ in 0..5 {
            assert!(limiter.allow_at("127.0.0.1", "/test", 5, later));
        }
        assert!(!limiter.allow_at("127.0.0.1", "/test", 5, later));
    }

    #[test]
    fn sweep_drops_stale_entries_and_empty_maps() {
        let limiter = RateLimiter::new();
        let base = Instant::now();
        assert!(limiter.allow_at("old", "/login", 5, base));
        assert!(limiter.allow_at("old", "/refresh", 5, base));
        assert!(limiter.allow_at("fresh", "/login", 5, base + Duration::from_secs(150)));
        assert_eq!(limiter.tracked_keys(), 3);

        let removed = limiter.sweep_at(base + Duration::from_secs(180));
        assert_eq!(removed, 2);
        assert_eq!(limiter.tracked_keys(), 1);

        let windows = lock(&limiter.windows);
        assert!(!windows.contains_key("/refresh"));
        assert_eq!(windows["/login"].len(), 1);
        assert!(windows["/login"].contains_key("fresh"));
    }

    #[test]
    fn sweep_keeps_entries_between_window_and_retention() {
        let limiter = RateLimiter::new();
        let base = Instant::now();
        assert!(limiter.allow_at("c", "/login", 5, base));
        // 90s old: outside the enforcement window, inside retention.
        assert_eq!(limiter.sweep_at(base + Duration::from_secs(90)), 0);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_runs_and_shuts_down() {
        let limiter = RateLimiter::start_with_interval(Duration::from_secs(300));
        assert!(limiter.is_sweeping());
        lock(&limiter.windows).insert(
            "/login".to_string(),
            HashMap::from([("1.2.3.4".to_string(), Vec::new())]),
        );

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(limiter.tracked_keys(), 0);

        limiter.shutdown().await;
        assert!(!limiter.is_sweeping());
        // Second shutdown is a no-op.
        limiter.shutdown().await;
    }

    #[tokio::test]
    async fn dropping_limiter_stops_sweep() {
        let limiter = RateLimiter::start();
        let cancel = limiter.cancel.clone();
        drop(limiter);
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn concurrent_callers_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..50)
                        .filter(|_| limiter.allow("shared", "/login", 100))
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 100);
    }
}
