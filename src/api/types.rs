//! Shared types for the HTTP API layer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core_state::CoreState;
use crate::models::Page;

/// Failed logins per email before the account is locked out.
const LOGIN_MAX_FAILURES: usize = 5;
/// Window over which failed logins are counted, and lockout duration.
const LOGIN_WINDOW: Duration = Duration::from_secs(15 * 60);
/// Tracked keys above which stale entries are swept.
const MAX_TRACKED_KEYS: usize = 10_000;
const RATE_WINDOW: Duration = Duration::from_secs(3600);

// ═══════════════════════════════════════════════════════════
// API context: shared state for the router
// ═══════════════════════════════════════════════════════════

/// Shared context for all API routes and middleware.
/// Wraps `CoreState` plus API-specific throttling state.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub login_lockout: Arc<Mutex<LoginLockout>>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self {
            core,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new())),
            login_lockout: Arc::new(Mutex::new(LoginLockout::new())),
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Pagination
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.page_size)
    }
}

/// Envelope for every list endpoint.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: u64,
    pub page: u32,
    pub page_size: u32,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new((results, count): (Vec<T>, u64), page: Page) -> Self {
        Self {
            count,
            page: page.page,
            page_size: page.page_size,
            results,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// Rate limiter: per-client sliding window
// ═══════════════════════════════════════════════════════════

/// Per-client rate limiter with per-minute and per-hour limits.
pub struct RateLimiter {
    windows: HashMap<String, Vec<Instant>>,
    per_minute: u32,
    per_hour: u32,
    max_keys: usize,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_limits(100, 1000)
    }

    pub fn with_limits(per_minute: u32, per_hour: u32) -> Self {
        Self {
            windows: HashMap::new(),
            per_minute,
            per_hour,
            max_keys: MAX_TRACKED_KEYS,
        }
    }

    /// Check if a client is within rate limits. Returns `Ok(())` or
    /// `Err(retry_after_secs)` if exceeded.
    pub fn check(&mut self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        if self.windows.len() > self.max_keys {
            self.windows
                .retain(|_, v| v.iter().any(|ts| now.duration_since(*ts) < RATE_WINDOW));
        }
        let entries = self.windows.entry(key.to_string()).or_default();

        entries.retain(|ts| now.duration_since(*ts) < RATE_WINDOW);

        let last_minute = entries
            .iter()
            .filter(|ts| now.duration_since(**ts) < Duration::from_secs(60))
            .count() as u32;
        if last_minute >= self.per_minute {
            return Err(60);
        }

        if entries.len() as u32 >= self.per_hour {
            return Err(3600);
        }

        entries.push(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════
// Login lockout: per-email failure counter
// ═══════════════════════════════════════════════════════════

/// Locks an email out after repeated failed logins.
pub struct LoginLockout {
    failures: HashMap<String, Vec<Instant>>,
    max_failures: usize,
    window: Duration,
}

impl LoginLockout {
    pub fn new() -> Self {
        Self {
            failures: HashMap::new(),
            max_failures: LOGIN_MAX_FAILURES,
            window: LOGIN_WINDOW,
        }
    }

    fn key(email: &str) -> String {
        email.trim().to_lowercase()
    }

    /// `Err(retry_after_secs)` while the email is locked out.
    pub fn check(&mut self, email: &str) -> Result<(), u64> {
        let now = Instant::now();
        let window = self.window;
        let Some(entries) = self.failures.get_mut(&Self::key(email)) else {
            return Ok(());
        };
        entries.retain(|ts| now.duration_since(*ts) < window);
        if entries.len() < self.max_failures {
            return Ok(());
        }
        let oldest = entries.iter().min().copied().unwrap_or(now);
        let remaining = window.saturating_sub(now.duration_since(oldest));
        Err(remaining.as_secs().max(1))
    }

    pub fn record_failure(&mut self, email: &str) {
        let now = Instant::now();
        if self.failures.len() > MAX_TRACKED_KEYS {
            let window = self.window;
            self.failures
                .retain(|_, v| v.iter().any(|ts| now.duration_since(*ts) < window));
        }
        self.failures.entry(Self::key(email)).or_default().push(now);
    }

    pub fn clear(&mut self, email: &str) {
        self.failures.remove(&Self::key(email));
    }
}

impl Default for LoginLockout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_under_limit() {
        let mut limiter = RateLimiter::new();
        assert!(limiter.check("ip:10.0.0.1").is_ok());
        assert!(limiter.check("ip:10.0.0.1").is_ok());
    }

    #[test]
    fn rate_limiter_rejects_over_per_minute() {
        let mut limiter = RateLimiter::with_limits(2, 1000);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("a").is_ok());
        assert_eq!(limiter.check("a"), Err(60));
    }

    #[test]
    fn rate_limiter_rejects_over_per_hour() {
        let mut limiter = RateLimiter::with_limits(100, 3);
        for _ in 0..3 {
            assert!(limiter.check("a").is_ok());
        }
        assert_eq!(limiter.check("a"), Err(3600));
    }

    #[test]
    fn rate_limiter_isolates_clients() {
        let mut limiter = RateLimiter::with_limits(1, 1000);
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert_eq!(limiter.check("a"), Err(60));
    }

    #[test]
    fn rate_limiter_sweeps_stale_clients() {
        let mut limiter = RateLimiter::with_limits(10, 100);
        limiter.max_keys = 2;
        let stale = Instant::now() - Duration::from_secs(7200);
        for key in ["a", "b", "c"] {
            limiter.windows.insert(key.into(), vec![stale]);
        }

        assert!(limiter.check("fresh").is_ok());
        assert_eq!(limiter.windows.len(), 1);
        assert!(limiter.windows.contains_key("fresh"));
    }

    #[test]
    fn rate_limiter_keeps_active_clients_when_sweeping() {
        let mut limiter = RateLimiter::with_limits(10, 100);
        limiter.max_keys = 1;
        assert!(limiter.check("a").is_ok());
        assert!(limiter.check("b").is_ok());
        assert!(limiter.check("c").is_ok());
        assert_eq!(limiter.windows.len(), 3);
    }

    #[test]
    fn lockout_after_max_failures() {
        let mut lockout = LoginLockout::new();
        for _ in 0..LOGIN_MAX_FAILURES - 1 {
            lockout.record_failure("Jane@Example.com");
            assert!(lockout.check("jane@example.com").is_ok());
        }
        lockout.record_failure("jane@example.com");
        let retry = lockout.check("JANE@example.com").unwrap_err();
        assert!(retry > 0 && retry <= LOGIN_WINDOW.as_secs());
        // Other emails are unaffected
        assert!(lockout.check("other@example.com").is_ok());
    }

    #[test]
    fn lockout_clears_on_success() {
        let mut lockout = LoginLockout::new();
        for _ in 0..LOGIN_MAX_FAILURES {
            lockout.record_failure("a@example.com");
        }
        assert!(lockout.check("a@example.com").is_err());
        lockout.clear("a@example.com");
        assert!(lockout.check("a@example.com").is_ok());
    }

    #[test]
    fn expired_failures_do_not_count() {
        let mut lockout = LoginLockout {
            failures: HashMap::new(),
            max_failures: 1,
            window: Duration::from_secs(60),
        };
        lockout
            .failures
            .insert("a@example.com".into(), vec![Instant::now() - Duration::from_secs(120)]);
        assert!(lockout.check("a@example.com").is_ok());
    }

    #[test]
    fn paginated_carries_page_metadata() {
        let page = PageQuery { page: Some(2), page_size: Some(500) }.page();
        let body = Paginated::new((vec![1, 2, 3], 42), page);
        assert_eq!(body.count, 42);
        assert_eq!(body.page, 2);
        assert_eq!(body.page_size, crate::models::MAX_PAGE_SIZE);
    }
}
