use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Past this many tracked clients, idle entries are swept on the next check.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub login_limit: usize,
    pub login_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { login_limit: 5, login_window: Duration::from_secs(15 * 60) }
    }
}

impl RateLimitConfig {
    /// `RL_LOGIN_LIMIT` attempts per `RL_LOGIN_WINDOW` seconds.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let login_limit = get("RL_LOGIN_LIMIT").and_then(|v| v.parse().ok()).unwrap_or(defaults.login_limit);
        let login_window = get("RL_LOGIN_WINDOW")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.login_window);
        Self { login_limit, login_window }
    }
}

/// Sliding-window login limiter, process local, keyed by client ip.
///
/// Every attempt counts, successful or not, so only the passage of time
/// frees up the window.
#[derive(Clone)]
pub struct LoginRateLimiter {
    attempts: Arc<DashMap<String, VecDeque<Instant>>>,
    cfg: RateLimitConfig,
}

impl LoginRateLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self { attempts: Arc::new(DashMap::new()), cfg }
    }

    /// Records an attempt from `ip`; false once the window is full.
    pub fn allow_login(&self, ip: &str) -> bool {
        self.allow_at(ip, Instant::now())
    }

    fn allow_at(&self, ip: &str, now: Instant) -> bool {
        if self.attempts.len() > SWEEP_THRESHOLD {
            self.sweep(now);
        }
        let window = self.cfg.login_window;
        let mut seen = self.attempts.entry(ip.to_string()).or_default();
        while seen.front().is_some_and(|t| now.duration_since(*t) >= window) {
            seen.pop_front();
        }
        if seen.len() >= self.cfg.login_limit {
            return false;
        }
        seen.push_back(now);
        true
    }

    fn sweep(&self, now: Instant) {
        let window = self.cfg.login_window;
        self.attempts.retain(|_, seen| seen.back().is_some_and(|t| now.duration_since(*t) < window));
    }
}
