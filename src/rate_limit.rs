use std::time::{Duration, Instant};

use dashmap::DashMap;

/// Per-email login brute force limiter: after `max_failures` failed attempts
/// inside `window`, further attempts are refused until the window lapses.
pub struct LoginRateLimiter {
    /// email -> (failed_count, window_start)
    entries: DashMap<String, (u32, Instant)>,
    max_failures: u32,
    window: Duration,
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(15 * 60))
    }
}

impl LoginRateLimiter {
    pub fn new(max_failures: u32, window: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_failures,
            window,
        }
    }

    /// Check if a login attempt is allowed. Returns the seconds to wait when not.
    /// Does NOT increment the counter; call `record_failure()` on a bad password.
    pub fn check(&self, email: &str) -> Result<(), u64> {
        let now = Instant::now();

        let Some(entry) = self.entries.get(&email.to_lowercase()) else {
            return Ok(());
        };
        let (count, start) = *entry.value();

        if now.duration_since(start) > self.window || count < self.max_failures {
            return Ok(());
        }

        let elapsed = now.duration_since(start).as_secs();
        Err(self.window.as_secs().saturating_sub(elapsed))
    }

    pub fn record_failure(&self, email: &str) {
        let now = Instant::now();

        let mut entry = self.entries.entry(email.to_lowercase()).or_insert((0, now));
        let (count, start) = entry.value_mut();

        if now.duration_since(*start) > self.window {
            *count = 1;
            *start = now;
        } else {
            *count += 1;
        }
    }

    /// Forget failures for `email` after a successful login.
    pub fn reset(&self, email: &str) {
        self.entries.remove(&email.to_lowercase());
    }

    /// Remove entries whose window has lapsed.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.entries
            .retain(|_, (_, start)| now.duration_since(*start) <= self.window);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_max_failures() {
        let limiter = LoginRateLimiter::new(3, Duration::from_secs(60));
        for _ in 0..2 {
            limiter.record_failure("Reader@Example.com");
            assert!(limiter.check("reader@example.com").is_ok());
        }
        limiter.record_failure("reader@example.com");
        let wait = limiter.check("READER@example.com").unwrap_err();
        assert!(wait <= 60);
    }

    #[test]
    fn reset_clears_failures() {
        let limiter = LoginRateLimiter::new(1, Duration::from_secs(60));
        limiter.record_failure("a@b.co");
        assert!(limiter.check("a@b.co").is_err());
        limiter.reset("a@b.co");
        assert!(limiter.check("a@b.co").is_ok());
    }

    #[test]
    fn lapsed_window_allows_again() {
        let limiter = LoginRateLimiter::new(1, Duration::ZERO);
        limiter.record_failure("a@b.co");
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.check("a@b.co").is_ok());
        limiter.cleanup();
        assert!(limiter.entries.is_empty());
    }
}
