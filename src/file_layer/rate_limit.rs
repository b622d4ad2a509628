//! Global sliding-window token bucket rate limiter.
//!
//! One shared limiter guards every write regardless of target path, rather
//! than a per-path bucket: a single slow or hostile caller should not be able
//! to starve writers to other files by exhausting their own private budget.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Admits at most `limit_per_sec` operations in any trailing one-second window,
/// waiting up to `max_wait` for room before giving up.
pub struct RateLimiter {
    limit_per_sec: u32,
    max_wait: Duration,
    window: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit_per_sec: u32, max_wait: Duration) -> Self {
        Self {
            limit_per_sec,
            max_wait,
            window: Mutex::new(VecDeque::new()),
        }
    }

    pub fn limit_per_sec(&self) -> u32 {
        self.limit_per_sec
    }

    /// Wait for admission, polling the sliding window until a slot opens or
    /// `max_wait` elapses.
    pub async fn acquire(&self, _operation: &str) -> Result<(), ()> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let wait = {
                let mut window = self.window.lock().expect("rate limiter poisoned");
                let now = Instant::now();
                let one_sec_ago = now - Duration::from_secs(1);
                while matches!(window.front(), Some(t) if *t < one_sec_ago) {
                    window.pop_front();
                }
                if window.len() < self.limit_per_sec as usize {
                    window.push_back(now);
                    return Ok(());
                }
                window
                    .front()
                    .map(|oldest| (*oldest + Duration::from_secs(1)).saturating_duration_since(now))
            };

            let Some(wait) = wait else {
                continue;
            };
            if Instant::now() + wait > deadline {
                return Err(());
            }
            tokio::time::sleep(wait.min(Duration::from_millis(25))).await;
            if Instant::now() > deadline {
                return Err(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_limit_immediately() {
        let limiter = RateLimiter::new(5, Duration::from_millis(500));
        for _ in 0..5 {
            assert!(limiter.acquire("write").await.is_ok());
        }
    }

    #[tokio::test]
    async fn rejects_burst_beyond_limit_and_wait() {
        let limiter = RateLimiter::new(2, Duration::from_millis(10));
        assert!(limiter.acquire("write").await.is_ok());
        assert!(limiter.acquire("write").await.is_ok());
        let result = limiter.acquire("write").await;
        assert!(result.is_err());
    }
}
