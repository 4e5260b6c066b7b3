//! In-memory fixed-window limiter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use super::config::RateLimitConfig;

/// Outcome of counting one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the client's current window resets.
    pub reset_after: Duration,
}

/// Counter for one client.
#[derive(Debug)]
struct WindowEntry {
    started: Instant,
    count: u32,
}

/// Fixed-window request counter keyed by client.
#[derive(Clone)]
pub struct FixedWindowLimiter {
    clients: Arc<RwLock<HashMap<String, WindowEntry>>>,
    config: Arc<RateLimitConfig>,
}

impl FixedWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count a request from `client` and decide whether it may proceed.
    pub async fn check(&self, client: &str) -> Decision {
        self.check_at(client, Instant::now()).await
    }

    pub(crate) async fn check_at(&self, client: &str, now: Instant) -> Decision {
        let window = self.config.window;
        let limit = self.config.max_requests;

        let mut clients = self.clients.write().await;

        // Drop expired windows so the map does not grow without bound
        clients.retain(|_, e| now.saturating_duration_since(e.started) < window);

        let entry = clients
            .entry(client.to_string())
            .or_insert(WindowEntry {
                started: now,
                count: 0,
            });
        entry.count = entry.count.saturating_add(1);

        let reset_after = window.saturating_sub(now.saturating_duration_since(entry.started));
        Decision {
            allowed: entry.count <= limit,
            limit,
            remaining: limit.saturating_sub(entry.count),
            reset_after,
        }
    }

    /// Number of clients with an open window.
    pub async fn tracked_clients(&self) -> usize {
        self.clients.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> FixedWindowLimiter {
        FixedWindowLimiter::new(RateLimitConfig::new(Duration::from_secs(window_secs), max))
    }

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = limiter(2, 60);
        let now = Instant::now();

        let first = limiter.check_at("1.1.1.1", now).await;
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);

        assert!(limiter.check_at("1.1.1.1", now).await.allowed);

        let third = limiter.check_at("1.1.1.1", now).await;
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0);
    }

    #[tokio::test]
    async fn test_clients_are_independent() {
        let limiter = limiter(1, 60);
        let now = Instant::now();

        assert!(limiter.check_at("a", now).await.allowed);
        assert!(!limiter.check_at("a", now).await.allowed);
        assert!(limiter.check_at("b", now).await.allowed);
        assert_eq!(limiter.tracked_clients().await, 2);
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = limiter(1, 60);
        let start = Instant::now();

        assert!(limiter.check_at("a", start).await.allowed);
        let blocked = limiter.check_at("a", start + Duration::from_secs(30)).await;
        assert!(!blocked.allowed);
        assert_eq!(blocked.reset_after, Duration::from_secs(30));

        let later = limiter.check_at("a", start + Duration::from_secs(61)).await;
        assert!(later.allowed);
    }
}
