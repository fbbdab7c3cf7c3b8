// src/mcp/health.rs
// Per-peer health tracking. Grounded on backend/src/mcp/health.rs's
// ServerHealth/HealthMonitor: three consecutive failures mark a peer
// unhealthy, one success recovers it.

use std::collections::HashMap;
use tokio::sync::RwLock;

const UNHEALTHY_AFTER_FAILURES: u32 = 3;

#[derive(Debug, Clone)]
pub struct ServerHealth {
    pub connected: bool,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub last_error: Option<String>,
}

impl Default for ServerHealth {
    fn default() -> Self {
        Self {
            connected: true,
            consecutive_failures: 0,
            total_requests: 0,
            total_failures: 0,
            last_error: None,
        }
    }
}

impl ServerHealth {
    pub fn record_success(&mut self) {
        self.total_requests += 1;
        self.consecutive_failures = 0;
        self.connected = true;
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.total_requests += 1;
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.last_error = Some(error.into());
        if self.consecutive_failures >= UNHEALTHY_AFTER_FAILURES {
            self.connected = false;
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 1.0;
        }
        (self.total_requests - self.total_failures) as f64 / self.total_requests as f64
    }
}

#[derive(Default)]
pub struct HealthMonitor {
    health: RwLock<HashMap<String, ServerHealth>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, peer_name: &str) {
        self.health
            .write()
            .await
            .entry(peer_name.to_string())
            .or_default();
    }

    pub async fn record_success(&self, peer_name: &str) {
        self.health
            .write()
            .await
            .entry(peer_name.to_string())
            .or_default()
            .record_success();
    }

    pub async fn record_failure(&self, peer_name: &str, error: impl Into<String>) {
        self.health
            .write()
            .await
            .entry(peer_name.to_string())
            .or_default()
            .record_failure(error);
    }

    pub async fn is_healthy(&self, peer_name: &str) -> bool {
        self.health
            .read()
            .await
            .get(peer_name)
            .map(|h| h.connected)
            .unwrap_or(false)
    }

    pub async fn snapshot(&self) -> HashMap<String, ServerHealth> {
        self.health.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_consecutive_failures_marks_unhealthy() {
        let mut health = ServerHealth::default();
        health.record_failure("boom");
        health.record_failure("boom");
        assert!(health.connected);
        health.record_failure("boom");
        assert!(!health.connected);
    }

    #[test]
    fn a_single_success_recovers() {
        let mut health = ServerHealth::default();
        for _ in 0..3 {
            health.record_failure("boom");
        }
        assert!(!health.connected);
        health.record_success();
        assert!(health.connected);
        assert_eq!(health.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn monitor_tracks_per_peer() {
        let monitor = HealthMonitor::new();
        monitor.register("jenkins").await;
        monitor.record_failure("jenkins", "timeout").await;
        assert!(monitor.is_healthy("jenkins").await);
        monitor.record_failure("jenkins", "timeout").await;
        monitor.record_failure("jenkins", "timeout").await;
        assert!(!monitor.is_healthy("jenkins").await);
    }
}
