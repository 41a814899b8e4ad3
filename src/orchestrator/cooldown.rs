//! Per-tenant rate limit for event-driven leaderboard refreshes.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// Remembers when each tenant last refreshed. Process-local.
pub struct Cooldown {
    period: Duration,
    last: Mutex<HashMap<Uuid, Instant>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Claim the slot for `tenant_id`. Returns `false` while the previous
    /// claim is younger than the period. Expired markers are pruned.
    pub async fn try_acquire(&self, tenant_id: Uuid) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock().await;
        last.retain(|_, at| now.duration_since(*at) < self.period);
        match last.get(&tenant_id) {
            Some(at) if now.duration_since(*at) < self.period => false,
            _ => {
                last.insert(tenant_id, now);
                true
            }
        }
    }

    /// Tenants currently cooling down.
    pub async fn tracked(&self) -> usize {
        self.last.lock().await.len()
    }

    /// Forget the marker so the next claim succeeds.
    pub async fn reset(&self, tenant_id: Uuid) {
        self.last.lock().await.remove(&tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_second_claim_inside_period_is_refused() {
        let cooldown = Cooldown::new(Duration::from_secs(300));
        let tenant = Uuid::new_v4();

        assert!(cooldown.try_acquire(tenant).await);
        assert!(!cooldown.try_acquire(tenant).await);
        assert!(cooldown.try_acquire(Uuid::new_v4()).await);

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cooldown.try_acquire(tenant).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_markers_are_pruned() {
        let cooldown = Cooldown::new(Duration::from_secs(300));
        for _ in 0..3 {
            assert!(cooldown.try_acquire(Uuid::new_v4()).await);
        }
        assert_eq!(cooldown.tracked().await, 3);

        tokio::time::advance(Duration::from_secs(301)).await;
        let tenant = Uuid::new_v4();
        assert!(cooldown.try_acquire(tenant).await);
        assert_eq!(cooldown.tracked().await, 1);
    }

    #[tokio::test]
    async fn test_reset_clears_marker() {
        let cooldown = Cooldown::new(Duration::from_secs(300));
        let tenant = Uuid::new_v4();
        assert!(cooldown.try_acquire(tenant).await);
        cooldown.reset(tenant).await;
        assert!(cooldown.try_acquire(tenant).await);
    }

    #[tokio::test]
    async fn test_zero_period_never_blocks() {
        let cooldown = Cooldown::new(Duration::ZERO);
        let tenant = Uuid::new_v4();
        assert!(cooldown.try_acquire(tenant).await);
        assert!(cooldown.try_acquire(tenant).await);
    }
}
