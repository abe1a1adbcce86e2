use super::StoreResult;
use crate::models::SwipeEvent;
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::collections::HashSet;
use tracing::debug;

/// Result of an append against the ledger's idempotent write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Recorded,
    Duplicate,
}

/// Idempotency key for a swipe. A transport-level retry of the same decision
/// carries the same key and must not double-count.
pub fn idempotency_key(event: &SwipeEvent) -> String {
    format!(
        "{}:{}:{}",
        event.user_id, event.product_id, event.session_id
    )
}

/// Append-only log of swipe events, the ground truth for preference learning.
#[async_trait]
pub trait SwipeStore: Send + Sync {
    /// Appends unless the idempotency key has been seen before.
    async fn append(&self, event: SwipeEvent) -> StoreResult<AppendOutcome>;

    /// Most recent events first, truncated to `max`.
    async fn list_for_user(&self, user_id: &str, max: usize) -> StoreResult<Vec<SwipeEvent>>;

    /// Every product id the user has ever swiped on, liked or rejected.
    async fn swiped_ids(&self, user_id: &str) -> StoreResult<HashSet<String>>;

    async fn count_for_user(&self, user_id: &str) -> StoreResult<u64>;
}

#[derive(Default)]
pub struct InMemorySwipeLedger {
    events: DashMap<String, Vec<SwipeEvent>>,
    seen_keys: DashSet<String>,
}

impl InMemorySwipeLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SwipeStore for InMemorySwipeLedger {
    async fn append(&self, event: SwipeEvent) -> StoreResult<AppendOutcome> {
        let key = idempotency_key(&event);
        if !self.seen_keys.insert(key) {
            debug!(
                user_id = %event.user_id,
                product_id = %event.product_id,
                "Duplicate swipe ignored"
            );
            return Ok(AppendOutcome::Duplicate);
        }

        self.events
            .entry(event.user_id.clone())
            .or_default()
            .push(event);

        Ok(AppendOutcome::Recorded)
    }

    async fn list_for_user(&self, user_id: &str, max: usize) -> StoreResult<Vec<SwipeEvent>> {
        let mut events = self
            .events
            .get(user_id)
            .map(|entry| entry.clone())
            .unwrap_or_default();

        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        events.truncate(max);

        Ok(events)
    }

    async fn swiped_ids(&self, user_id: &str) -> StoreResult<HashSet<String>> {
        Ok(self
            .events
            .get(user_id)
            .map(|entry| entry.iter().map(|e| e.product_id.clone()).collect())
            .unwrap_or_default())
    }

    async fn count_for_user(&self, user_id: &str) -> StoreResult<u64> {
        Ok(self
            .events
            .get(user_id)
            .map(|entry| entry.len() as u64)
            .unwrap_or(0))
    }
}
