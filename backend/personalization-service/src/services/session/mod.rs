use crate::config::SessionConfig;
use crate::models::{Product, SessionState, SessionSwipe, SwipeOutcome};
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tracing::debug;

/// Short-term taste signal from the current swipe session. Applies within the
/// session only; the long-term profile absorbs the same events through the
/// ledger on its own schedule.
pub struct SessionLearner {
    config: SessionConfig,
}

impl SessionLearner {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Folds one swipe into the session window and bumps the activity clock.
    pub fn update(
        &self,
        mut state: SessionState,
        product: &Product,
        outcome: SwipeOutcome,
        latency_ms: Option<u32>,
    ) -> SessionState {
        state.events.push(SessionSwipe {
            product_id: product.id.clone(),
            outcome,
            latency_ms,
            tags: product.tags.iter().cloned().collect(),
            category: product.category.clone(),
        });

        if state.events.len() > self.config.window {
            let overflow = state.events.len() - self.config.window;
            state.events.drain(..overflow);
        }

        state.last_activity = Utc::now();
        state
    }

    /// Per-tag session weights, normalized to [-1, 1] by the largest absolute
    /// weight. Newest swipes count most: each step back multiplies by the
    /// position decay.
    pub fn signal(&self, state: &SessionState) -> HashMap<String, f64> {
        let mut weights: HashMap<String, f64> = HashMap::new();

        for (steps_back, swipe) in state.events.iter().rev().enumerate() {
            let base = match swipe.outcome {
                SwipeOutcome::Liked => self.config.like_weight,
                SwipeOutcome::Rejected => self.config.reject_weight,
            };
            let weight = base * self.config.position_decay.powi(steps_back as i32);

            for tag in &swipe.tags {
                *weights.entry(tag.clone()).or_insert(0.0) += weight;
            }
        }

        let max_abs = weights
            .values()
            .map(|w| w.abs())
            .fold(0.0_f64, f64::max);
        if max_abs > 0.0 {
            for value in weights.values_mut() {
                *value /= max_abs;
            }
        }

        weights
    }

    /// Categories the session is net-negative on. Fed into retrieval as an
    /// exclusion once the user racks up enough consecutive rejections.
    pub fn rejected_categories(&self, state: &SessionState) -> Vec<String> {
        let mut totals: HashMap<String, f64> = HashMap::new();

        for (steps_back, swipe) in state.events.iter().rev().enumerate() {
            let Some(category) = &swipe.category else {
                continue;
            };
            let base = match swipe.outcome {
                SwipeOutcome::Liked => self.config.like_weight,
                SwipeOutcome::Rejected => self.config.reject_weight,
            };
            let weight = base * self.config.position_decay.powi(steps_back as i32);
            *totals.entry(category.clone()).or_insert(0.0) += weight;
        }

        let mut rejected: Vec<String> = totals
            .into_iter()
            .filter(|(_, weight)| *weight < 0.0)
            .map(|(category, _)| category)
            .collect();
        rejected.sort();
        rejected
    }
}

/// Live sessions keyed by session id. Expired sessions are dropped lazily on
/// access and via `purge_expired`.
pub struct SessionRegistry {
    sessions: DashMap<String, SessionState>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout_secs: u64) -> Self {
        Self {
            sessions: DashMap::new(),
            idle_timeout: Duration::seconds(idle_timeout_secs as i64),
        }
    }

    fn is_expired(&self, state: &SessionState) -> bool {
        Utc::now() - state.last_activity > self.idle_timeout
    }

    /// Read-only snapshot of a live session. Expired sessions and sessions
    /// owned by a different user read as absent.
    pub fn snapshot(&self, session_id: &str, user_id: &str) -> Option<SessionState> {
        let entry = self.sessions.get(session_id)?;
        if self.is_expired(entry.value()) || entry.user_id != user_id {
            return None;
        }
        Some(entry.clone())
    }

    /// Removes and returns the session for update, starting fresh if the
    /// session is new, timed out, or held under the same id by another user.
    pub fn take_or_create(&self, session_id: &str, user_id: &str) -> SessionState {
        match self.sessions.remove(session_id) {
            Some((_, state)) if !self.is_expired(&state) && state.user_id == user_id => state,
            Some((_, state)) => {
                if state.user_id != user_id {
                    debug!(
                        session_id = session_id,
                        "Session id held by another user, restarting"
                    );
                } else {
                    debug!(session_id = session_id, "Idle session restarted");
                }
                SessionState::new(session_id, user_id)
            }
            None => SessionState::new(session_id, user_id),
        }
    }

    pub fn put(&self, state: SessionState) {
        self.sessions.insert(state.session_id.clone(), state);
    }

    pub fn purge_expired(&self) {
        self.sessions.retain(|_, state| {
            Utc::now() - state.last_activity <= self.idle_timeout
        });
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
