use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// Catalog entry. Read-only from the engine's perspective; ingestion owns
/// creation and popularity refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    /// Price in currency minor units.
    pub price: u64,
    pub tags: BTreeSet<String>,
    pub popularity_score: f64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Drops empty/whitespace-only tags at the ingestion boundary so the
    /// scoring path never has to re-validate them.
    pub fn normalize_tags(&mut self) {
        self.tags = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwipeOutcome {
    Liked,
    Rejected,
}

impl SwipeOutcome {
    pub fn is_liked(&self) -> bool {
        matches!(self, SwipeOutcome::Liked)
    }
}

/// One user decision on one product. Append-only ground truth for both
/// long-term and session learning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipeEvent {
    pub id: Uuid,
    pub user_id: String,
    pub product_id: String,
    pub outcome: SwipeOutcome,
    pub response_latency_ms: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBand {
    pub min: u64,
    pub max: u64,
}

impl PriceBand {
    /// Widened band used for candidate retrieval, so the filter stays looser
    /// than the learned preference itself.
    pub fn widened(&self, low_factor: f64, high_factor: f64) -> (u64, u64) {
        let min = (self.min as f64 * low_factor).floor() as u64;
        let max = (self.max as f64 * high_factor).ceil() as u64;
        (min, max)
    }
}

/// Derived per-user preference state. Owned exclusively by the preference
/// analyzer; all affinity values are normalized into [0, 1] on recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferenceProfile {
    pub user_id: String,
    pub tag_scores: HashMap<String, f64>,
    pub category_affinity: HashMap<String, f64>,
    pub brand_affinity: HashMap<String, f64>,
    pub disliked_tags: HashSet<String>,
    pub disliked_categories: HashSet<String>,
    pub disliked_brands: HashSet<String>,
    pub price_band: Option<PriceBand>,
    pub total_swipes: u64,
    pub last_computed_at: DateTime<Utc>,
}

impl PreferenceProfile {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            tag_scores: HashMap::new(),
            category_affinity: HashMap::new(),
            brand_affinity: HashMap::new(),
            disliked_tags: HashSet::new(),
            disliked_categories: HashSet::new(),
            disliked_brands: HashSet::new(),
            price_band: None,
            total_swipes: 0,
            last_computed_at: Utc::now(),
        }
    }

    /// Cold-start signal: no swipe history at all.
    pub fn is_cold_start(&self) -> bool {
        self.total_swipes == 0
    }
}

/// One swipe as retained inside a session window. Tags and category are
/// denormalized here so the session signal stays a pure function of the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSwipe {
    pub product_id: String,
    pub outcome: SwipeOutcome,
    pub latency_ms: Option<u32>,
    pub tags: Vec<String>,
    pub category: Option<String>,
}

/// Ephemeral per-session state. Process-local; losing it degrades to
/// profile-only scoring, never to an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub user_id: String,
    pub events: Vec<SessionSwipe>,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl SessionState {
    pub fn new(session_id: &str, user_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            events: Vec::new(),
            started_at: now,
            last_activity: now,
        }
    }

    /// Length of the trailing run of rejections.
    pub fn consecutive_rejections(&self) -> usize {
        self.events
            .iter()
            .rev()
            .take_while(|e| e.outcome == SwipeOutcome::Rejected)
            .count()
    }
}

/// Write-once mapping of (user, experiment) to a variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentAssignment {
    pub user_id: String,
    pub experiment_name: String,
    pub variant: String,
    pub assigned_at: DateTime<Utc>,
}

/// Explicit choices collected during onboarding, used only for cold start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OnboardingPreferences {
    pub styles: Vec<String>,
    pub categories: Vec<String>,
    pub price_range: Option<(u64, u64)>,
}

/// Candidate paired with its composite score for ranking and diversity.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub product: Product,
    pub score: f64,
}

/// Acknowledgement for a swipe ingestion. `recorded` is false when the
/// idempotency key had already been seen.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwipeAck {
    pub recorded: bool,
    pub suggest_break: bool,
}
