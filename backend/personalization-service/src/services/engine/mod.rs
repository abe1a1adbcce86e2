use crate::config::Config;
use crate::models::{PreferenceProfile, Product, SwipeAck, SwipeEvent, SwipeOutcome};
use crate::services::catalog::{CatalogFilter, CatalogStore};
use crate::services::coldstart::ColdStartFallback;
use crate::services::diversity::DiversitySampler;
use crate::services::experiment::{
    AssignmentStore, ExperimentAssigner, ExperimentSpec, RANKING_EXPERIMENT,
};
use crate::services::ledger::{AppendOutcome, SwipeStore};
use crate::services::profile::{PreferenceAnalyzer, ProfileCache, ProfileStore};
use crate::services::scoring::{Scorer, ScoringWeights};
use crate::services::session::{SessionLearner, SessionRegistry};
use crate::services::{EngineError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Hard ceiling on the requested feed size, applied before the pool
/// multiplier so the retrieval fan-out stays bounded.
const MAX_LIMIT: usize = 100;

/// Orchestrates the full recommendation flow: profile, session signal,
/// retrieval, scoring, and diversity, under the active experiment variant.
pub struct RecommendationEngine<C, L, P, A>
where
    C: CatalogStore,
    L: SwipeStore,
    P: ProfileStore,
    A: AssignmentStore,
{
    catalog: Arc<C>,
    ledger: Arc<L>,
    profiles: Arc<P>,
    assigner: ExperimentAssigner<A>,
    analyzer: PreferenceAnalyzer<C, L>,
    cache: ProfileCache,
    sessions: SessionRegistry,
    learner: SessionLearner,
    scorer: Scorer,
    diversity: DiversitySampler,
    coldstart: ColdStartFallback<C>,
    config: Config,
}

impl<C, L, P, A> RecommendationEngine<C, L, P, A>
where
    C: CatalogStore,
    L: SwipeStore,
    P: ProfileStore,
    A: AssignmentStore,
{
    pub fn new(
        catalog: Arc<C>,
        ledger: Arc<L>,
        profiles: Arc<P>,
        assignments: Arc<A>,
        config: Config,
    ) -> Self {
        Self {
            assigner: ExperimentAssigner::new(
                assignments,
                vec![ExperimentSpec::ranking_default()],
            ),
            analyzer: PreferenceAnalyzer::new(
                catalog.clone(),
                ledger.clone(),
                config.profile.clone(),
            ),
            cache: ProfileCache::new(
                config.profile.cache_ttl_secs,
                config.profile.stale_swipe_delta,
            ),
            sessions: SessionRegistry::new(config.session.idle_timeout_secs),
            learner: SessionLearner::new(config.session.clone()),
            scorer: Scorer::new(config.scoring.clone()),
            diversity: DiversitySampler::new(config.diversity.clone()),
            coldstart: ColdStartFallback::new(
                catalog.clone(),
                config.diversity.clone(),
                config.scoring.dependency_timeout_ms,
            ),
            catalog,
            ledger,
            profiles,
            config,
        }
    }

    /// Wraps a store-backed call in the dependency timeout. A hung backend
    /// turns into a retryable error instead of a stuck request.
    async fn bounded<T, E, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, E>>,
        EngineError: From<E>,
    {
        let timeout = Duration::from_millis(self.config.scoring.dependency_timeout_ms);
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => Err(EngineError::DependencyUnavailable(format!(
                "{} timed out after {}ms",
                operation, self.config.scoring.dependency_timeout_ms
            ))),
        }
    }

    /// Serves the profile from cache when fresh, recomputing otherwise.
    /// A failed recomputation degrades to the last known profile rather than
    /// failing the request.
    async fn load_profile(&self, user_id: &str) -> Result<PreferenceProfile> {
        let swipe_count = self
            .bounded("swipe count", self.ledger.count_for_user(user_id))
            .await?;

        if let Some(cached) = self.cache.fresh(user_id, swipe_count) {
            debug!(user_id = user_id, "Profile served from cache");
            return Ok(cached);
        }

        match self
            .bounded("profile analyze", self.analyzer.analyze(user_id))
            .await
        {
            Ok(profile) => {
                self.cache.insert(profile.clone(), swipe_count);
                if let Err(err) = self.profiles.save(profile.clone()).await {
                    warn!(user_id = user_id, error = %err, "Failed to persist profile");
                }
                Ok(profile)
            }
            Err(err) => {
                warn!(
                    user_id = user_id,
                    error = %err,
                    "Profile recomputation failed, degrading to last known"
                );
                if let Some(stale) = self.cache.last_known(user_id) {
                    return Ok(stale);
                }
                if let Ok(Some(persisted)) = self.profiles.load(user_id).await {
                    return Ok(persisted);
                }
                Ok(PreferenceProfile::empty(user_id))
            }
        }
    }

    pub async fn get_recommendations(
        &self,
        user_id: &str,
        session_id: &str,
        limit: usize,
    ) -> Result<Vec<Product>> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("user_id is required".to_string()));
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(EngineError::InvalidInput(format!(
                "limit must be between 1 and {}",
                MAX_LIMIT
            )));
        }

        let variant = self.assigner.get_variant(user_id, RANKING_EXPERIMENT).await?;
        let weights = self
            .assigner
            .scoring_weights(RANKING_EXPERIMENT, &variant)
            .unwrap_or_default();

        let profile = self.load_profile(user_id).await?;
        let excluded = self
            .bounded("swiped ids", self.ledger.swiped_ids(user_id))
            .await?;

        // A degraded empty profile lands here too, so the fallback still
        // gets the exclusion set.
        if profile.is_cold_start() {
            info!(user_id = user_id, "Cold start user, serving fallback");
            let onboarding = self
                .bounded("onboarding load", self.profiles.load_onboarding(user_id))
                .await?;
            return self
                .coldstart
                .fallback(onboarding.as_ref(), &excluded, limit)
                .await;
        }

        let session = self.sessions.snapshot(session_id, user_id);
        let signal = session
            .as_ref()
            .map(|state| self.learner.signal(state))
            .unwrap_or_default();

        let mut filter = CatalogFilter {
            exclude_ids: excluded.clone(),
            ..Default::default()
        };
        if let Some(band) = &profile.price_band {
            filter.price_range = Some(band.widened(
                self.config.scoring.price_widen_low,
                self.config.scoring.price_widen_high,
            ));
        }
        if let Some(state) = &session {
            if state.consecutive_rejections() >= self.config.session.category_shift_rejections {
                let shifted = self.learner.rejected_categories(state);
                if !shifted.is_empty() {
                    info!(
                        user_id = user_id,
                        categories = ?shifted,
                        "Shifting away from rejected categories"
                    );
                    filter.exclude_categories = shifted;
                }
            }
        }

        let pool_size = limit * self.config.scoring.pool_multiplier;
        let mut pool = self
            .bounded("catalog find", self.catalog.find(&filter, pool_size))
            .await?;

        // The learned price band can over-constrain a small catalog
        if pool.len() < limit && filter.price_range.is_some() {
            debug!(
                user_id = user_id,
                pool = pool.len(),
                "Price band too narrow, retrying without it"
            );
            filter.price_range = None;
            pool = self
                .bounded("catalog find", self.catalog.find(&filter, pool_size))
                .await?;
        }

        let ranked = self.scorer.rank(pool, &profile, &signal, weights, &excluded);
        let diversified = self.diversity.diversify(ranked, limit);
        if diversified.relaxed {
            debug!(user_id = user_id, "Diversity caps relaxed for this feed");
        }

        debug!(
            user_id = user_id,
            variant = %variant,
            count = diversified.items.len(),
            "Recommendations served"
        );

        Ok(diversified
            .items
            .into_iter()
            .map(|c| c.product)
            .collect())
    }

    pub async fn record_swipe(
        &self,
        user_id: &str,
        session_id: &str,
        product_id: &str,
        outcome: SwipeOutcome,
        latency_ms: Option<u32>,
    ) -> Result<SwipeAck> {
        if user_id.trim().is_empty() || product_id.trim().is_empty() || session_id.trim().is_empty()
        {
            return Err(EngineError::InvalidInput(
                "user_id, product_id and session_id are required".to_string(),
            ));
        }

        let event = SwipeEvent {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            product_id: product_id.to_string(),
            outcome,
            response_latency_ms: latency_ms,
            created_at: Utc::now(),
            session_id: session_id.to_string(),
        };

        let appended = self.bounded("swipe append", self.ledger.append(event)).await?;
        let recorded = appended == AppendOutcome::Recorded;

        let mut suggest_break = false;
        if recorded {
            match self.bounded("catalog get", self.catalog.get(product_id)).await {
                Ok(Some(product)) => {
                    let state = self.sessions.take_or_create(session_id, user_id);
                    let updated = self.learner.update(state, &product, outcome, latency_ms);
                    suggest_break = updated.consecutive_rejections()
                        >= self.config.session.suggest_break_rejections;
                    self.sessions.put(updated);
                }
                Ok(None) => {
                    warn!(product_id = product_id, "Swipe on unknown product recorded");
                }
                Err(err) => {
                    warn!(
                        product_id = product_id,
                        error = %err,
                        "Catalog lookup failed, session signal skipped"
                    );
                }
            }

            self.cache.mark_stale(user_id);
        }

        self.sessions.purge_expired();

        Ok(SwipeAck {
            recorded,
            suggest_break,
        })
    }

    pub async fn get_experiment_variant(
        &self,
        user_id: &str,
        experiment_name: &str,
    ) -> Result<String> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("user_id is required".to_string()));
        }
        self.assigner.get_variant(user_id, experiment_name).await
    }

    pub async fn save_onboarding(
        &self,
        user_id: &str,
        preferences: crate::models::OnboardingPreferences,
    ) -> Result<()> {
        if user_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("user_id is required".to_string()));
        }
        self.bounded(
            "onboarding save",
            self.profiles.save_onboarding(user_id, preferences),
        )
        .await
    }

    /// Session signal snapshot for debugging. Empty for unknown sessions or
    /// when the session belongs to another user.
    pub fn session_signal(&self, session_id: &str, user_id: &str) -> HashMap<String, f64> {
        self.sessions
            .snapshot(session_id, user_id)
            .map(|state| self.learner.signal(&state))
            .unwrap_or_default()
    }
}
