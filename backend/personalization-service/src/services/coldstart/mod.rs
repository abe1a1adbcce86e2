use crate::config::DiversityConfig;
use crate::models::{OnboardingPreferences, Product, ScoredCandidate};
use crate::services::catalog::{CatalogFilter, CatalogStore};
use crate::services::diversity::DiversitySampler;
use crate::services::{EngineError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Popularity-ranked fallback for users with no swipe history. Onboarding
/// choices narrow the pool when present; a thin filtered pool backfills from
/// the whole catalog rather than returning a short list.
pub struct ColdStartFallback<C: CatalogStore> {
    catalog: Arc<C>,
    diversity: DiversitySampler,
    timeout: Duration,
}

impl<C: CatalogStore> ColdStartFallback<C> {
    pub fn new(
        catalog: Arc<C>,
        diversity_config: DiversityConfig,
        dependency_timeout_ms: u64,
    ) -> Self {
        Self {
            catalog,
            diversity: DiversitySampler::new(diversity_config),
            timeout: Duration::from_millis(dependency_timeout_ms),
        }
    }

    async fn bounded_find(&self, filter: &CatalogFilter, limit: usize) -> Result<Vec<Product>> {
        match tokio::time::timeout(self.timeout, self.catalog.find(filter, limit)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(EngineError::DependencyUnavailable(format!(
                "catalog find timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }

    pub async fn fallback(
        &self,
        onboarding: Option<&OnboardingPreferences>,
        exclude_ids: &HashSet<String>,
        limit: usize,
    ) -> Result<Vec<Product>> {
        let filter = match onboarding {
            Some(prefs) => CatalogFilter {
                any_tags: (!prefs.styles.is_empty()).then(|| prefs.styles.clone()),
                categories: (!prefs.categories.is_empty()).then(|| prefs.categories.clone()),
                price_range: prefs.price_range,
                exclude_ids: exclude_ids.clone(),
                ..Default::default()
            },
            None => CatalogFilter {
                exclude_ids: exclude_ids.clone(),
                ..Default::default()
            },
        };

        let mut pool = self.bounded_find(&filter, limit * 3).await?;

        if pool.len() < limit {
            debug!(
                pool = pool.len(),
                limit = limit,
                "Onboarding filter too narrow, backfilling from full catalog"
            );
            let mut skip: HashSet<String> = pool.iter().map(|p| p.id.clone()).collect();
            skip.extend(exclude_ids.iter().cloned());
            let backfill_filter = CatalogFilter {
                exclude_ids: skip,
                ..Default::default()
            };
            pool.extend(self.bounded_find(&backfill_filter, limit * 3).await?);
        }

        let ranked: Vec<ScoredCandidate> = pool
            .into_iter()
            .map(|product| {
                let score = product.popularity_score;
                ScoredCandidate { product, score }
            })
            .collect();

        let diversified = self.diversity.diversify(ranked, limit);

        info!(
            count = diversified.items.len(),
            onboarded = onboarding.is_some(),
            "Cold start fallback served"
        );

        Ok(diversified
            .items
            .into_iter()
            .map(|c| c.product)
            .collect())
    }
}
