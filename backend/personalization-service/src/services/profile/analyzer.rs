use crate::config::ProfileConfig;
use crate::models::{PreferenceProfile, PriceBand};
use crate::services::catalog::CatalogStore;
use crate::services::ledger::SwipeStore;
use crate::services::Result;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Recomputes a user's long-term preference profile from their swipe history.
///
/// Contributions decay exponentially with event age, so a taste from months
/// ago fades without ever being deleted. The profile is rebuilt from scratch
/// on each recomputation; there is no incremental update path to drift.
pub struct PreferenceAnalyzer<C: CatalogStore, S: SwipeStore> {
    catalog: Arc<C>,
    swipes: Arc<S>,
    config: ProfileConfig,
}

impl<C: CatalogStore, S: SwipeStore> PreferenceAnalyzer<C, S> {
    pub fn new(catalog: Arc<C>, swipes: Arc<S>, config: ProfileConfig) -> Self {
        Self {
            catalog,
            swipes,
            config,
        }
    }

    pub async fn analyze(&self, user_id: &str) -> Result<PreferenceProfile> {
        let events = self
            .swipes
            .list_for_user(user_id, self.config.max_events)
            .await?;
        let total_swipes = self.swipes.count_for_user(user_id).await?;

        let mut tag_weights: HashMap<String, f64> = HashMap::new();
        let mut category_weights: HashMap<String, f64> = HashMap::new();
        let mut brand_weights: HashMap<String, f64> = HashMap::new();
        let mut liked_prices: Vec<u64> = Vec::new();

        let now = Utc::now();

        for event in &events {
            let product = match self.catalog.get(&event.product_id).await? {
                Some(product) => product,
                None => {
                    // Delisted products drop out of the profile silently.
                    warn!(
                        user_id = user_id,
                        product_id = %event.product_id,
                        "Swiped product missing from catalog, skipping"
                    );
                    continue;
                }
            };

            let base = if event.outcome.is_liked() {
                self.config.like_weight
            } else {
                self.config.reject_weight
            };
            let age_days = (now - event.created_at).num_seconds() as f64 / 86_400.0;
            let contribution = base * 0.5_f64.powf(age_days.max(0.0) / self.config.half_life_days);

            for tag in &product.tags {
                *tag_weights.entry(tag.clone()).or_insert(0.0) += contribution;
            }
            if let Some(category) = &product.category {
                *category_weights.entry(category.clone()).or_insert(0.0) += contribution;
            }
            if let Some(brand) = &product.brand {
                *brand_weights.entry(brand.clone()).or_insert(0.0) += contribution;
            }
            if event.outcome.is_liked() {
                liked_prices.push(product.price);
            }
        }

        let (tag_scores, disliked_tags) = self.split_and_normalize(tag_weights);
        let (category_affinity, disliked_categories) = self.split_and_normalize(category_weights);
        let (brand_affinity, disliked_brands) = self.split_and_normalize(brand_weights);

        let profile = PreferenceProfile {
            user_id: user_id.to_string(),
            tag_scores,
            category_affinity,
            brand_affinity,
            disliked_tags,
            disliked_categories,
            disliked_brands,
            price_band: price_band(&mut liked_prices),
            total_swipes,
            last_computed_at: now,
        };

        debug!(
            user_id = user_id,
            total_swipes = total_swipes,
            tags = profile.tag_scores.len(),
            "Profile recomputed"
        );

        Ok(profile)
    }

    /// Splits accumulated weights into a normalized positive affinity map and
    /// a disliked set. Weights at or below the dislike threshold become
    /// dislikes; weak negatives in between carry no signal and are dropped.
    fn split_and_normalize(
        &self,
        weights: HashMap<String, f64>,
    ) -> (HashMap<String, f64>, HashSet<String>) {
        let max_positive = weights
            .values()
            .copied()
            .filter(|w| *w > 0.0)
            .fold(0.0_f64, f64::max);

        let mut scores = HashMap::new();
        let mut disliked = HashSet::new();

        for (key, weight) in weights {
            if weight > 0.0 {
                scores.insert(key, weight / max_positive);
            } else if weight <= self.config.dislike_threshold {
                disliked.insert(key);
            }
        }

        (scores, disliked)
    }
}

/// Comfortable price band: the 10th to 90th percentile of liked prices.
/// Outlier likes (a one-off splurge) do not stretch the band.
fn price_band(liked_prices: &mut Vec<u64>) -> Option<PriceBand> {
    if liked_prices.is_empty() {
        return None;
    }
    liked_prices.sort_unstable();

    let idx = |p: f64| -> usize {
        let raw = (p * (liked_prices.len() - 1) as f64).round() as usize;
        raw.min(liked_prices.len() - 1)
    };

    Some(PriceBand {
        min: liked_prices[idx(0.1)],
        max: liked_prices[idx(0.9)],
    })
}
