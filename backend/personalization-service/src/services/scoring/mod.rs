use crate::config::ScoringConfig;
use crate::models::{PreferenceProfile, Product, ScoredCandidate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Blend weights for the composite score. Variants of the ranking experiment
/// are just different instances of this struct.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub affinity: f64,
    pub session: f64,
    pub popularity: f64,
}

impl ScoringWeights {
    pub fn balanced() -> Self {
        Self {
            affinity: 0.5,
            session: 0.3,
            popularity: 0.2,
        }
    }
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self::balanced()
    }
}

/// Composite scorer: long-term affinity, session signal, and popularity,
/// blended per the active experiment variant.
///
/// Personalized terms scale with how much history the user has, so a brand
/// new user is ranked almost purely on popularity and the personal signal
/// ramps in as swipes accumulate.
pub struct Scorer {
    config: ScoringConfig,
}

impl Scorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    fn affinity(&self, product: &Product, profile: &PreferenceProfile) -> f64 {
        let mut score = 0.0;

        for tag in &product.tags {
            if let Some(weight) = profile.tag_scores.get(tag) {
                score += weight;
            }
            if profile.disliked_tags.contains(tag) {
                score -= self.config.dislike_penalty;
            }
        }

        if let Some(category) = &product.category {
            if let Some(weight) = profile.category_affinity.get(category) {
                score += weight;
            }
            if profile.disliked_categories.contains(category) {
                score -= self.config.dislike_penalty;
            }
        }

        if let Some(brand) = &product.brand {
            if let Some(weight) = profile.brand_affinity.get(brand) {
                score += weight;
            }
            if profile.disliked_brands.contains(brand) {
                score -= self.config.dislike_penalty;
            }
        }

        score
    }

    fn session_score(&self, product: &Product, signal: &HashMap<String, f64>) -> f64 {
        product
            .tags
            .iter()
            .filter_map(|tag| signal.get(tag))
            .sum()
    }

    pub fn score(
        &self,
        product: &Product,
        profile: &PreferenceProfile,
        signal: &HashMap<String, f64>,
        weights: ScoringWeights,
    ) -> f64 {
        let gain = profile.total_swipes.min(self.config.swipe_saturation) as f64
            / self.config.swipe_saturation as f64;

        gain * weights.affinity * self.affinity(product, profile)
            + gain * weights.session * self.session_score(product, signal)
            + weights.popularity * product.popularity_score
    }

    /// Scores and sorts candidates. Previously swiped products must already be
    /// excluded at retrieval; any that slip through are dropped here.
    pub fn rank(
        &self,
        candidates: Vec<Product>,
        profile: &PreferenceProfile,
        signal: &HashMap<String, f64>,
        weights: ScoringWeights,
        excluded: &HashSet<String>,
    ) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .filter(|product| {
                if excluded.contains(&product.id) {
                    warn!(product_id = %product.id, "Swiped product reached ranking, dropping");
                    return false;
                }
                true
            })
            .map(|product| {
                let score = self.score(&product, profile, signal, weights);
                ScoredCandidate { product, score }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    b.product
                        .popularity_score
                        .partial_cmp(&a.product.popularity_score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.product.id.cmp(&b.product.id))
        });

        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn product(id: &str, tags: &[&str], category: &str, brand: &str, popularity: f64) -> Product {
        Product {
            id: id.to_string(),
            title: format!("Product {}", id),
            brand: Some(brand.to_string()),
            category: Some(category.to_string()),
            price: 3000,
            tags: tags.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            popularity_score: popularity,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn profile_with_tag(tag: &str, weight: f64, total_swipes: u64) -> PreferenceProfile {
        let mut profile = PreferenceProfile::empty("u1");
        profile.tag_scores.insert(tag.to_string(), weight);
        profile.total_swipes = total_swipes;
        profile
    }

    #[test]
    fn test_higher_affinity_scores_higher() {
        let scorer = Scorer::new(ScoringConfig::default());
        let profile = profile_with_tag("minimalist", 1.0, 50);
        let signal = HashMap::new();

        let liked = product("p1", &["minimalist"], "tops", "a", 0.5);
        let neutral = product("p2", &["boho"], "tops", "b", 0.5);

        let s1 = scorer.score(&liked, &profile, &signal, ScoringWeights::balanced());
        let s2 = scorer.score(&neutral, &profile, &signal, ScoringWeights::balanced());
        assert!(s1 > s2);
    }

    #[test]
    fn test_disliked_scores_below_neutral() {
        let scorer = Scorer::new(ScoringConfig::default());
        let mut profile = PreferenceProfile::empty("u1");
        profile.disliked_tags.insert("neon".to_string());
        profile.total_swipes = 50;
        let signal = HashMap::new();

        let disliked = product("p1", &["neon"], "tops", "a", 0.5);
        let neutral = product("p2", &["plain"], "tops", "b", 0.5);

        let s1 = scorer.score(&disliked, &profile, &signal, ScoringWeights::balanced());
        let s2 = scorer.score(&neutral, &profile, &signal, ScoringWeights::balanced());
        assert!(s1 < s2);
    }

    #[test]
    fn test_new_user_ranked_by_popularity() {
        let scorer = Scorer::new(ScoringConfig::default());
        // Strong tag affinity, but zero swipes: gain is 0
        let profile = profile_with_tag("minimalist", 1.0, 0);
        let signal = HashMap::new();

        let matching = product("p1", &["minimalist"], "tops", "a", 0.1);
        let popular = product("p2", &["boho"], "tops", "b", 0.9);

        let s1 = scorer.score(&matching, &profile, &signal, ScoringWeights::balanced());
        let s2 = scorer.score(&popular, &profile, &signal, ScoringWeights::balanced());
        assert!(s2 > s1);
    }

    #[test]
    fn test_session_signal_moves_ranking() {
        let scorer = Scorer::new(ScoringConfig::default());
        let profile = {
            let mut p = PreferenceProfile::empty("u1");
            p.total_swipes = 50;
            p
        };
        let mut signal = HashMap::new();
        signal.insert("linen".to_string(), 1.0);

        let in_session = product("p1", &["linen"], "tops", "a", 0.5);
        let out_of_session = product("p2", &["denim"], "tops", "b", 0.5);

        let s1 = scorer.score(&in_session, &profile, &signal, ScoringWeights::balanced());
        let s2 = scorer.score(&out_of_session, &profile, &signal, ScoringWeights::balanced());
        assert!(s1 > s2);
    }

    #[test]
    fn test_rank_drops_excluded_and_breaks_ties_by_id() {
        let scorer = Scorer::new(ScoringConfig::default());
        let profile = PreferenceProfile::empty("u1");
        let signal = HashMap::new();
        let excluded: HashSet<String> = ["p3"].iter().map(|s| s.to_string()).collect();

        let candidates = vec![
            product("p2", &["x"], "tops", "a", 0.5),
            product("p1", &["x"], "tops", "a", 0.5),
            product("p3", &["x"], "tops", "a", 0.9),
        ];

        let ranked = scorer.rank(
            candidates,
            &profile,
            &signal,
            ScoringWeights::balanced(),
            &excluded,
        );
        let ids: Vec<&str> = ranked.iter().map(|c| c.product.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
    }
}
