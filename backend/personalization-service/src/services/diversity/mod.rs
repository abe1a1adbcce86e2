use crate::config::DiversityConfig;
use crate::models::ScoredCandidate;
use std::collections::HashMap;
use tracing::warn;

/// Outcome of a diversity pass. `relaxed` flags that the caps had to be
/// loosened to fill the requested count.
#[derive(Debug)]
pub struct DiversifiedList {
    pub items: Vec<ScoredCandidate>,
    pub relaxed: bool,
}

/// Re-samples a ranked list so no category dominates and the same brand never
/// runs too long, while preserving relative score order among admitted items.
pub struct DiversitySampler {
    config: DiversityConfig,
}

impl DiversitySampler {
    pub fn new(config: DiversityConfig) -> Self {
        Self { config }
    }

    fn category_cap(&self, limit: usize) -> usize {
        let cap = (self.config.category_cap_fraction * limit as f64).ceil() as usize;
        cap.max(1)
    }

    pub fn diversify(&self, ranked: Vec<ScoredCandidate>, limit: usize) -> DiversifiedList {
        let cap = self.category_cap(limit);
        let mut category_counts: HashMap<String, usize> = HashMap::new();
        let mut brand_run: usize = 0;
        let mut last_brand: Option<String> = None;

        let mut admitted: Vec<ScoredCandidate> = Vec::with_capacity(limit);
        let mut skipped: Vec<ScoredCandidate> = Vec::new();

        for candidate in ranked {
            if admitted.len() == limit {
                break;
            }

            // Uncategorized items each count as their own bucket
            let over_cap = match &candidate.product.category {
                Some(category) => category_counts.get(category).copied().unwrap_or(0) >= cap,
                None => false,
            };

            let brand_blocked = match (&candidate.product.brand, &last_brand) {
                (Some(brand), Some(last)) if brand == last => {
                    brand_run >= self.config.max_consecutive_brand
                }
                _ => false,
            };

            if over_cap || brand_blocked {
                skipped.push(candidate);
                continue;
            }

            if let Some(category) = &candidate.product.category {
                *category_counts.entry(category.clone()).or_insert(0) += 1;
            }
            match (&candidate.product.brand, &last_brand) {
                (Some(brand), Some(last)) if brand == last => brand_run += 1,
                (Some(brand), _) => {
                    last_brand = Some(brand.clone());
                    brand_run = 1;
                }
                (None, _) => {
                    last_brand = None;
                    brand_run = 0;
                }
            }

            admitted.push(candidate);
        }

        // Backfill from skipped candidates, caps relaxed, best first
        let mut relaxed = false;
        if admitted.len() < limit && !skipped.is_empty() {
            relaxed = true;
            warn!(
                admitted = admitted.len(),
                limit = limit,
                "Diversity caps relaxed to fill requested count"
            );
            for candidate in skipped {
                if admitted.len() == limit {
                    break;
                }
                admitted.push(candidate);
            }
        }

        DiversifiedList {
            items: admitted,
            relaxed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn candidate(id: &str, category: &str, brand: &str, score: f64) -> ScoredCandidate {
        ScoredCandidate {
            product: Product {
                id: id.to_string(),
                title: format!("Product {}", id),
                brand: Some(brand.to_string()),
                category: Some(category.to_string()),
                price: 3000,
                tags: BTreeSet::new(),
                popularity_score: 0.5,
                is_active: true,
                created_at: Utc::now(),
            },
            score,
        }
    }

    fn sampler() -> DiversitySampler {
        DiversitySampler::new(DiversityConfig::default())
    }

    #[test]
    fn test_category_cap_enforced() {
        // 10 dresses at the top, other categories below
        let mut ranked = Vec::new();
        for i in 0..10 {
            ranked.push(candidate(&format!("d{}", i), "dresses", &format!("b{}", i), 1.0 - i as f64 * 0.01));
        }
        for i in 0..10 {
            ranked.push(candidate(&format!("o{}", i), &format!("cat{}", i), &format!("x{}", i), 0.5));
        }

        let result = sampler().diversify(ranked, 10);
        assert_eq!(result.items.len(), 10);
        assert!(!result.relaxed);

        let dresses = result
            .items
            .iter()
            .filter(|c| c.product.category.as_deref() == Some("dresses"))
            .count();
        // ceil(0.4 * 10) = 4
        assert_eq!(dresses, 4);
    }

    #[test]
    fn test_brand_run_broken_up() {
        let ranked = vec![
            candidate("p1", "c1", "acme", 0.9),
            candidate("p2", "c2", "acme", 0.8),
            candidate("p3", "c3", "acme", 0.7),
            candidate("p4", "c4", "other", 0.6),
            candidate("p5", "c5", "acme", 0.5),
        ];

        let result = sampler().diversify(ranked, 5);
        let brands: Vec<&str> = result
            .items
            .iter()
            .map(|c| c.product.brand.as_deref().unwrap())
            .collect();

        for window in brands.windows(3) {
            assert!(!(window[0] == window[1] && window[1] == window[2]));
        }
    }

    #[test]
    fn test_relaxes_caps_rather_than_under_fill() {
        // Only one category available
        let ranked: Vec<ScoredCandidate> = (0..10)
            .map(|i| candidate(&format!("p{}", i), "dresses", &format!("b{}", i), 1.0 - i as f64 * 0.01))
            .collect();

        let result = sampler().diversify(ranked, 10);
        assert_eq!(result.items.len(), 10);
        assert!(result.relaxed);
    }

    #[test]
    fn test_preserves_score_order_among_admitted() {
        let ranked = vec![
            candidate("p1", "c1", "a", 0.9),
            candidate("p2", "c2", "b", 0.8),
            candidate("p3", "c3", "c", 0.7),
        ];

        let result = sampler().diversify(ranked, 3);
        let ids: Vec<&str> = result.items.iter().map(|c| c.product.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_truncates_to_limit() {
        let ranked: Vec<ScoredCandidate> = (0..30)
            .map(|i| candidate(&format!("p{:02}", i), &format!("c{}", i), &format!("b{}", i), 1.0))
            .collect();

        let result = sampler().diversify(ranked, 10);
        assert_eq!(result.items.len(), 10);
    }
}
