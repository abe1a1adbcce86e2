use serde::Deserialize;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub profile: ProfileConfig,
    pub session: SessionConfig,
    pub scoring: ScoringConfig,
    pub diversity: DiversityConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub http_port: u16,
    pub service_name: String,
    /// Optional JSON file with seed products for the in-memory catalog.
    pub catalog_path: Option<String>,
}

/// Long-term preference aggregation tunables. Decay half-life and dislike
/// threshold are deliberately configuration, not constants.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    /// Most recent swipes considered per recomputation.
    pub max_events: usize,
    pub like_weight: f64,
    pub reject_weight: f64,
    pub half_life_days: f64,
    /// Net accumulated weight at or below this lands in a disliked set.
    pub dislike_threshold: f64,
    pub cache_ttl_secs: u64,
    /// New swipes since last computation that force a refresh.
    pub stale_swipe_delta: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Sliding window of swipes retained per session.
    pub window: usize,
    /// Per-step decay applied walking backwards from the newest swipe.
    pub position_decay: f64,
    pub like_weight: f64,
    pub reject_weight: f64,
    pub idle_timeout_secs: u64,
    /// Consecutive rejections that trigger a category shift.
    pub category_shift_rejections: usize,
    /// Consecutive rejections that trigger a break suggestion in the ack.
    pub suggest_break_rejections: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Hard penalty per disliked tag/category/brand hit.
    pub dislike_penalty: f64,
    /// Swipe count at which personalized weights reach full strength.
    pub swipe_saturation: u64,
    /// Candidate pool size as a multiple of the requested limit.
    pub pool_multiplier: usize,
    pub price_widen_low: f64,
    pub price_widen_high: f64,
    pub dependency_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiversityConfig {
    /// Max fraction of the returned list from one category.
    pub category_cap_fraction: f64,
    /// Max consecutive items from the same brand.
    pub max_consecutive_brand: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_events: 500,
            like_weight: 1.0,
            reject_weight: -0.5,
            half_life_days: 21.0,
            dislike_threshold: -1.0,
            cache_ttl_secs: 900,
            stale_swipe_delta: 10,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window: 20,
            position_decay: 0.8,
            like_weight: 1.0,
            reject_weight: -0.5,
            idle_timeout_secs: 1800,
            category_shift_rejections: 3,
            suggest_break_rejections: 5,
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            dislike_penalty: 1.0,
            swipe_saturation: 50,
            pool_multiplier: 5,
            price_widen_low: 0.7,
            price_widen_high: 1.3,
            dependency_timeout_ms: 2000,
        }
    }
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            category_cap_fraction: 0.4,
            max_consecutive_brand: 2,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                http_port: 8015,
                service_name: "personalization-service".to_string(),
                catalog_path: None,
            },
            profile: ProfileConfig::default(),
            session: SessionConfig::default(),
            scoring: ScoringConfig::default(),
            diversity: DiversityConfig::default(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{} must be a valid value", key)),
        Err(_) => default,
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenv::dotenv().ok();

        let defaults = Config::default();

        Ok(Config {
            service: ServiceConfig {
                http_port: env_or("HTTP_PORT", defaults.service.http_port),
                service_name: env::var("SERVICE_NAME")
                    .unwrap_or(defaults.service.service_name),
                catalog_path: env::var("CATALOG_PATH").ok(),
            },
            profile: ProfileConfig {
                max_events: env_or("PROFILE_MAX_EVENTS", defaults.profile.max_events),
                like_weight: env_or("PROFILE_LIKE_WEIGHT", defaults.profile.like_weight),
                reject_weight: env_or("PROFILE_REJECT_WEIGHT", defaults.profile.reject_weight),
                half_life_days: env_or("PROFILE_HALF_LIFE_DAYS", defaults.profile.half_life_days),
                dislike_threshold: env_or(
                    "PROFILE_DISLIKE_THRESHOLD",
                    defaults.profile.dislike_threshold,
                ),
                cache_ttl_secs: env_or("PROFILE_CACHE_TTL_SECS", defaults.profile.cache_ttl_secs),
                stale_swipe_delta: env_or(
                    "PROFILE_STALE_SWIPE_DELTA",
                    defaults.profile.stale_swipe_delta,
                ),
            },
            session: SessionConfig {
                window: env_or("SESSION_WINDOW", defaults.session.window),
                position_decay: env_or("SESSION_POSITION_DECAY", defaults.session.position_decay),
                like_weight: env_or("SESSION_LIKE_WEIGHT", defaults.session.like_weight),
                reject_weight: env_or("SESSION_REJECT_WEIGHT", defaults.session.reject_weight),
                idle_timeout_secs: env_or(
                    "SESSION_IDLE_TIMEOUT_SECS",
                    defaults.session.idle_timeout_secs,
                ),
                category_shift_rejections: env_or(
                    "SESSION_CATEGORY_SHIFT_REJECTIONS",
                    defaults.session.category_shift_rejections,
                ),
                suggest_break_rejections: env_or(
                    "SESSION_SUGGEST_BREAK_REJECTIONS",
                    defaults.session.suggest_break_rejections,
                ),
            },
            scoring: ScoringConfig {
                dislike_penalty: env_or("SCORING_DISLIKE_PENALTY", defaults.scoring.dislike_penalty),
                swipe_saturation: env_or(
                    "SCORING_SWIPE_SATURATION",
                    defaults.scoring.swipe_saturation,
                ),
                pool_multiplier: env_or("SCORING_POOL_MULTIPLIER", defaults.scoring.pool_multiplier),
                price_widen_low: env_or("SCORING_PRICE_WIDEN_LOW", defaults.scoring.price_widen_low),
                price_widen_high: env_or(
                    "SCORING_PRICE_WIDEN_HIGH",
                    defaults.scoring.price_widen_high,
                ),
                dependency_timeout_ms: env_or(
                    "DEPENDENCY_TIMEOUT_MS",
                    defaults.scoring.dependency_timeout_ms,
                ),
            },
            diversity: DiversityConfig {
                category_cap_fraction: env_or(
                    "DIVERSITY_CATEGORY_CAP_FRACTION",
                    defaults.diversity.category_cap_fraction,
                ),
                max_consecutive_brand: env_or(
                    "DIVERSITY_MAX_CONSECUTIVE_BRAND",
                    defaults.diversity.max_consecutive_brand,
                ),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.profile.max_events, 500);
        assert!(config.profile.reject_weight < 0.0);
        assert!(config.diversity.category_cap_fraction > 0.0);
        assert!(config.diversity.category_cap_fraction <= 1.0);
        assert!(config.session.window > 0);
    }
}
