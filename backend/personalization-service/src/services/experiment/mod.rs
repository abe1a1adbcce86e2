use super::{EngineError, Result, StoreResult};
use crate::models::ExperimentAssignment;
use crate::services::scoring::ScoringWeights;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// One arm of an experiment: split weight plus the scoring weights it selects.
/// "Which algorithm runs" is a data-driven weight set, not a code branch.
#[derive(Debug, Clone)]
pub struct VariantSpec {
    pub name: String,
    pub split: u32,
    pub weights: ScoringWeights,
}

#[derive(Debug, Clone)]
pub struct ExperimentSpec {
    pub name: String,
    pub variants: Vec<VariantSpec>,
}

pub const RANKING_EXPERIMENT: &str = "ranking_weights";

impl ExperimentSpec {
    /// Default ranking-weight experiment comparing three weighting schemes.
    pub fn ranking_default() -> Self {
        Self {
            name: RANKING_EXPERIMENT.to_string(),
            variants: vec![
                VariantSpec {
                    name: "balanced".to_string(),
                    split: 40,
                    weights: ScoringWeights::balanced(),
                },
                VariantSpec {
                    name: "session_heavy".to_string(),
                    split: 30,
                    weights: ScoringWeights {
                        affinity: 0.35,
                        session: 0.45,
                        popularity: 0.2,
                    },
                },
                VariantSpec {
                    name: "popularity_lean".to_string(),
                    split: 30,
                    weights: ScoringWeights {
                        affinity: 0.4,
                        session: 0.2,
                        popularity: 0.4,
                    },
                },
            ],
        }
    }

    /// Deterministic weighted-split bucket for a user. Recomputed identically
    /// on retry, so concurrent first-calls agree on the variant.
    pub fn pick(&self, user_id: &str) -> &VariantSpec {
        let total: u64 = self.variants.iter().map(|v| u64::from(v.split)).sum();
        let mut point = stable_bucket(user_id, &self.name) % total.max(1);
        for variant in &self.variants {
            if point < u64::from(variant.split) {
                return variant;
            }
            point -= u64::from(variant.split);
        }
        // Unreachable while splits sum to total; guard for empty-split config.
        &self.variants[self.variants.len() - 1]
    }

    pub fn weights_for(&self, variant: &str) -> Option<ScoringWeights> {
        self.variants
            .iter()
            .find(|v| v.name == variant)
            .map(|v| v.weights)
    }
}

fn stable_bucket(user_id: &str, experiment: &str) -> u64 {
    let digest = Sha256::digest(format!("{}:{}", user_id, experiment).as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Persistence for experiment assignments, keyed by (user, experiment).
#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn get(
        &self,
        user_id: &str,
        experiment_name: &str,
    ) -> StoreResult<Option<ExperimentAssignment>>;

    /// Idempotent upsert: the first stored assignment wins and is returned.
    async fn insert_if_absent(
        &self,
        assignment: ExperimentAssignment,
    ) -> StoreResult<ExperimentAssignment>;
}

#[derive(Default)]
pub struct InMemoryAssignmentStore {
    assignments: DashMap<(String, String), ExperimentAssignment>,
}

impl InMemoryAssignmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssignmentStore for InMemoryAssignmentStore {
    async fn get(
        &self,
        user_id: &str,
        experiment_name: &str,
    ) -> StoreResult<Option<ExperimentAssignment>> {
        let key = (user_id.to_string(), experiment_name.to_string());
        Ok(self.assignments.get(&key).map(|entry| entry.clone()))
    }

    async fn insert_if_absent(
        &self,
        assignment: ExperimentAssignment,
    ) -> StoreResult<ExperimentAssignment> {
        let key = (
            assignment.user_id.clone(),
            assignment.experiment_name.clone(),
        );
        Ok(self.assignments.entry(key).or_insert(assignment).clone())
    }
}

/// Deterministic, persisted variant assignment. A user never flips variants
/// mid-experiment even if split weights change later; changes only affect
/// new assignments.
pub struct ExperimentAssigner<A: AssignmentStore> {
    store: Arc<A>,
    experiments: HashMap<String, ExperimentSpec>,
}

impl<A: AssignmentStore> ExperimentAssigner<A> {
    pub fn new(store: Arc<A>, specs: Vec<ExperimentSpec>) -> Self {
        let experiments = specs.into_iter().map(|s| (s.name.clone(), s)).collect();
        Self { store, experiments }
    }

    pub async fn get_variant(&self, user_id: &str, experiment_name: &str) -> Result<String> {
        if let Some(existing) = self.store.get(user_id, experiment_name).await? {
            debug!(
                user_id = user_id,
                experiment = experiment_name,
                variant = %existing.variant,
                "Returning persisted variant"
            );
            return Ok(existing.variant);
        }

        let spec = self.experiments.get(experiment_name).ok_or_else(|| {
            EngineError::InvalidInput(format!("unknown experiment: {}", experiment_name))
        })?;

        let picked = spec.pick(user_id);
        let assignment = ExperimentAssignment {
            user_id: user_id.to_string(),
            experiment_name: experiment_name.to_string(),
            variant: picked.name.clone(),
            assigned_at: Utc::now(),
        };

        let stored = self.store.insert_if_absent(assignment).await?;

        info!(
            user_id = user_id,
            experiment = experiment_name,
            variant = %stored.variant,
            "Experiment variant assigned"
        );

        Ok(stored.variant)
    }

    pub fn scoring_weights(&self, experiment_name: &str, variant: &str) -> Option<ScoringWeights> {
        self.experiments
            .get(experiment_name)
            .and_then(|spec| spec.weights_for(variant))
    }
}
