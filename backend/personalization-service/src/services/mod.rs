pub mod catalog;
pub mod coldstart;
pub mod diversity;
pub mod engine;
pub mod experiment;
pub mod ledger;
pub mod profile;
pub mod scoring;
pub mod session;

pub use catalog::{CatalogFilter, CatalogStore, InMemoryCatalog};
pub use coldstart::ColdStartFallback;
pub use diversity::{DiversifiedList, DiversitySampler};
pub use engine::RecommendationEngine;
pub use experiment::{
    AssignmentStore, ExperimentAssigner, ExperimentSpec, InMemoryAssignmentStore, VariantSpec,
};
pub use ledger::{AppendOutcome, InMemorySwipeLedger, SwipeStore};
pub use profile::{InMemoryProfileStore, PreferenceAnalyzer, ProfileCache, ProfileStore};
pub use scoring::{Scorer, ScoringWeights};
pub use session::{SessionLearner, SessionRegistry};

use thiserror::Error;

/// Errors surfaced by the backing stores the engine depends on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Engine-level error taxonomy.
///
/// `DependencyUnavailable` is retryable; `ProfileComputationFailed` is logged
/// and degraded internally, never fatal to a request on its own;
/// `InvalidInput` is rejected before any I/O.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("profile computation failed: {0}")]
    ProfileComputationFailed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => EngineError::DependencyUnavailable(msg),
            StoreError::InvalidData(msg) => EngineError::ProfileComputationFailed(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
