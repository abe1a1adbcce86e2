mod analyzer;
mod cache;

pub use analyzer::PreferenceAnalyzer;
pub use cache::ProfileCache;

use super::StoreResult;
use crate::models::{OnboardingPreferences, PreferenceProfile};
use async_trait::async_trait;
use dashmap::DashMap;

/// Persistence for computed preference profiles and onboarding choices.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load(&self, user_id: &str) -> StoreResult<Option<PreferenceProfile>>;

    async fn save(&self, profile: PreferenceProfile) -> StoreResult<()>;

    async fn load_onboarding(&self, user_id: &str) -> StoreResult<Option<OnboardingPreferences>>;

    async fn save_onboarding(
        &self,
        user_id: &str,
        preferences: OnboardingPreferences,
    ) -> StoreResult<()>;
}

#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<String, PreferenceProfile>,
    onboarding: DashMap<String, OnboardingPreferences>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, user_id: &str) -> StoreResult<Option<PreferenceProfile>> {
        Ok(self.profiles.get(user_id).map(|entry| entry.clone()))
    }

    async fn save(&self, profile: PreferenceProfile) -> StoreResult<()> {
        self.profiles.insert(profile.user_id.clone(), profile);
        Ok(())
    }

    async fn load_onboarding(&self, user_id: &str) -> StoreResult<Option<OnboardingPreferences>> {
        Ok(self.onboarding.get(user_id).map(|entry| entry.clone()))
    }

    async fn save_onboarding(
        &self,
        user_id: &str,
        preferences: OnboardingPreferences,
    ) -> StoreResult<()> {
        self.onboarding.insert(user_id.to_string(), preferences);
        Ok(())
    }
}
