use crate::models::PreferenceProfile;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

struct CachedProfile {
    profile: PreferenceProfile,
    swipe_count: u64,
    cached_at: DateTime<Utc>,
    stale: bool,
}

/// Process-local profile cache. A cached profile serves requests until it
/// ages past the TTL, gets explicitly marked stale by a swipe write, or the
/// user's swipe count moves far enough past the count it was computed at.
pub struct ProfileCache {
    entries: DashMap<String, CachedProfile>,
    ttl: Duration,
    stale_swipe_delta: u64,
}

impl ProfileCache {
    pub fn new(ttl_secs: u64, stale_swipe_delta: u64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs as i64),
            stale_swipe_delta,
        }
    }

    /// Returns the cached profile only while it is still considered fresh.
    pub fn fresh(&self, user_id: &str, current_swipe_count: u64) -> Option<PreferenceProfile> {
        let entry = self.entries.get(user_id)?;
        if entry.stale {
            return None;
        }
        if Utc::now() - entry.cached_at >= self.ttl {
            return None;
        }
        if current_swipe_count.saturating_sub(entry.swipe_count) >= self.stale_swipe_delta {
            return None;
        }
        Some(entry.profile.clone())
    }

    /// Last cached profile regardless of freshness. Fallback for when a
    /// recomputation fails and serving something stale beats serving nothing.
    pub fn last_known(&self, user_id: &str) -> Option<PreferenceProfile> {
        self.entries.get(user_id).map(|entry| entry.profile.clone())
    }

    pub fn insert(&self, profile: PreferenceProfile, swipe_count: u64) {
        self.entries.insert(
            profile.user_id.clone(),
            CachedProfile {
                profile,
                swipe_count,
                cached_at: Utc::now(),
                stale: false,
            },
        );
    }

    pub fn mark_stale(&self, user_id: &str) {
        if let Some(mut entry) = self.entries.get_mut(user_id) {
            entry.stale = true;
        }
    }
}
