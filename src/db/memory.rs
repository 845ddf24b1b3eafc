use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::LeaderboardStore;
use crate::{
    error::Result,
    models::{LeaderboardEntry, UserProfile, UserRecord},
};

/// Process-local store. Each write holds the map's write lock for the whole
/// read-compare-write, which gives the same ratchet guarantee as the SQL path.
#[derive(Clone, Default)]
pub struct MemoryStore {
    users: Arc<RwLock<HashMap<i64, UserRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl LeaderboardStore for MemoryStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        let mut users = self.users.write().await;
        let record = users
            .entry(profile.fid)
            .or_insert_with(|| UserRecord::baseline(profile.fid));

        record.username = profile.username.clone();
        record.display_name = profile.display_name.clone();
        record.pfp_url = profile.pfp_url.clone();
        record.wallet_address = profile.wallet_address.clone();
        record.last_seen = Some(Utc::now());
        Ok(())
    }

    async fn submit_if_higher(
        &self,
        fid: i64,
        score: f64,
        reaction_time: Option<i64>,
    ) -> Result<bool> {
        let mut users = self.users.write().await;
        let current_score = users.get(&fid).map(|record| record.score).unwrap_or(0);
        if score <= current_score as f64 {
            return Ok(false);
        }

        let record = users.entry(fid).or_insert_with(|| UserRecord::baseline(fid));
        record.score = score.floor() as i64;
        record.reaction_time = match (record.reaction_time, reaction_time) {
            (Some(stored), Some(new)) => Some(stored.min(new)),
            (stored, new) => stored.or(new),
        };
        Ok(true)
    }

    async fn top_scores(&self, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        let users = self.users.read().await;
        let mut records: Vec<&UserRecord> = users.values().collect();
        records.sort_by(|a, b| b.score.cmp(&a.score).then(a.fid.cmp(&b.fid)));

        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(records
            .into_iter()
            .take(limit)
            .enumerate()
            .map(|(index, record)| LeaderboardEntry {
                rank: index as i64 + 1,
                fid: record.fid,
                username: record.username.clone(),
                display_name: record.display_name.clone(),
                pfp_url: record.pfp_url.clone(),
                score: record.score,
                reaction_time: record.reaction_time,
            })
            .collect())
    }

    async fn get_user(&self, fid: i64) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(&fid).cloned())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
