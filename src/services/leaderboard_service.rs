use std::sync::Arc;

use crate::{
    constants::GLOBAL_LEADERBOARD_LIMIT,
    db::LeaderboardStore,
    error::{AppError, Result},
    models::{LeaderboardEntry, UserPayload, UserProfile},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitOutcome {
    pub accepted: bool,
}

fn require_fid(fid: Option<i64>) -> Result<i64> {
    match fid {
        Some(fid) if fid > 0 => Ok(fid),
        _ => Err(AppError::BadRequest("Missing data".to_string())),
    }
}

/// Accepts any finite score. Stores compare the raw value and persist it floored.
fn normalize_score(score: Option<f64>) -> Result<f64> {
    match score {
        Some(score) if score.is_finite() => Ok(score),
        Some(_) => Err(AppError::BadRequest("Score must be a finite number".to_string())),
        None => Err(AppError::BadRequest("Missing data".to_string())),
    }
}

/// Missing or non-finite times carry no information and leave the stored time alone.
fn normalize_time(time: Option<f64>) -> Option<i64> {
    time.filter(|t| t.is_finite()).map(|t| t.max(0.0).floor() as i64)
}

fn profile_from_payload(user: UserPayload, fid: i64) -> UserProfile {
    UserProfile {
        fid,
        username: user.username,
        display_name: user.display_name,
        pfp_url: user.pfp_url,
        wallet_address: user.verifications.into_iter().next(),
    }
}

/// Leaderboard Service - server side of the global ranking
#[derive(Clone)]
pub struct LeaderboardService {
    store: Arc<dyn LeaderboardStore>,
    limit: i64,
}

impl LeaderboardService {
    pub fn new(store: Arc<dyn LeaderboardStore>) -> Self {
        Self {
            store,
            limit: GLOBAL_LEADERBOARD_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit.clamp(1, GLOBAL_LEADERBOARD_LIMIT);
        self
    }

    /// Ratchet update: accepted only when the submitted score beats the stored best.
    pub async fn submit_score(
        &self,
        fid: Option<i64>,
        score: Option<f64>,
        time: Option<f64>,
    ) -> Result<SubmitOutcome> {
        let fid = require_fid(fid)?;
        let score = normalize_score(score)?;
        let reaction_time = normalize_time(time);

        let accepted = self
            .store
            .submit_if_higher(fid, score, reaction_time)
            .await?;

        if accepted {
            tracing::info!(
                "New best score: fid={}, score={}, reaction_time={:?}",
                fid,
                score,
                reaction_time
            );
        } else {
            tracing::debug!("Score not improved: fid={}, score={}", fid, score);
        }

        Ok(SubmitOutcome { accepted })
    }

    /// Global top scores; `limit` defaults to and is capped at the configured size.
    pub async fn top_n(&self, limit: Option<i64>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(self.limit).clamp(1, self.limit);
        self.store.top_scores(limit).await
    }

    /// Upserts profile fields; only the first verified address is kept.
    pub async fn sync_profile(&self, user: Option<UserPayload>) -> Result<()> {
        let user = user.ok_or_else(|| AppError::BadRequest("Missing user data".to_string()))?;
        let fid = require_fid(user.fid)
            .map_err(|_| AppError::BadRequest("Missing user data".to_string()))?;

        let profile = profile_from_payload(user, fid);
        self.store.upsert_profile(&profile).await?;
        tracing::debug!("Profile synced: fid={}", fid);
        Ok(())
    }

    pub async fn is_healthy(&self) -> bool {
        self.store.is_healthy().await
    }
}
