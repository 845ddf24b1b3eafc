use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::LOCAL_TOP_SCORES;

// ==================== SCORE ENTRY ====================
/// One successful round as the client remembers it. Field names follow the
/// persisted blob (`score`, `time`, `date`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoreEntry {
    pub score: u64,
    #[serde(rename = "time")]
    pub reaction_time_ms: f64,
    #[serde(rename = "date", with = "chrono::serde::ts_milliseconds")]
    pub recorded_at: DateTime<Utc>,
}

impl ScoreEntry {
    pub fn new(score: u64, reaction_time_ms: f64) -> Self {
        Self {
            score,
            reaction_time_ms: reaction_time_ms.max(0.0),
            recorded_at: Utc::now(),
        }
    }
}

// ==================== LOCAL SNAPSHOT ====================
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LeaderboardSnapshot {
    #[serde(rename = "topScores", default)]
    pub top_entries: Vec<ScoreEntry>,
    /// Fastest reaction ever recorded, kept even after its entry is evicted.
    #[serde(rename = "bestTime", default)]
    pub best_time_ms: Option<f64>,
}

impl LeaderboardSnapshot {
    /// Returns the snapshot with `entry` merged in: top entries re-sorted and
    /// capped, best time lowered if the entry is faster.
    pub fn with_entry(mut self, entry: ScoreEntry) -> Self {
        self.best_time_ms = Some(match self.best_time_ms {
            Some(best) => best.min(entry.reaction_time_ms),
            None => entry.reaction_time_ms,
        });

        self.top_entries.push(entry);
        // stable: equal scores keep arrival order
        self.top_entries.sort_by(|a, b| b.score.cmp(&a.score));
        self.top_entries.truncate(LOCAL_TOP_SCORES);
        self
    }

    pub fn best_score(&self) -> Option<u64> {
        self.top_entries.first().map(|entry| entry.score)
    }

    pub fn is_empty(&self) -> bool {
        self.top_entries.is_empty() && self.best_time_ms.is_none()
    }
}
