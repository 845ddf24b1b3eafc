use crate::{
    client::storage::JsonStore,
    constants::LOCAL_LEADERBOARD_KEY,
    error::ClientError,
    models::{LeaderboardSnapshot, ScoreEntry},
};

/// Client-side top-10 history persisted as a single blob.
#[derive(Clone)]
pub struct LocalLeaderboardStore {
    storage: JsonStore,
}

impl LocalLeaderboardStore {
    pub fn new(storage: JsonStore) -> Self {
        Self { storage }
    }

    /// Current snapshot; absent or corrupted data reads as empty.
    pub fn load(&self) -> LeaderboardSnapshot {
        self.storage.get_or_default(LOCAL_LEADERBOARD_KEY)
    }

    /// Overwrites the stored snapshot as a whole.
    pub fn persist(&self, snapshot: &LeaderboardSnapshot) -> Result<(), ClientError> {
        self.storage.set(LOCAL_LEADERBOARD_KEY, snapshot)
    }

    /// Merges `entry` into the stored history and persists the result.
    ///
    /// A failed write is logged and the merged snapshot is still returned, so
    /// gameplay never sees a storage fault.
    pub fn record(&self, entry: ScoreEntry) -> LeaderboardSnapshot {
        let snapshot = self.load().with_entry(entry);
        if let Err(e) = self.persist(&snapshot) {
            tracing::warn!("Failed to persist local leaderboard: {}", e);
        }
        snapshot
    }

    pub fn clear(&self) -> Result<(), ClientError> {
        self.storage.remove(LOCAL_LEADERBOARD_KEY)
    }
}
