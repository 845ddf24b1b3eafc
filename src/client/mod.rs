pub mod local_leaderboard;
pub mod storage;
pub mod sync;

pub use local_leaderboard::LocalLeaderboardStore;
pub use storage::{FileKeyValueStore, JsonStore, KeyValueStore, MemoryKeyValueStore};
pub use sync::{HttpLeaderboardClient, RetryPolicy, ScoreSubmitter, SyncClient};
