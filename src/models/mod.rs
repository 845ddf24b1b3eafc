// src/models/mod.rs
pub mod score;
pub mod user;

pub use score::{LeaderboardSnapshot, ScoreEntry};
pub use user::{
    Ack,
    ApiResponse,
    LeaderboardEntry,
    LeaderboardQuery,
    LeaderboardResponse,
    SubmitScoreRequest,
    SubmitScoreResponse,
    UserPayload,
    UserProfile,
    UserRecord,
    UserSyncRequest,
};
