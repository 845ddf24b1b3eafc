// All service modules
pub mod leaderboard_service;

// Re-export for convenience
pub use leaderboard_service::{LeaderboardService, SubmitOutcome};
