/// Application constants

// Scoring
pub const BASE_SCORE_MAX: f64 = 1000.0;
pub const STREAK_BONUS: f64 = 100.0;

// Grid
pub const GRID_SIZE: usize = 16;
pub const TARGET_SYMBOL: &str = "✅";
pub const DECOY_SYMBOLS: [&str; 12] = [
    "❌", "🔥", "💣", "😂", "💀", "⚠️", "🍕", "🐍", "👀", "🧠", "👻", "😈",
];

// Round timing (milliseconds)
pub const READY_DELAY_MIN_MS: u64 = 1_500;
pub const READY_DELAY_MAX_MS: u64 = 3_500;
pub const ADVANCE_DELAY_MS: u64 = 1_500;

// Local leaderboard
pub const LOCAL_TOP_SCORES: usize = 10;
pub const LOCAL_LEADERBOARD_KEY: &str = "emoji_reaction_grid_data";

// Global leaderboard
pub const GLOBAL_LEADERBOARD_LIMIT: i64 = 50;

// Score sync
pub const DEFAULT_SYNC_ATTEMPTS: u32 = 3;
pub const DEFAULT_SYNC_RETRY_MS: u64 = 500;
pub const SYNC_HTTP_TIMEOUT_SECS: u64 = 10;
