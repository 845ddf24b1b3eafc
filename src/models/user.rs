use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ==================== USER ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct UserRecord {
    pub fid: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub wallet_address: Option<String>,
    pub score: i64,
    /// `None` until the first score-improving submission (read as +infinity).
    pub reaction_time: Option<i64>,
    pub last_seen: Option<DateTime<Utc>>,
}

impl UserRecord {
    pub fn baseline(fid: i64) -> Self {
        Self {
            fid,
            username: None,
            display_name: None,
            pfp_url: None,
            wallet_address: None,
            score: 0,
            reaction_time: None,
            last_seen: None,
        }
    }
}

/// Profile fields written by `POST /user`. Never touches score columns.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub fid: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub wallet_address: Option<String>,
}

// ==================== LEADERBOARD ====================
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub fid: i64,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub pfp_url: Option<String>,
    pub score: i64,
    pub reaction_time: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

// ==================== SCORE SUBMISSION ====================
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SubmitScoreRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitScoreResponse {
    pub updated: bool,
}

// ==================== PROFILE SYNC ====================
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserSyncRequest {
    #[serde(default)]
    pub user: Option<UserPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserPayload {
    #[serde(default)]
    pub fid: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default, rename = "pfpUrl")]
    pub pfp_url: Option<String>,
    #[serde(default)]
    pub verifications: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Ack {}

// ==================== API RESPONSE ====================
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
