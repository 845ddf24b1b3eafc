use axum::{extract::State, Json};

use crate::{
    error::Result,
    models::{
        ApiResponse, LeaderboardQuery, LeaderboardResponse, SubmitScoreRequest,
        SubmitScoreResponse,
    },
};

use super::{ApiJson, ApiQuery, AppState};

/// GET /score
pub async fn get_leaderboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>> {
    let leaderboard = state.leaderboard.top_n(query.limit).await?;
    Ok(Json(LeaderboardResponse { leaderboard }))
}

/// POST /score
pub async fn submit_score(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<SubmitScoreRequest>,
) -> Result<Json<ApiResponse<SubmitScoreResponse>>> {
    let outcome = state
        .leaderboard
        .submit_score(req.fid, req.score, req.time)
        .await?;

    Ok(Json(ApiResponse::success(SubmitScoreResponse {
        updated: outcome.accepted,
    })))
}
