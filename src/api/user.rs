use axum::{extract::State, Json};

use crate::{
    error::Result,
    models::{Ack, ApiResponse, UserSyncRequest},
};

use super::{ApiJson, AppState};

/// POST /user
pub async fn sync_user(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<UserSyncRequest>,
) -> Result<Json<ApiResponse<Ack>>> {
    state.leaderboard.sync_profile(req.user).await?;
    Ok(Json(ApiResponse::success(Ack {})))
}
