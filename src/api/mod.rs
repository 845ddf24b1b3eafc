// src/api/mod.rs
pub mod health;
pub mod score;
pub mod user;

use std::sync::Arc;

use axum::extract::{FromRequest, FromRequestParts};

use crate::config::Config;
use crate::db::LeaderboardStore;
use crate::error::AppError;
use crate::services::LeaderboardService;

/// `Json` extractor that rejects with [`AppError`] instead of axum's plain-text 422.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Query` extractor with the same rejection mapping.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(Clone)]
pub struct AppState {
    pub leaderboard: LeaderboardService,
    pub config: Config,
}

impl AppState {
    pub fn new(store: Arc<dyn LeaderboardStore>, config: Config) -> Self {
        let leaderboard =
            LeaderboardService::new(store).with_limit(config.effective_leaderboard_limit());
        Self {
            leaderboard,
            config,
        }
    }
}

#[cfg(test)]
pub(crate) fn test_state() -> (AppState, crate::db::MemoryStore) {
    let store = crate::db::MemoryStore::new();
    let state = AppState::new(Arc::new(store.clone()), crate::config::test_config());
    (state, store)
}
