pub mod memory;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    config::Config,
    error::Result,
    models::{LeaderboardEntry, UserProfile, UserRecord},
};

pub use memory::MemoryStore;

/// Durable per-user record store behind the global leaderboard.
///
/// `submit_if_higher` is the only write that touches `score`/`reaction_time`
/// and must be a single atomic conditional update: of two concurrent
/// submissions for one fid, the higher score always wins.
#[async_trait]
pub trait LeaderboardStore: Send + Sync {
    /// Inserts or refreshes profile fields and stamps `last_seen`.
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()>;

    /// Applies the ratchet: when the raw `score` beats the stored value
    /// (an absent record counts as 0), writes `floor(score)` and lowers
    /// `reaction_time` to `min(stored, reaction_time)`. Returns whether it wrote.
    async fn submit_if_higher(
        &self,
        fid: i64,
        score: f64,
        reaction_time: Option<i64>,
    ) -> Result<bool>;

    /// Highest scores first, ties by ascending fid, ranks 1-based.
    async fn top_scores(&self, limit: i64) -> Result<Vec<LeaderboardEntry>>;

    async fn get_user(&self, fid: i64) -> Result<Option<UserRecord>>;

    async fn is_healthy(&self) -> bool;
}

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

// ==================== USER QUERIES ====================
#[async_trait]
impl LeaderboardStore for Database {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (fid, username, display_name, pfp_url, wallet_address, last_seen)
            VALUES ($1, $2, $3, $4, $5, NOW())
            ON CONFLICT (fid) DO UPDATE
            SET username       = EXCLUDED.username,
                display_name   = EXCLUDED.display_name,
                pfp_url        = EXCLUDED.pfp_url,
                wallet_address = EXCLUDED.wallet_address,
                last_seen      = EXCLUDED.last_seen
            "#,
        )
        .bind(profile.fid)
        .bind(&profile.username)
        .bind(&profile.display_name)
        .bind(&profile.pfp_url)
        .bind(&profile.wallet_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn submit_if_higher(
        &self,
        fid: i64,
        score: f64,
        reaction_time: Option<i64>,
    ) -> Result<bool> {
        // One statement: the conflict row is locked while the WHERE is
        // evaluated, so a lower concurrent write can never land last.
        // LEAST ignores NULL, which stands for +infinity on both sides.
        let written: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO users (fid, score, reaction_time)
            SELECT $1, FLOOR($2)::BIGINT, $3
            WHERE $2 > 0
            ON CONFLICT (fid) DO UPDATE
            SET score         = EXCLUDED.score,
                reaction_time = LEAST(users.reaction_time, EXCLUDED.reaction_time)
            WHERE users.score < $2
            RETURNING fid
            "#,
        )
        .bind(fid)
        .bind(score)
        .bind(reaction_time)
        .fetch_optional(&self.pool)
        .await?;

        Ok(written.is_some())
    }

    async fn top_scores(&self, limit: i64) -> Result<Vec<LeaderboardEntry>> {
        let entries = sqlx::query_as::<_, LeaderboardEntry>(
            r#"
            SELECT
                ROW_NUMBER() OVER (ORDER BY score DESC, fid ASC) AS rank,
                fid,
                username,
                display_name,
                pfp_url,
                score,
                reaction_time
            FROM users
            ORDER BY score DESC, fid ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn get_user(&self, fid: i64) -> Result<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRecord>(
            "SELECT fid, username, display_name, pfp_url, wallet_address, score, reaction_time, last_seen
             FROM users WHERE fid = $1",
        )
        .bind(fid)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
