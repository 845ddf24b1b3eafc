use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emoji_reaction::{
    client::{
        FileKeyValueStore, HttpLeaderboardClient, JsonStore, LocalLeaderboardStore, RetryPolicy,
        SyncClient,
    },
    config::GameConfig,
    game::{RoundScheduler, RoundTiming, TapOutcome},
    models::UserPayload,
};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const READY_TIMEOUT: Duration = Duration::from_secs(10);
// tap delay window for the simulated player
const REACTION_MIN_MS: u64 = 180;
const REACTION_MAX_MS: u64 = 450;
const MISS_CHANCE: f64 = 0.1;

struct Args {
    sessions: u32,
    max_rounds: u32,
    reset: bool,
}

fn parse_args() -> Result<Args, String> {
    let (flags, args): (Vec<String>, Vec<String>) =
        std::env::args().skip(1).partition(|arg| arg.starts_with("--"));
    let mut reset = false;
    for flag in &flags {
        match flag.as_str() {
            "--reset" => reset = true,
            other => return Err(format!("unknown flag '{other}'")),
        }
    }
    let parse = |idx: usize, default: u32, name: &str| -> Result<u32, String> {
        match args.get(idx) {
            Some(raw) => raw
                .parse::<u32>()
                .map_err(|e| format!("invalid {name} '{raw}': {e}")),
            None => Ok(default),
        }
    };
    Ok(Args {
        sessions: parse(0, 3, "sessions")?.max(1),
        max_rounds: parse(1, 5, "max_rounds")?.max(1),
        reset,
    })
}

/// Target index and grid size once the grid is revealed.
async fn wait_until_ready(scheduler: &RoundScheduler) -> anyhow::Result<(usize, usize)> {
    let ready = timeout(READY_TIMEOUT, async {
        loop {
            let view = scheduler.view().await;
            if view.phase.is_ready() {
                if let Some(grid) = view.phase.grid() {
                    return (grid.target_index(), grid.len());
                }
            }
            sleep(POLL_INTERVAL).await;
        }
    })
    .await?;
    Ok(ready)
}

async fn play_session(scheduler: &RoundScheduler, max_rounds: u32) -> anyhow::Result<u64> {
    scheduler.start().await;

    for round in 1..=max_rounds {
        let (target, size) = wait_until_ready(scheduler).await?;
        let (delay_ms, miss) = {
            let mut rng = rand::rng();
            (
                rng.random_range(REACTION_MIN_MS..=REACTION_MAX_MS),
                rng.random_bool(MISS_CHANCE),
            )
        };
        sleep(Duration::from_millis(delay_ms)).await;

        let index = if miss { (target + 1) % size } else { target };

        match scheduler.tap(index).await {
            TapOutcome::Hit {
                reaction_time_ms,
                round_score,
                streak,
                session_score,
            } => println!(
                "  round {round}: hit in {reaction_time_ms:.0}ms, +{round_score} (streak {streak}, total {session_score})"
            ),
            TapOutcome::Miss { tapped, target } => {
                println!("  round {round}: missed (tapped {tapped}, target was {target})");
                break;
            }
            TapOutcome::Ignored => tracing::warn!("Tap ignored in round {}", round),
        }
    }

    let score = scheduler.view().await.session_score;
    scheduler.teardown().await;
    Ok(score)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "emoji_reaction=info,reaction_bot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            eprintln!("usage: reaction-bot [--reset] [sessions] [max_rounds]");
            std::process::exit(2);
        }
    };

    let config = GameConfig::from_env()?;
    config.validate()?;

    let backing = Arc::new(FileKeyValueStore::new(&config.data_dir)?);
    let local = LocalLeaderboardStore::new(JsonStore::new(backing));
    if args.reset {
        local.clear()?;
        println!("local history cleared");
    }

    let remote = HttpLeaderboardClient::new(&config.api_url)?;
    let sync = config.fid.map(|fid| {
        SyncClient::new(Arc::new(remote.clone()), fid)
            .with_retry(RetryPolicy::new(config.sync_attempts, config.sync_retry_ms))
    });

    if let Some(sync) = &sync {
        let profile = UserPayload {
            username: Some(format!("reaction-bot-{}", sync.fid())),
            display_name: Some("Reaction Bot".to_string()),
            ..UserPayload::default()
        };
        sync.sync_profile(profile).await?;
    }

    let scheduler = RoundScheduler::new(local.clone(), sync.clone(), RoundTiming::default());
    for session in 1..=args.sessions {
        println!("session {session}/{}", args.sessions);
        let score = play_session(&scheduler, args.max_rounds).await?;
        println!("  session score: {score}");
    }

    if let Some(sync) = &sync {
        if sync.in_flight() > 0 {
            tracing::info!("Waiting for {} score submissions", sync.in_flight());
        }
        sync.flush().await;
    }

    let snapshot = local.load();
    if snapshot.is_empty() {
        println!("no local history yet");
    }
    println!(
        "local best score: {}",
        snapshot
            .best_score()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!(
        "local best time: {}",
        snapshot
            .best_time_ms
            .map(|t| format!("{t:.0}ms"))
            .unwrap_or_else(|| "-".to_string())
    );

    if sync.is_some() {
        match remote.fetch_leaderboard(Some(10)).await {
            Ok(entries) => {
                println!("global top {}:", entries.len());
                for entry in entries {
                    println!(
                        "  #{} fid={} {} score={}",
                        entry.rank,
                        entry.fid,
                        entry.username.as_deref().unwrap_or("-"),
                        entry.score
                    );
                }
            }
            Err(e) => tracing::error!("Failed to fetch global leaderboard: {}", e),
        }
    }

    Ok(())
}
