use std::sync::{Arc, Weak};
use std::time::Duration;

use rand::{rngs::StdRng, Rng, SeedableRng};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};

use super::{grid::Grid, scoring::round_score};
use crate::{
    client::{LocalLeaderboardStore, SyncClient},
    constants::{ADVANCE_DELAY_MS, GRID_SIZE, READY_DELAY_MAX_MS, READY_DELAY_MIN_MS},
    models::{LeaderboardSnapshot, ScoreEntry},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTiming {
    pub ready_delay_min: Duration,
    pub ready_delay_max: Duration,
    pub advance_delay: Duration,
    pub grid_size: usize,
}

impl Default for RoundTiming {
    fn default() -> Self {
        Self {
            ready_delay_min: Duration::from_millis(READY_DELAY_MIN_MS),
            ready_delay_max: Duration::from_millis(READY_DELAY_MAX_MS),
            advance_delay: Duration::from_millis(ADVANCE_DELAY_MS),
            grid_size: GRID_SIZE,
        }
    }
}

impl RoundTiming {
    fn sample_ready_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.ready_delay_min.as_millis() as u64;
        let max = (self.ready_delay_max.as_millis() as u64).max(min);
        Duration::from_millis(rng.random_range(min..=max))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundResult {
    Success {
        grid: Grid,
        tapped: usize,
        reaction_time_ms: f64,
        round_score: u64,
    },
    Failure {
        grid: Grid,
        tapped: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RoundPhase {
    Idle,
    Waiting,
    Ready { grid: Grid, ready_at: Instant },
    Done(RoundResult),
}

impl RoundPhase {
    pub fn is_ready(&self) -> bool {
        matches!(self, RoundPhase::Ready { .. })
    }

    pub fn grid(&self) -> Option<&Grid> {
        match self {
            RoundPhase::Ready { grid, .. } => Some(grid),
            RoundPhase::Done(RoundResult::Success { grid, .. })
            | RoundPhase::Done(RoundResult::Failure { grid, .. }) => Some(grid),
            RoundPhase::Idle | RoundPhase::Waiting => None,
        }
    }
}

/// The timed transitions. At most one is pending per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// waiting -> ready
    Reveal,
    /// done(success) -> waiting
    Advance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TapOutcome {
    /// Not in the ready phase, or the index is off the grid.
    Ignored,
    Hit {
        reaction_time_ms: f64,
        round_score: u64,
        streak: u32,
        session_score: u64,
    },
    Miss {
        tapped: usize,
        target: usize,
    },
}

/// Read-only view for rendering HUD, grid and feedback.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub phase: RoundPhase,
    pub streak: u32,
    /// Sum of round scores since the last start; this is what leaderboards see.
    pub session_score: u64,
    pub last_round_score: Option<u64>,
    pub last_reaction_ms: Option<f64>,
    pub pending: Option<Transition>,
}

struct PendingTransition {
    transition: Transition,
    epoch: u64,
    handle: JoinHandle<()>,
}

struct Session {
    phase: RoundPhase,
    streak: u32,
    session_score: u64,
    last_round_score: Option<u64>,
    last_reaction_ms: Option<f64>,
    pending: Option<PendingTransition>,
    // bumped on every schedule/cancel; a timer only fires if its epoch is current
    epoch: u64,
    rng: StdRng,
    timing: RoundTiming,
    local: LocalLeaderboardStore,
    sync: Option<SyncClient>,
}

impl Session {
    fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase.clone(),
            streak: self.streak,
            session_score: self.session_score,
            last_round_score: self.last_round_score,
            last_reaction_ms: self.last_reaction_ms,
            pending: self.pending.as_ref().map(|p| p.transition),
        }
    }

    fn reset_score(&mut self) {
        self.streak = 0;
        self.session_score = 0;
        self.last_round_score = None;
        self.last_reaction_ms = None;
    }

    fn cancel_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            tracing::debug!("Cancelled pending {:?}", pending.transition);
        }
        self.epoch = self.epoch.wrapping_add(1);
    }

    fn schedule(&mut self, this: Weak<Mutex<Session>>, transition: Transition, delay: Duration) {
        self.cancel_pending();
        let epoch = self.epoch;

        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let Some(shared) = this.upgrade() else {
                return;
            };
            let mut session = shared.lock().await;
            session.fire(epoch, transition, this.clone());
        });

        self.pending = Some(PendingTransition {
            transition,
            epoch,
            handle,
        });
    }

    fn begin_round(&mut self, this: Weak<Mutex<Session>>) {
        self.phase = RoundPhase::Waiting;
        let delay = self.timing.sample_ready_delay(&mut self.rng);
        tracing::debug!("Round waiting, reveal in {:?}", delay);
        self.schedule(this, Transition::Reveal, delay);
    }

    fn fire(&mut self, epoch: u64, transition: Transition, this: Weak<Mutex<Session>>) {
        match &self.pending {
            Some(pending) if pending.epoch == epoch => {}
            _ => {
                tracing::debug!("Dropping stale {:?} timer", transition);
                return;
            }
        }
        // our own task; nothing to abort
        self.pending = None;

        match transition {
            Transition::Reveal if self.phase == RoundPhase::Waiting => {
                let grid = Grid::generate(&mut self.rng, self.timing.grid_size);
                self.phase = RoundPhase::Ready {
                    grid,
                    ready_at: Instant::now(),
                };
            }
            Transition::Advance
                if matches!(self.phase, RoundPhase::Done(RoundResult::Success { .. })) =>
            {
                self.begin_round(this);
            }
            _ => {
                tracing::warn!("Ignoring {:?} in phase {:?}", transition, self.phase);
            }
        }
    }

    fn tap(&mut self, index: usize, this: Weak<Mutex<Session>>) -> TapOutcome {
        let (grid, ready_at) = match std::mem::replace(&mut self.phase, RoundPhase::Idle) {
            RoundPhase::Ready { grid, ready_at } if index < grid.len() => (grid, ready_at),
            other => {
                self.phase = other;
                return TapOutcome::Ignored;
            }
        };

        let reaction_time_ms = ready_at.elapsed().as_secs_f64() * 1000.0;
        let target = grid.target_index();

        if !grid.is_target(index) {
            self.cancel_pending();
            self.streak = 0;
            self.phase = RoundPhase::Done(RoundResult::Failure {
                grid,
                tapped: index,
            });
            tracing::debug!("Miss: tapped {} (target {})", index, target);
            return TapOutcome::Miss {
                tapped: index,
                target,
            };
        }

        self.streak += 1;
        let score = round_score(reaction_time_ms, self.streak);
        self.session_score += score;
        self.last_round_score = Some(score);
        self.last_reaction_ms = Some(reaction_time_ms);
        self.phase = RoundPhase::Done(RoundResult::Success {
            grid,
            tapped: index,
            reaction_time_ms,
            round_score: score,
        });

        self.local
            .record(ScoreEntry::new(self.session_score, reaction_time_ms));
        if let Some(sync) = &self.sync {
            // detached; the round never waits on the network
            drop(sync.forward_score(self.session_score, reaction_time_ms));
        }

        tracing::debug!(
            "Hit: {:.1}ms, round score {}, streak {}, session {}",
            reaction_time_ms,
            score,
            self.streak,
            self.session_score
        );

        let advance = self.timing.advance_delay;
        self.schedule(this, Transition::Advance, advance);

        TapOutcome::Hit {
            reaction_time_ms,
            round_score: score,
            streak: self.streak,
            session_score: self.session_score,
        }
    }
}

/// Drives one player's session: idle -> waiting -> ready -> done, with
/// automatic continuation after a success.
///
/// Must be used inside a tokio runtime; timers are tokio tasks.
#[derive(Clone)]
pub struct RoundScheduler {
    session: Arc<Mutex<Session>>,
}

impl RoundScheduler {
    pub fn new(local: LocalLeaderboardStore, sync: Option<SyncClient>, timing: RoundTiming) -> Self {
        Self::with_rng(local, sync, timing, StdRng::from_os_rng())
    }

    pub fn with_rng(
        local: LocalLeaderboardStore,
        sync: Option<SyncClient>,
        timing: RoundTiming,
        rng: StdRng,
    ) -> Self {
        let session = Session {
            phase: RoundPhase::Idle,
            streak: 0,
            session_score: 0,
            last_round_score: None,
            last_reaction_ms: None,
            pending: None,
            epoch: 0,
            rng,
            timing,
            local,
            sync,
        };
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }

    /// Starts (or restarts) a session from any phase. Clears score and streak.
    pub async fn start(&self) {
        let this = Arc::downgrade(&self.session);
        let mut session = self.session.lock().await;
        session.cancel_pending();
        session.reset_score();
        session.begin_round(this);
        tracing::info!("Session started");
    }

    pub async fn tap(&self, index: usize) -> TapOutcome {
        let this = Arc::downgrade(&self.session);
        let mut session = self.session.lock().await;
        session.tap(index, this)
    }

    /// Abandons the session: cancels any pending timer and returns to idle.
    pub async fn teardown(&self) {
        let mut session = self.session.lock().await;
        session.cancel_pending();
        session.reset_score();
        session.phase = RoundPhase::Idle;
        tracing::info!("Session torn down");
    }

    pub async fn view(&self) -> SessionView {
        self.session.lock().await.view()
    }

    pub async fn local_leaderboard(&self) -> LeaderboardSnapshot {
        self.session.lock().await.local.load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::{MemoryKeyValueStore, JsonStore};
    use crate::client::sync::tests::RecordingSubmitter;
    use crate::client::sync::RetryPolicy;

    const REVEAL_MS: u64 = 2_000;
    const ADVANCE_MS: u64 = 1_500;

    fn fixed_timing() -> RoundTiming {
        RoundTiming {
            ready_delay_min: Duration::from_millis(REVEAL_MS),
            ready_delay_max: Duration::from_millis(REVEAL_MS),
            advance_delay: Duration::from_millis(ADVANCE_MS),
            grid_size: 16,
        }
    }

    fn local_store() -> LocalLeaderboardStore {
        LocalLeaderboardStore::new(JsonStore::new(Arc::new(MemoryKeyValueStore::new())))
    }

    fn scheduler(sync: Option<SyncClient>) -> (RoundScheduler, LocalLeaderboardStore) {
        let local = local_store();
        let scheduler =
            RoundScheduler::with_rng(local.clone(), sync, fixed_timing(), StdRng::seed_from_u64(99));
        (scheduler, local)
    }

    async fn sleep_ms(ms: u64) {
        sleep(Duration::from_millis(ms)).await;
    }

    async fn ready_grid(scheduler: &RoundScheduler) -> Grid {
        match scheduler.view().await.phase {
            RoundPhase::Ready { grid, .. } => grid,
            other => panic!("expected ready phase, got {:?}", other),
        }
    }

    fn decoy_index(grid: &Grid) -> usize {
        (grid.target_index() + 1) % grid.len()
    }

    #[test]
    fn ready_delay_stays_in_range() {
        let timing = RoundTiming::default();
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..500 {
            let delay = timing.sample_ready_delay(&mut rng).as_millis() as u64;
            assert!((READY_DELAY_MIN_MS..=READY_DELAY_MAX_MS).contains(&delay));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_waits_then_reveals_grid() {
        let (scheduler, _) = scheduler(None);
        scheduler.start().await;

        let view = scheduler.view().await;
        assert_eq!(view.phase, RoundPhase::Waiting);
        assert_eq!(view.pending, Some(Transition::Reveal));

        sleep_ms(REVEAL_MS - 100).await;
        assert_eq!(scheduler.view().await.phase, RoundPhase::Waiting);

        sleep_ms(101).await;
        let view = scheduler.view().await;
        assert!(view.phase.is_ready());
        assert_eq!(view.pending, None);
        assert_eq!(view.phase.grid().map(Grid::len), Some(16));
    }

    #[tokio::test(start_paused = true)]
    async fn hit_scores_records_and_auto_advances() {
        let (scheduler, local) = scheduler(None);
        scheduler.start().await;
        sleep_ms(REVEAL_MS + 1).await;
        let grid = ready_grid(&scheduler).await;

        sleep_ms(120).await;
        let outcome = scheduler.tap(grid.target_index()).await;
        let TapOutcome::Hit {
            reaction_time_ms,
            round_score: score,
            streak,
            session_score,
        } = outcome
        else {
            panic!("expected hit, got {:?}", outcome);
        };
        assert!((115.0..=125.0).contains(&reaction_time_ms));
        assert_eq!(score, round_score(reaction_time_ms, 1));
        assert_eq!(streak, 1);
        assert_eq!(session_score, score);

        let snapshot = local.load();
        assert_eq!(snapshot.top_entries.len(), 1);
        assert_eq!(snapshot.top_entries[0].score, score);
        assert_eq!(snapshot.best_time_ms, Some(reaction_time_ms));

        let view = scheduler.view().await;
        assert!(matches!(view.phase, RoundPhase::Done(RoundResult::Success { .. })));
        assert_eq!(view.pending, Some(Transition::Advance));

        sleep_ms(ADVANCE_MS + 1).await;
        let view = scheduler.view().await;
        assert_eq!(view.phase, RoundPhase::Waiting);
        assert_eq!(view.streak, 1);
        assert_eq!(view.session_score, score);
    }

    #[tokio::test(start_paused = true)]
    async fn session_score_accumulates_across_rounds() {
        let (scheduler, local) = scheduler(None);
        scheduler.start().await;

        let mut totals = Vec::new();
        for _ in 0..3 {
            sleep_ms(REVEAL_MS + 1).await;
            let grid = ready_grid(&scheduler).await;
            sleep_ms(200).await;
            match scheduler.tap(grid.target_index()).await {
                TapOutcome::Hit { session_score, .. } => totals.push(session_score),
                other => panic!("expected hit, got {:?}", other),
            }
            sleep_ms(ADVANCE_MS).await;
        }

        assert!(totals.windows(2).all(|w| w[1] > w[0]));
        let view = scheduler.view().await;
        assert_eq!(view.streak, 3);
        assert_eq!(view.session_score, totals[2]);
        // streak bonus grows: third round earns at least 300 on top of base
        assert!(view.last_round_score.unwrap() >= 300);

        let recorded: Vec<u64> = local.load().top_entries.iter().map(|e| e.score).collect();
        assert_eq!(recorded, totals.iter().rev().copied().collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn miss_resets_streak_and_ends_session() {
        let (scheduler, local) = scheduler(None);
        scheduler.start().await;
        sleep_ms(REVEAL_MS + 1).await;
        let grid = ready_grid(&scheduler).await;
        scheduler.tap(grid.target_index()).await;
        sleep_ms(ADVANCE_MS + REVEAL_MS + 1).await;

        let grid = ready_grid(&scheduler).await;
        let wrong = decoy_index(&grid);
        let outcome = scheduler.tap(wrong).await;
        assert_eq!(
            outcome,
            TapOutcome::Miss {
                tapped: wrong,
                target: grid.target_index()
            }
        );

        let view = scheduler.view().await;
        assert_eq!(view.streak, 0);
        assert_eq!(view.pending, None);
        assert!(matches!(view.phase, RoundPhase::Done(RoundResult::Failure { .. })));
        assert_eq!(local.load().top_entries.len(), 1);

        // no automatic continuation after a failure
        sleep_ms(10_000).await;
        assert!(matches!(
            scheduler.view().await.phase,
            RoundPhase::Done(RoundResult::Failure { .. })
        ));

        scheduler.start().await;
        let view = scheduler.view().await;
        assert_eq!(view.phase, RoundPhase::Waiting);
        assert_eq!(view.session_score, 0);
        assert_eq!(view.last_round_score, None);
    }

    #[tokio::test(start_paused = true)]
    async fn taps_outside_ready_are_ignored() {
        let (scheduler, local) = scheduler(None);
        assert_eq!(scheduler.tap(0).await, TapOutcome::Ignored);

        scheduler.start().await;
        assert_eq!(scheduler.tap(0).await, TapOutcome::Ignored);
        assert_eq!(scheduler.view().await.phase, RoundPhase::Waiting);

        sleep_ms(REVEAL_MS + 1).await;
        assert_eq!(scheduler.tap(16).await, TapOutcome::Ignored);
        assert!(scheduler.view().await.phase.is_ready());

        let grid = ready_grid(&scheduler).await;
        scheduler.tap(grid.target_index()).await;
        assert_eq!(scheduler.tap(grid.target_index()).await, TapOutcome::Ignored);
        assert_eq!(local.load().top_entries.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_cancels_stale_reveal() {
        let (scheduler, _) = scheduler(None);
        scheduler.start().await;
        sleep_ms(1_000).await;
        scheduler.start().await;

        // the first reveal would have fired here
        sleep_ms(REVEAL_MS - 1_000 + 1).await;
        assert_eq!(scheduler.view().await.phase, RoundPhase::Waiting);

        sleep_ms(1_000).await;
        assert!(scheduler.view().await.phase.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_during_done_cancels_auto_advance() {
        let (scheduler, _) = scheduler(None);
        scheduler.start().await;
        sleep_ms(REVEAL_MS + 1).await;
        let grid = ready_grid(&scheduler).await;
        scheduler.tap(grid.target_index()).await;

        sleep_ms(500).await;
        scheduler.start().await;
        assert_eq!(scheduler.view().await.session_score, 0);

        assert_eq!(scheduler.view().await.pending, Some(Transition::Reveal));

        // the old advance deadline passes without touching the new round
        sleep_ms(ADVANCE_MS - 500 + 1).await;
        assert_eq!(scheduler.view().await.phase, RoundPhase::Waiting);
        assert_eq!(scheduler.view().await.pending, Some(Transition::Reveal));

        sleep_ms(REVEAL_MS).await;
        assert!(scheduler.view().await.phase.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_discards_pending_transition() {
        let (scheduler, _) = scheduler(None);
        scheduler.start().await;
        scheduler.teardown().await;

        let view = scheduler.view().await;
        assert_eq!(view.phase, RoundPhase::Idle);
        assert_eq!(view.pending, None);

        sleep_ms(REVEAL_MS * 3).await;
        assert_eq!(scheduler.view().await.phase, RoundPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn hit_forwards_session_score_to_sync() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let sync = SyncClient::new(submitter.clone(), 77);
        let (scheduler, _) = scheduler(Some(sync));

        scheduler.start().await;
        sleep_ms(REVEAL_MS + 1).await;
        let grid = ready_grid(&scheduler).await;
        sleep_ms(250).await;
        let TapOutcome::Hit {
            session_score,
            reaction_time_ms,
            ..
        } = scheduler.tap(grid.target_index()).await
        else {
            panic!("expected hit");
        };

        sleep_ms(10).await;
        let scores = submitter.scores.lock().unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].fid, Some(77));
        assert_eq!(scores[0].score, Some(session_score as f64));
        assert_eq!(scores[0].time, Some(reaction_time_ms));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_sync_does_not_disturb_rounds() {
        let submitter = Arc::new(RecordingSubmitter::failing(u32::MAX));
        let sync = SyncClient::new(submitter, 77).with_retry(RetryPolicy::new(5, 10_000));
        let (scheduler, local) = scheduler(Some(sync));

        scheduler.start().await;
        sleep_ms(REVEAL_MS + 1).await;
        let grid = ready_grid(&scheduler).await;
        assert!(matches!(
            scheduler.tap(grid.target_index()).await,
            TapOutcome::Hit { .. }
        ));

        sleep_ms(ADVANCE_MS + 1).await;
        assert_eq!(scheduler.view().await.phase, RoundPhase::Waiting);
        assert_eq!(local.load().top_entries.len(), 1);
    }
}
