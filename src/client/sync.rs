use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use url::Url;

use crate::{
    constants::{DEFAULT_SYNC_ATTEMPTS, DEFAULT_SYNC_RETRY_MS, SYNC_HTTP_TIMEOUT_SECS},
    error::ClientError,
    models::{
        ApiResponse, LeaderboardEntry, LeaderboardResponse, SubmitScoreRequest,
        SubmitScoreResponse, UserPayload, UserSyncRequest,
    },
};

/// Transport to the remote leaderboard.
#[async_trait]
pub trait ScoreSubmitter: Send + Sync {
    /// Returns whether the server raised the stored best.
    async fn submit_score(&self, request: &SubmitScoreRequest) -> Result<bool, ClientError>;

    async fn sync_profile(&self, request: &UserSyncRequest) -> Result<(), ClientError>;
}

#[derive(Clone, Debug)]
pub struct HttpLeaderboardClient {
    base_url: Url,
    client: Client,
}

impl HttpLeaderboardClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let trimmed = base_url.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(SYNC_HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            base_url: Url::parse(&normalized)?,
            client,
        })
    }

    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    /// GET /score
    pub async fn fetch_leaderboard(
        &self,
        limit: Option<i64>,
    ) -> Result<Vec<LeaderboardEntry>, ClientError> {
        let mut url = self.endpoint("score")?;
        if let Some(limit) = limit {
            url.query_pairs_mut().append_pair("limit", &limit.to_string());
        }

        let resp = check_status(self.client.get(url).send().await?).await?;
        let payload: LeaderboardResponse = resp.json().await?;
        Ok(payload.leaderboard)
    }
}

async fn check_status(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or(body);
    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl ScoreSubmitter for HttpLeaderboardClient {
    async fn submit_score(&self, request: &SubmitScoreRequest) -> Result<bool, ClientError> {
        let resp = self
            .client
            .post(self.endpoint("score")?)
            .json(request)
            .send()
            .await?;
        let payload: ApiResponse<SubmitScoreResponse> = check_status(resp).await?.json().await?;
        Ok(payload.data.updated)
    }

    async fn sync_profile(&self, request: &UserSyncRequest) -> Result<(), ClientError> {
        let resp = self
            .client
            .post(self.endpoint("user")?)
            .json(request)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SYNC_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_SYNC_RETRY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay: Duration::from_millis(delay_ms),
        }
    }

    /// Runs `op` until it succeeds, fails permanently, or attempts run out.
    async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        "{} attempt {}/{} failed: {}; retrying",
                        label,
                        attempt,
                        attempts,
                        err
                    );
                    attempt += 1;
                    sleep(self.delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by each spawned sync task; dropping the last one wakes `flush`.
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Best-effort bridge from finished rounds to the remote leaderboard.
///
/// Every call spawns a detached task and returns immediately; failures end in
/// a log line and nothing else. Clones share one in-flight count, so
/// [`SyncClient::flush`] on any clone waits for all of them.
#[derive(Clone)]
pub struct SyncClient {
    submitter: Arc<dyn ScoreSubmitter>,
    fid: i64,
    retry: RetryPolicy,
    in_flight: Arc<InFlight>,
}

impl SyncClient {
    pub fn new(submitter: Arc<dyn ScoreSubmitter>, fid: i64) -> Self {
        Self {
            submitter,
            fid,
            retry: RetryPolicy::default(),
            in_flight: Arc::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn fid(&self) -> i64 {
        self.fid
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::SeqCst)
    }

    /// Waits until every spawned submission has finished, retries included.
    pub async fn flush(&self) {
        loop {
            // registered before the check so a wake between the two is not lost
            let idle = self.in_flight.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }

    /// Forwards a session score. The handle may be dropped; the task keeps running.
    pub fn forward_score(&self, score: u64, reaction_time_ms: f64) -> JoinHandle<()> {
        let submitter = Arc::clone(&self.submitter);
        let retry = self.retry;
        let request = SubmitScoreRequest {
            fid: Some(self.fid),
            score: Some(score as f64),
            time: Some(reaction_time_ms),
        };
        let guard = InFlightGuard::enter(&self.in_flight);

        tokio::spawn(async move {
            let _guard = guard;
            let result = retry
                .run("Score sync", || submitter.submit_score(&request))
                .await;
            match result {
                Ok(updated) => tracing::debug!(
                    "Score synced: fid={:?}, score={:?}, updated={}",
                    request.fid,
                    request.score,
                    updated
                ),
                Err(e) => tracing::error!("Failed to sync score: {}", e),
            }
        })
    }

    /// Pushes profile fields for this fid; `fid` on the payload is overwritten.
    pub fn sync_profile(&self, mut user: UserPayload) -> JoinHandle<()> {
        user.fid = Some(self.fid);
        let submitter = Arc::clone(&self.submitter);
        let retry = self.retry;
        let request = UserSyncRequest { user: Some(user) };
        let guard = InFlightGuard::enter(&self.in_flight);

        tokio::spawn(async move {
            let _guard = guard;
            let result = retry
                .run("Profile sync", || submitter.sync_profile(&request))
                .await;
            if let Err(e) = result {
                tracing::error!("Failed to sync user: {}", e);
            }
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records submissions; fails the first `failures` calls with a retryable error.
    #[derive(Default)]
    pub(crate) struct RecordingSubmitter {
        pub scores: Mutex<Vec<SubmitScoreRequest>>,
        pub profiles: Mutex<Vec<UserSyncRequest>>,
        pub failures: Mutex<u32>,
        pub reject: bool,
    }

    impl RecordingSubmitter {
        pub(crate) fn failing(failures: u32) -> Self {
            Self {
                failures: Mutex::new(failures),
                ..Self::default()
            }
        }

        fn take_failure(&self) -> Option<ClientError> {
            if self.reject {
                return Some(ClientError::Rejected {
                    status: 400,
                    message: "Missing data".to_string(),
                });
            }
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Some(ClientError::Rejected {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            None
        }
    }

    #[async_trait]
    impl ScoreSubmitter for RecordingSubmitter {
        async fn submit_score(&self, request: &SubmitScoreRequest) -> Result<bool, ClientError> {
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            self.scores.lock().unwrap().push(request.clone());
            Ok(true)
        }

        async fn sync_profile(&self, request: &UserSyncRequest) -> Result<(), ClientError> {
            if let Some(err) = self.take_failure() {
                return Err(err);
            }
            self.profiles.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let client = HttpLeaderboardClient::new("http://localhost:3000/api").unwrap();
        assert_eq!(
            client.endpoint("score").unwrap().as_str(),
            "http://localhost:3000/api/score"
        );
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpLeaderboardClient::new("not a url"),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn forward_score_retries_transient_failures() {
        let submitter = Arc::new(RecordingSubmitter::failing(2));
        let sync = SyncClient::new(submitter.clone(), 42).with_retry(RetryPolicy::new(3, 100));

        sync.forward_score(1980, 143.7).await.unwrap();

        let scores = submitter.scores.lock().unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].fid, Some(42));
        assert_eq!(scores[0].score, Some(1980.0));
        assert_eq!(scores[0].time, Some(143.7));
    }

    #[tokio::test(start_paused = true)]
    async fn forward_score_gives_up_quietly() {
        let submitter = Arc::new(RecordingSubmitter::failing(10));
        let sync = SyncClient::new(submitter.clone(), 42).with_retry(RetryPolicy::new(3, 100));

        sync.forward_score(500, 300.0).await.unwrap();

        assert!(submitter.scores.lock().unwrap().is_empty());
        assert_eq!(*submitter.failures.lock().unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn flush_waits_for_detached_retries() {
        let submitter = Arc::new(RecordingSubmitter::failing(2));
        let sync = SyncClient::new(submitter.clone(), 42).with_retry(RetryPolicy::new(3, 500));

        drop(sync.forward_score(700, 210.0));
        drop(sync.clone().forward_score(900, 190.0));
        assert_eq!(sync.in_flight(), 2);

        sync.flush().await;

        assert_eq!(sync.in_flight(), 0);
        assert_eq!(submitter.scores.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn flush_returns_at_once_when_idle() {
        let sync = SyncClient::new(Arc::new(RecordingSubmitter::default()), 1);
        sync.flush().await;
        assert_eq!(sync.in_flight(), 0);
    }

    #[tokio::test]
    async fn aborted_task_still_releases_its_slot() {
        let submitter = Arc::new(RecordingSubmitter::failing(u32::MAX));
        let sync = SyncClient::new(submitter, 42).with_retry(RetryPolicy::new(100, 60_000));

        let handle = sync.forward_score(10, 500.0);
        handle.abort();
        let _ = handle.await;

        assert_eq!(sync.in_flight(), 0);
        sync.flush().await;
    }

    #[tokio::test]
    async fn validation_rejection_is_not_retried() {
        let submitter = Arc::new(RecordingSubmitter {
            reject: true,
            ..RecordingSubmitter::default()
        });
        let sync = SyncClient::new(submitter.clone(), 42).with_retry(RetryPolicy::new(5, 0));

        sync.forward_score(500, 300.0).await.unwrap();
        assert!(submitter.scores.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sync_profile_stamps_own_fid() {
        let submitter = Arc::new(RecordingSubmitter::default());
        let sync = SyncClient::new(submitter.clone(), 314);
        let user = UserPayload {
            fid: Some(1),
            username: Some("pi".to_string()),
            verifications: vec!["0xABC".to_string()],
            ..UserPayload::default()
        };

        sync.sync_profile(user).await.unwrap();

        let profiles = submitter.profiles.lock().unwrap();
        let synced = profiles[0].user.as_ref().unwrap();
        assert_eq!(synced.fid, Some(314));
        assert_eq!(synced.verifications, vec!["0xABC".to_string()]);
    }
}
