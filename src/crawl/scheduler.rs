//! Cross-job concurrency ceiling plus the cancellation-token registry the
//! Job Manager uses to stop a running job.
//!
//! Grounded on the teacher's `work_queue::runner::Runner`, which gates a
//! global `tokio::sync::Semaphore` around each spawned document job; here
//! the gated unit is a whole crawl job rather than one document, since a
//! job's own `max_concurrent_crawls` already governs its internal workers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::crawl::pipeline::{self, CancelToken, PipelineDeps};

/// Owns the global concurrency permit pool and the live `CancelToken` for
/// every job currently running in this process. Constructed once at
/// startup and shared (via `Arc`) with the Job Manager and the HTTP/MCP
/// surfaces that need to issue cancellation.
pub struct CrawlScheduler {
    semaphore: Arc<Semaphore>,
    tokens: Mutex<HashMap<Uuid, CancelToken>>,
    deps: PipelineDeps,
}

impl CrawlScheduler {
    pub fn new(max_concurrent_sessions: u32, deps: PipelineDeps) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent_sessions.max(1) as usize)),
            tokens: Mutex::new(HashMap::new()),
            deps,
        }
    }

    /// Start running `job_id` in the background. Blocks only long enough to
    /// register the cancellation token and acquire a global permit; the
    /// crawl itself runs on a spawned task so the caller (a Job Manager
    /// `start`/`resume` call) returns immediately.
    pub async fn spawn_job(self: &Arc<Self>, job_id: Uuid) {
        let cancel = CancelToken::new();
        self.tokens.lock().await.insert(job_id, cancel.clone());

        let scheduler = Arc::clone(self);
        let deps = self.deps.clone();
        tokio::spawn(async move {
            let permit = scheduler.semaphore.clone().acquire_owned().await;
            let Ok(_permit) = permit else { return };
            pipeline::run(job_id, deps, cancel).await;
            scheduler.tokens.lock().await.remove(&job_id);
        });
    }

    /// Signal cancellation to a running job's workers. Idempotent and a
    /// no-op if the job already finished (its token will have been removed).
    /// Returns whether a live job was found to cancel.
    pub async fn cancel_job(&self, job_id: Uuid) -> bool {
        if let Some(token) = self.tokens.lock().await.get(&job_id) {
            token.cancel();
            true
        } else {
            false
        }
    }

    pub async fn is_running(&self, job_id: Uuid) -> bool {
        self.tokens.lock().await.contains_key(&job_id)
    }

    /// Wait briefly for a cancelled job to actually stop its workers and
    /// deregister, bounded by the configured drain timeout. Used by
    /// `cancel_job` callers (the Job Manager) that want to report back
    /// whether the drain completed in time, not just that it was requested.
    pub async fn wait_for_drain(&self, job_id: Uuid, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if !self.is_running(job_id).await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        !self.is_running(job_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::NullAnnotator;
    use crate::progress::ProgressBroker;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct NeverRespondingFetcher(Arc<AtomicBool>);

    #[async_trait::async_trait]
    impl crate::crawl::fetcher::PageFetcher for NeverRespondingFetcher {
        async fn fetch(&self, _url: &str) -> crate::error::Result<crate::crawl::fetcher::FetchedPage> {
            self.0.store(true, Ordering::SeqCst);
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn cancel_job_without_a_running_job_returns_false() {
        // `DbPool::new` builds a lazy deadpool that only connects on first
        // `.get()`, so an unreachable URL is fine for exercising the
        // scheduler's own bookkeeping without a live database.
        let pool = crate::repository::pool::DbPool::new("postgres://localhost/codedox_test", 1)
            .expect("pool config should build without connecting");
        let fetch_started = Arc::new(AtomicBool::new(false));
        let deps = PipelineDeps {
            repos: crate::repository::Repositories::new(pool),
            fetcher: Arc::new(NeverRespondingFetcher(fetch_started)),
            annotator: Arc::new(NullAnnotator),
            progress: Arc::new(ProgressBroker::new()),
            annotator_batch_size: 5,
            annotator_num_parallel: 2,
            heartbeat_interval: Duration::from_secs(30),
        };
        let scheduler = Arc::new(CrawlScheduler::new(5, deps));
        assert!(!scheduler.cancel_job(Uuid::new_v4()).await);
    }
}
