//! The per-job crawl algorithm: workers pull from a shared `WorkQueue`,
//! fetch, skip-on-unchanged, extract, annotate, and persist, until the
//! frontier is exhausted, the job is cancelled, or `max_pages` is hit.
//!
//! Grounded on the teacher's `work_queue::runner` worker-pool shape
//! (`tokio::spawn` per slot pulling from one shared queue, a
//! `JoinSet`-style wait for completion) generalized from the teacher's fixed
//! document batch to an open-ended, depth-bounded URL frontier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::annotate::{annotate_all, CodeAnnotator};
use crate::crawl::fetcher::{normalize_html, PageFetcher};
use crate::crawl::filters::AdmissionFilter;
use crate::crawl::queue::WorkQueue;
use crate::error::Result;
use crate::extract::ExtractorKind;
use crate::models::{CodeSnippet, Document, JobPhase, JobStatus, SourceKind};
use crate::progress::{ProgressBroker, ProgressEvent, Topic};
use crate::repository::documents::UpsertOutcome;
use crate::repository::Repositories;

/// Cooperative cancellation flag shared between the scheduler and every
/// worker of one job. Plain `AtomicBool` rather than a channel: workers only
/// ever need to observe it, never wait on it.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Collaborators a running job needs, bundled so `CrawlScheduler` can
/// construct one set at startup and hand out clones per job.
#[derive(Clone)]
pub struct PipelineDeps {
    pub repos: Repositories,
    pub fetcher: Arc<dyn PageFetcher>,
    pub annotator: Arc<dyn CodeAnnotator>,
    pub progress: Arc<ProgressBroker>,
    pub annotator_batch_size: usize,
    pub annotator_num_parallel: usize,
    pub heartbeat_interval: Duration,
}

/// Run one crawl job to completion, driving its lifecycle transitions and
/// persisting documents/snippets as pages are processed. The job must
/// already be in `running` status with a valid `version` when this is
/// called; the caller (the Job Manager, via `CrawlScheduler`) owns the
/// pending -> running transition.
pub async fn run(job_id: Uuid, deps: PipelineDeps, cancel: CancelToken) {
    if let Err(e) = run_inner(job_id, deps.clone(), cancel).await {
        tracing::error!(job_id = %job_id, error = %e, "crawl job ended with an internal error");
        let _ = fail_job(&deps, job_id, &e.to_string()).await;
        deps.progress.publish(
            Topic::Job(job_id),
            ProgressEvent::Error { job_id, message: e.to_string() },
        );
    }
}

async fn run_inner(job_id: Uuid, deps: PipelineDeps, cancel: CancelToken) -> Result<()> {
    let job = deps.repos.jobs.get(job_id).await?;

    let filter = AdmissionFilter::new(
        job.domain_filter.clone(),
        &job.include_patterns,
        &job.exclude_patterns,
    )?;
    let queue = Arc::new(WorkQueue::new(initial_frontier(&deps, &job).await?));

    let filter = Arc::new(filter);
    let worker_count = job.max_concurrent_crawls.max(1) as usize;
    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let queue = Arc::clone(&queue);
        let deps = deps.clone();
        let cancel = cancel.clone();
        let filter = Arc::clone(&filter);
        workers.push(tokio::spawn(worker_loop(
            job_id,
            job.max_depth,
            job.max_pages,
            queue,
            deps,
            cancel,
            filter,
        )));
    }

    let heartbeat_interval = deps.heartbeat_interval;
    let heartbeat = tokio::spawn(heartbeat_loop(job_id, deps.clone(), cancel.clone(), heartbeat_interval));

    for worker in workers {
        let _ = worker.await;
    }
    heartbeat.abort();

    finalize_job(&deps, job_id, &cancel).await
}

/// Keeps `heartbeat_at` fresh independent of page throughput, so a job
/// fetching one very slow page still reads as alive rather than stalled.
/// Stops as soon as cancellation is observed or the job finishes (the
/// caller aborts this task once every worker has returned).
async fn heartbeat_loop(job_id: Uuid, deps: PipelineDeps, cancel: CancelToken, interval: Duration) {
    loop {
        tokio::time::sleep(interval).await;
        if cancel.is_cancelled() {
            return;
        }
        let _ = deps.repos.jobs.heartbeat(job_id).await;
    }
}

/// Resolve the set of URLs this run should (re)crawl: the job's configured
/// `start_urls` on a fresh run, or on a resumed run, `start_urls` plus every
/// URL that failed on the immediately preceding retry generation (URLs that
/// already succeeded are not retried; the full discovered-link frontier
/// beyond `start_urls` isn't persisted, so resume can't replay deeper pages
/// that were only reachable via links from a page that did succeed).
async fn initial_frontier(deps: &PipelineDeps, job: &crate::models::CrawlJob) -> Result<Vec<String>> {
    let mut urls = job.start_urls.clone();
    if job.retry_generation > 0 {
        let previous_failures = deps
            .repos
            .failed_pages
            .urls_failed_at_generation(job.id, job.retry_generation - 1)
            .await?;
        urls.extend(previous_failures);
    }
    Ok(urls)
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    job_id: Uuid,
    max_depth: i32,
    max_pages: Option<i32>,
    queue: Arc<WorkQueue>,
    deps: PipelineDeps,
    cancel: CancelToken,
    filter: Arc<AdmissionFilter>,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let Some((url, depth)) = queue.pop().await else {
            if queue.is_exhausted().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        };

        if !queue.admit_page(max_pages) {
            queue.mark_done();
            return;
        }

        process_page(job_id, &url, depth, max_depth, &queue, &deps, &filter).await;
        queue.mark_done();
    }
}

async fn process_page(
    job_id: Uuid,
    url: &str,
    depth: i32,
    max_depth: i32,
    queue: &WorkQueue,
    deps: &PipelineDeps,
    filter: &AdmissionFilter,
) {
    let page = match deps.fetcher.fetch(url).await {
        Ok(page) => page,
        Err(e) => {
            record_failure(deps, job_id, url, &e.to_string()).await;
            return;
        }
    };

    let normalized = normalize_html(&page.html);
    let content_hash = Document::compute_content_hash(&normalized);

    let source_id = match ensure_source(deps, job_id).await {
        Ok(id) => id,
        Err(e) => {
            record_failure(deps, job_id, url, &e.to_string()).await;
            return;
        }
    };

    let title = page_title(&page.html).unwrap_or_else(|| url.to_string());

    let outcome = match deps
        .repos
        .documents
        .upsert(source_id, url, &title, depth, &content_hash, Some(&normalized))
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            record_failure(deps, job_id, url, &e.to_string()).await;
            return;
        }
    };

    let (crawled_delta, skipped_delta, snippets_delta) = match outcome {
        UpsertOutcome::Unchanged(doc) => {
            let count = deps.repos.snippets.count_by_document(doc.id).await.unwrap_or(0);
            (0i64, 1i64, count)
        }
        UpsertOutcome::Changed(doc) => match extract_and_store(deps, &doc, &page.html, url).await {
            Ok(count) => (1i64, 0i64, count),
            Err(e) => {
                record_failure(deps, job_id, url, &e.to_string()).await;
                return;
            }
        },
    };

    let _ = deps
        .repos
        .jobs
        .accumulate_counters(job_id, crawled_delta, skipped_delta, snippets_delta, 0)
        .await;

    if depth < max_depth {
        for link in &page.links {
            if filter.admits(link) {
                queue.enqueue_child(link.clone(), depth).await;
            }
        }
    }

    if let Ok(job) = deps.repos.jobs.get(job_id).await {
        deps.progress.publish(
            Topic::Job(job_id),
            ProgressEvent::CrawlProgress {
                job_id,
                pages_crawled: job.pages_crawled,
                pages_skipped_unchanged: job.pages_skipped_unchanged,
                snippets_extracted: job.snippets_extracted,
                failed_pages: job.failed_pages,
                current_url: Some(url.to_string()),
            },
        );
    }
}

async fn extract_and_store(
    deps: &PipelineDeps,
    doc: &Document,
    html: &str,
    url: &str,
) -> Result<i64> {
    let kind = ExtractorKind::detect(Some("text/html"), url);
    let blocks = kind.extract(html, Some(url));
    let annotated = annotate_all(
        Arc::clone(&deps.annotator),
        blocks,
        deps.annotator_batch_size,
        deps.annotator_num_parallel,
    )
    .await;

    let now = chrono::Utc::now();
    let snippets: Vec<CodeSnippet> = annotated
        .iter()
        .map(|b| CodeSnippet::from_block(Uuid::new_v4(), doc.id, b, now))
        .collect();

    let stored = deps.repos.snippets.replace_for_document(doc.id, &snippets).await?;
    Ok(stored as i64)
}

async fn ensure_source(deps: &PipelineDeps, job_id: Uuid) -> Result<Uuid> {
    let job = deps.repos.jobs.get(job_id).await?;
    if let Some(source_id) = job.source_id {
        return Ok(source_id);
    }
    let source = deps
        .repos
        .sources
        .get_or_create(&job.name, None, job.start_urls.first().map(String::as_str), SourceKind::Crawl)
        .await?;
    deps.repos.jobs.attach_source(job_id, source.id).await?;
    Ok(source.id)
}

async fn record_failure(deps: &PipelineDeps, job_id: Uuid, url: &str, message: &str) {
    let job = match deps.repos.jobs.get(job_id).await {
        Ok(job) => job,
        Err(_) => return,
    };
    let _ = deps
        .repos
        .failed_pages
        .insert(job_id, url, message, job.retry_generation)
        .await;
    let _ = deps.repos.jobs.accumulate_counters(job_id, 0, 0, 0, 1).await;
    tracing::warn!(job_id = %job_id, url, error = message, "page failed");
}

async fn fail_job(deps: &PipelineDeps, job_id: Uuid, message: &str) -> Result<()> {
    let job = deps.repos.jobs.get(job_id).await?;
    deps.repos
        .jobs
        .transition(
            job_id,
            job.version,
            JobStatus::Failed,
            Some(JobPhase::Finalizing),
            Some(message.to_string()),
            None,
            Some(chrono::Utc::now()),
        )
        .await?;
    Ok(())
}

/// Decide and apply the job's terminal status once every worker has
/// returned: `cancelled` if cancellation was requested, `failed` if not a
/// single page was ingested and at least one failed, `completed` otherwise.
async fn finalize_job(deps: &PipelineDeps, job_id: Uuid, cancel: &CancelToken) -> Result<()> {
    let job = deps.repos.jobs.get(job_id).await?;

    let status = if cancel.is_cancelled() {
        JobStatus::Cancelled
    } else if job.pages_crawled == 0 && job.failed_pages > 0 {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    };

    let error_message = if status == JobStatus::Failed {
        Some("every start URL failed".to_string())
    } else {
        None
    };

    deps.repos
        .jobs
        .transition(
            job_id,
            job.version,
            status,
            Some(JobPhase::Finalizing),
            error_message,
            None,
            Some(chrono::Utc::now()),
        )
        .await?;

    deps.progress.publish(
        Topic::Job(job_id),
        ProgressEvent::Completed { job_id, status: status.as_str() },
    );
    Ok(())
}

fn page_title(html: &str) -> Option<String> {
    use scraper::{Html, Selector};
    let document = Html::parse_document(html);
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}
