//! Wires the config, storage pool, and every component (Job Manager, crawl
//! scheduler, search service, progress broker) into one context shared by
//! the CLI, the HTTP server, and the MCP surface.
//!
//! Grounded on the teacher's `AppState::new(settings)` constructor
//! (`src/server/mod.rs`), generalized from "one web server's state" to "the
//! one process-wide context every entry point builds the same way".

use std::sync::Arc;
use std::time::Duration;

use crate::annotate::{CodeAnnotator, NullAnnotator, OpenAiAnnotator};
use crate::config::Config;
use crate::crawl::fetcher::ReqwestPageFetcher;
use crate::crawl::pipeline::PipelineDeps;
use crate::crawl::scheduler::CrawlScheduler;
use crate::error::Result;
use crate::jobs::JobManager;
use crate::progress::ProgressBroker;
use crate::repository::{DbPool, Repositories};
use crate::search::SearchService;

/// Periodic progress tick emitted by the pipeline even while idle-waiting
/// on I/O, per the crawl algorithm's heartbeat requirement.
const PIPELINE_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// Polite inter-request delay the `ReqwestPageFetcher` applies per host.
const FETCHER_REQUEST_DELAY: Duration = Duration::from_millis(250);
/// Connection pool size; one job's workers plus handler traffic share it.
const DB_POOL_SIZE: usize = 16;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub repos: Repositories,
    pub job_manager: Arc<JobManager>,
    pub scheduler: Arc<CrawlScheduler>,
    pub search: SearchService,
    pub progress: Arc<ProgressBroker>,
    /// Shared with the crawl pipeline's `PipelineDeps`, so upload ingestion
    /// and regenerate use the exact same annotator the crawl path does.
    pub annotator: Arc<dyn CodeAnnotator>,
}

impl AppContext {
    /// Build every long-lived component from `config`. Does not run
    /// migrations; callers that need schema present (anything but `init`)
    /// should have already called `crate::repository::migrations::run`.
    pub fn bootstrap(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let pool = DbPool::new(&config.database_url, DB_POOL_SIZE)?;
        let repos = Repositories::new(pool);
        let progress = Arc::new(ProgressBroker::new());

        let fetcher = Arc::new(ReqwestPageFetcher::new(
            &config.user_agent,
            FETCHER_REQUEST_DELAY,
            config.content_size_limit,
        )?);
        let annotator = build_annotator(&config)?;

        let deps = PipelineDeps {
            repos: repos.clone(),
            fetcher,
            annotator: Arc::clone(&annotator),
            progress: Arc::clone(&progress),
            annotator_batch_size: crate::config::DEFAULT_ANNOTATOR_BATCH_SIZE,
            annotator_num_parallel: config.llm_num_parallel,
            heartbeat_interval: PIPELINE_HEARTBEAT_INTERVAL,
        };
        let scheduler = Arc::new(CrawlScheduler::new(config.max_concurrent_sessions, deps));
        let job_manager = Arc::new(JobManager::new(repos.clone(), Arc::clone(&scheduler), &config));
        let search = SearchService::new(repos.clone(), &config);

        Ok(Self {
            config,
            repos,
            job_manager,
            scheduler,
            search,
            progress,
            annotator,
        })
    }
}

/// `NullAnnotator` when no LLM base URL is configured, matching the "still
/// persists the block" rule for a missing/unreachable annotator.
fn build_annotator(config: &Config) -> Result<Arc<dyn CodeAnnotator>> {
    match &config.llm_base_url {
        Some(base_url) => {
            let annotator = OpenAiAnnotator::new(base_url, config.llm_api_key.clone(), &config.llm_model)?;
            Ok(Arc::new(annotator))
        }
        None => Ok(Arc::new(NullAnnotator)),
    }
}
