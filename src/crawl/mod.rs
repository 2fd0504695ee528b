//! Crawl Pipeline: fetches pages concurrently, extracts code blocks, and
//! persists Documents/Snippets through the repository layer.
//!
//! `fetcher` and `filters` are pure collaborators; `pipeline` and
//! `scheduler` compose them with the Job Manager. Grounded on the teacher's
//! `work_queue` module (`foia::work_queue::{pipeline, runner}`) for the
//! worker-pool-over-a-shared-queue shape, adapted from a FOIA document
//! work queue to a URL frontier.

pub mod fetcher;
pub mod filters;
pub mod pipeline;
pub mod queue;
pub mod scheduler;

pub use fetcher::{FetchedPage, PageFetcher, ReqwestPageFetcher};
pub use scheduler::CrawlScheduler;
