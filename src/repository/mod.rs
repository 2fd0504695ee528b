//! Repository layer — all database access goes through Diesel async
//! queries gathered here, one module per aggregate root.

pub mod documents;
pub mod failed_pages;
pub mod jobs;
pub mod migrations;
pub mod pool;
pub mod snippets;
pub mod sources;

pub use documents::DocumentRepository;
pub use failed_pages::FailedPageRepository;
pub use jobs::JobRepository;
pub use pool::DbPool;
pub use snippets::{SearchFilters, SnippetRepository};
pub use sources::SourceRepository;

/// Bundled repository access, built once at startup and cloned into every
/// component that needs storage (HTTP state, MCP state, the crawl pipeline).
#[derive(Clone)]
pub struct Repositories {
    pub sources: SourceRepository,
    pub documents: DocumentRepository,
    pub snippets: SnippetRepository,
    pub jobs: JobRepository,
    pub failed_pages: FailedPageRepository,
    pool: DbPool,
}

impl Repositories {
    pub fn new(pool: DbPool) -> Self {
        Self {
            sources: SourceRepository::new(pool.clone()),
            documents: DocumentRepository::new(pool.clone()),
            snippets: SnippetRepository::new(pool.clone()),
            jobs: JobRepository::new(pool.clone()),
            failed_pages: FailedPageRepository::new(pool.clone()),
            pool,
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
