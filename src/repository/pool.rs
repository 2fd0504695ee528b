//! PostgreSQL connection pool.
//!
//! Grounded on the teacher's `repository::pool::PgPool`: a thin wrapper over
//! `diesel-async`'s deadpool-backed manager, returning a `DbError` alias so
//! callers don't need to spell out the diesel-async pool error type.

use diesel_async::pooled_connection::deadpool::{BuildError, Pool as DeadPool, PoolError};
use diesel_async::pooled_connection::AsyncDieselConnectionManager;
use diesel_async::AsyncPgConnection;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("pool build error: {0}")]
    Build(#[from] BuildError),
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),
    #[error(transparent)]
    Diesel(#[from] diesel::result::Error),
}

pub type PgConn = diesel_async::pooled_connection::deadpool::Object<AsyncPgConnection>;

#[derive(Clone)]
pub struct DbPool {
    pool: DeadPool<AsyncPgConnection>,
}

impl DbPool {
    pub fn new(database_url: &str, max_size: usize) -> Result<Self, DbError> {
        let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(database_url);
        let pool = DeadPool::builder(config).max_size(max_size).build()?;
        Ok(Self { pool })
    }

    pub async fn get(&self) -> Result<PgConn, DbError> {
        self.pool.get().await.map_err(DbError::from)
    }
}

impl From<DbError> for crate::error::CodeDoxError {
    fn from(e: DbError) -> Self {
        crate::error::CodeDoxError::Storage(e.to_string())
    }
}
