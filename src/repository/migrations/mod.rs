//! Forward-only schema migrations.
//!
//! Each migration is a sortable-keyed module applying one schema change.
//! The runner records every attempted migration in `schema_migrations`,
//! applies each in a transaction, and halts on the first failure unless
//! `force` is set, in which case the failing migration is recorded with
//! `skipped = true` and the runner continues. Grounded on the teacher's own
//! `migrations/m00NN_*.rs` sortable-module convention (the teacher builds
//! each migration with the `cetane` crate's portable `CreateTable`/`RunSql`
//! builders against its own sync runner); this crate targets Postgres only
//! through `diesel-async`, so migrations are plain transactional SQL run
//! through the same pool as everything else rather than a second, disjoint
//! execution path — see DESIGN.md for the `cetane` drop.

mod m0001_initial;

use diesel::sql_types::{Bool, Text};
use diesel::{QueryableByName, RunQueryDsl};
use diesel_async::RunQueryDsl as AsyncRunQueryDsl;

use crate::repository::pool::{DbError, PgConn};

/// One forward-only schema change, identified by a sortable key.
pub struct Migration {
    pub version: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
}

pub fn all() -> Vec<Migration> {
    vec![m0001_initial::migration()]
}

#[derive(QueryableByName)]
struct VersionRow {
    #[diesel(sql_type = Text)]
    version: String,
}

#[derive(QueryableByName)]
#[allow(dead_code)]
struct ExistsRow {
    #[diesel(sql_type = Bool)]
    exists: bool,
}

/// Apply every migration not yet recorded, in order. Returns the number
/// applied. When `force` is true, a migration whose SQL fails is recorded as
/// skipped instead of aborting the run.
pub async fn run(conn: &mut PgConn, force: bool) -> Result<usize, DbError> {
    diesel::sql_query(
        "CREATE TABLE IF NOT EXISTS schema_migrations (\
            version TEXT PRIMARY KEY, \
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now(), \
            skipped BOOLEAN NOT NULL DEFAULT false)",
    )
    .execute(conn)
    .await?;

    let applied: Vec<String> = diesel::sql_query("SELECT version FROM schema_migrations")
        .load::<VersionRow>(conn)
        .await?
        .into_iter()
        .map(|r| r.version)
        .collect();

    let mut count = 0;
    for migration in all() {
        if applied.iter().any(|v| v == migration.version) {
            continue;
        }

        let result: Result<(), diesel::result::Error> = conn
            .build_transaction()
            .run(|tx| {
                Box::pin(async move {
                    diesel::sql_query(migration.sql).execute(tx).await?;
                    Ok(())
                })
            })
            .await;

        match result {
            Ok(()) => {
                diesel::sql_query(
                    "INSERT INTO schema_migrations (version, skipped) VALUES ($1, false)",
                )
                .bind::<Text, _>(migration.version)
                .execute(conn)
                .await?;
                count += 1;
                tracing::info!(version = migration.version, "applied migration");
            }
            Err(e) if force => {
                tracing::warn!(
                    version = migration.version,
                    error = %e,
                    "migration failed, skipping due to --force"
                );
                diesel::sql_query(
                    "INSERT INTO schema_migrations (version, skipped) VALUES ($1, true)",
                )
                .bind::<Text, _>(migration.version)
                .execute(conn)
                .await?;
            }
            Err(e) => return Err(DbError::Diesel(e)),
        }
    }

    Ok(count)
}
