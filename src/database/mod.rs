use std::path::Path;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

pub mod account_db;
pub mod session_db;

/// Open the SQLite store at `store_path`, creating the file on first start,
/// and bring the schema up to date. The pool is handed to callers explicitly;
/// there is no ambient global.
pub async fn connect(store_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let opts = SqliteConnectOptions::new()
        .filename(store_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    sqlx::migrate!().run(&pool).await?;

    tracing::info!("[db] Connected to store at {}", store_path.display());
    Ok(pool)
}

/// In-memory store for tests. A single connection, so every query sees the
/// same database.
#[cfg(test)]
pub(crate) async fn connect_in_memory() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!().run(&pool).await.expect("migrations");
    pool
}
