use std::sync::Arc;
use std::time::Duration;

use quiz_core::Clock;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{AttemptStore, QuizDefinitionRepository, Storage};

mod attempt_repo;
mod mapping;
mod migrate;
mod quiz_repo;

pub use attempt_repo::AttemptRecord;

const MAX_CONNECTIONS: u32 = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Questions and attempts reference quizzes; writers wait on the busy timeout.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// Local SQLite backend for quizzes and attempts.
///
/// Deadlines are stamped with `clock` when an attempt opens, so a resumed
/// attempt reports only the time it has left.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
    clock: Clock,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Opens the attempt database at `database_url` using the system clock.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` when the database cannot be opened or a
    /// connection rejects the pragmas.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::Executor::execute(&mut *conn, sqlx::raw_sql(CONNECTION_PRAGMAS)).await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self {
            pool,
            clock: Clock::system(),
        })
    }

    /// Replaces the clock used for deadlines and submission timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Creates the quiz and attempt tables on first use.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if a schema statement fails.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        Ok(Self::from_sqlite(&repo))
    }

    /// Build a `Storage` around an already connected repository.
    #[must_use]
    pub fn from_sqlite(repo: &SqliteRepository) -> Self {
        let attempts: Arc<dyn AttemptStore> = Arc::new(repo.clone());
        let quizzes: Arc<dyn QuizDefinitionRepository> = Arc::new(repo.clone());
        Self { attempts, quizzes }
    }
}
