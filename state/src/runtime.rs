use crate::STATE_DB_FILENAME;
use crate::migrations::MIGRATOR;
use crate::model::datetime_to_epoch_seconds;
use chrono::Utc;
use log::LevelFilter;
use sqlx::ConnectOptions;
use sqlx::SqlitePool;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqliteJournalMode;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::sqlite::SqliteSynchronous;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing::warn;

mod executions;
mod projects;
#[cfg(test)]
mod test_support;

#[derive(Clone)]
pub struct StateRuntime {
    keeper_home: PathBuf,
    pool: Arc<sqlx::SqlitePool>,
}

impl StateRuntime {
    /// Initialize the state runtime rooted at `keeper_home`.
    ///
    /// This opens the SQLite database at `keeper_home/state.sqlite` and applies
    /// any pending migrations. Existing history is always kept.
    pub async fn init(keeper_home: PathBuf) -> anyhow::Result<Arc<Self>> {
        tokio::fs::create_dir_all(&keeper_home).await?;
        let state_path = state_db_path(keeper_home.as_path());
        let existed = tokio::fs::try_exists(&state_path).await.unwrap_or(false);
        let pool = match open_sqlite(&state_path).await {
            Ok(db) => Arc::new(db),
            Err(err) => {
                warn!("failed to open state db at {}: {err}", state_path.display());
                return Err(err);
            }
        };
        if !existed {
            info!(path = %state_path.display(), "created state db");
        }
        Ok(Arc::new(Self { keeper_home, pool }))
    }

    /// Return the home directory this runtime was opened under.
    pub fn keeper_home(&self) -> &Path {
        self.keeper_home.as_path()
    }
}

pub(crate) fn now_epoch_seconds() -> i64 {
    datetime_to_epoch_seconds(Utc::now())
}

async fn open_sqlite(path: &Path) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5))
        .log_statements(LevelFilter::Off);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

pub fn state_db_path(keeper_home: &Path) -> PathBuf {
    keeper_home.join(STATE_DB_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::StateRuntime;
    use super::state_db_path;
    use super::test_support::unique_temp_dir;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn reopening_keeps_recorded_history() {
        let keeper_home = unique_temp_dir();
        let runtime = StateRuntime::init(keeper_home.clone())
            .await
            .expect("initialize runtime");
        assert_eq!(runtime.keeper_home(), keeper_home.as_path());
        let news = runtime.ensure_project("news").await.expect("create news");
        drop(runtime);

        // Files that merely look like databases are not ours to remove.
        let neighbour = keeper_home.join("state_0.sqlite");
        tokio::fs::write(&neighbour, b"not ours")
            .await
            .expect("write neighbour");

        let reopened = StateRuntime::init(keeper_home.clone())
            .await
            .expect("reopen runtime");
        assert_eq!(
            reopened
                .get_project_by_name("news")
                .await
                .expect("lookup news"),
            Some(news)
        );
        assert_eq!(
            tokio::fs::try_exists(state_db_path(&keeper_home))
                .await
                .expect("check db path"),
            true
        );
        assert_eq!(
            tokio::fs::try_exists(&neighbour)
                .await
                .expect("check neighbour"),
            true
        );

        let _ = tokio::fs::remove_dir_all(keeper_home).await;
    }
}
