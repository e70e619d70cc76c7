mod job;
mod project;

use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;

pub use job::ExecutionInsertOutcome;
pub use job::JobExecution;
pub use job::JobExecutionCreateParams;
pub use job::JobInstance;
pub use job::JobInstanceCreateParams;
pub use job::JobRunType;
pub use project::Project;

pub(crate) use job::JobExecutionRow;
pub(crate) use job::JobInstanceRow;
pub(crate) use project::ProjectRow;

pub(crate) fn epoch_seconds_to_datetime(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .ok_or_else(|| anyhow::anyhow!("invalid unix timestamp: {secs}"))
}

pub(crate) fn datetime_to_epoch_seconds(dt: DateTime<Utc>) -> i64 {
    dt.timestamp()
}
