use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;

use super::epoch_seconds_to_datetime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRunType {
    OneTime,
    Periodic,
}

impl JobRunType {
    pub const fn as_str(self) -> &'static str {
        match self {
            JobRunType::OneTime => "onetime",
            JobRunType::Periodic => "periodic",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "onetime" => Ok(Self::OneTime),
            "periodic" => Ok(Self::Periodic),
            _ => Err(anyhow::anyhow!("invalid job run type: {value}")),
        }
    }
}

/// A spider configured to run, independent of any particular run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInstance {
    pub id: i64,
    pub project_id: i64,
    pub spider_name: String,
    pub spider_arguments: String,
    pub priority: i64,
    pub run_type: JobRunType,
    pub created_at: DateTime<Utc>,
}

/// One concrete run, keyed by the id Scrapyd gave it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobExecution {
    pub id: i64,
    pub project_id: i64,
    pub service_job_execution_id: String,
    pub job_instance_id: i64,
    pub running_on: String,
    pub create_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct JobInstanceCreateParams {
    pub project_id: i64,
    pub spider_name: String,
    pub spider_arguments: String,
    pub priority: i64,
    pub run_type: JobRunType,
}

#[derive(Debug, Clone)]
pub struct JobExecutionCreateParams {
    pub project_id: i64,
    pub service_job_execution_id: String,
    pub running_on: String,
    pub create_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionInsertOutcome {
    Created(JobExecution),
    /// Another row already holds this remote id; nothing was written.
    AlreadyRecorded,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobInstanceRow {
    pub(crate) id: i64,
    pub(crate) project_id: i64,
    pub(crate) spider_name: String,
    pub(crate) spider_arguments: String,
    pub(crate) priority: i64,
    pub(crate) run_type: String,
    pub(crate) created_at: i64,
}

impl TryFrom<JobInstanceRow> for JobInstance {
    type Error = anyhow::Error;

    fn try_from(value: JobInstanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            project_id: value.project_id,
            spider_name: value.spider_name,
            spider_arguments: value.spider_arguments,
            priority: value.priority,
            run_type: JobRunType::parse(value.run_type.as_str())?,
            created_at: epoch_seconds_to_datetime(value.created_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobExecutionRow {
    pub(crate) id: i64,
    pub(crate) project_id: i64,
    pub(crate) service_job_execution_id: String,
    pub(crate) job_instance_id: i64,
    pub(crate) running_on: String,
    pub(crate) create_time: i64,
    pub(crate) end_time: Option<i64>,
}

impl TryFrom<JobExecutionRow> for JobExecution {
    type Error = anyhow::Error;

    fn try_from(value: JobExecutionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            project_id: value.project_id,
            service_job_execution_id: value.service_job_execution_id,
            job_instance_id: value.job_instance_id,
            running_on: value.running_on,
            create_time: epoch_seconds_to_datetime(value.create_time)?,
            end_time: value.end_time.map(epoch_seconds_to_datetime).transpose()?,
        })
    }
}
