//! Reconciliation of remote Scrapyd job state with the local execution log.
//!
//! [`Reconciler::list_jobs`] fetches a project's snapshot, records every job it
//! has not seen before and returns a status-partitioned view. The view is
//! always computed from the current remote records; stored rows are never read
//! back to build it.

use std::sync::Arc;

use anyhow::Context;
use chrono::DateTime;
use chrono::Utc;
use keeper_scrapyd_client::JobSource;
use keeper_scrapyd_client::JobStatus;
use keeper_scrapyd_client::RawJob;
use keeper_state::ExecutionInsertOutcome;
use keeper_state::JobExecution;
use keeper_state::JobExecutionCreateParams;
use keeper_state::JobInstanceCreateParams;
use keeper_state::JobRunType;
use keeper_state::Project;
use keeper_state::StateRuntime;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::timestamp::TimestampField;
use crate::timestamp::normalize;
use crate::timestamp::parse;

/// Spider name recorded when the daemon omits one.
pub const UNKNOWN_SPIDER: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializeOutcome {
    Created(JobExecution),
    /// The remote id is already recorded; nothing was written.
    AlreadyRecorded,
    /// The record carries no remote id and cannot be tracked.
    Skipped,
}

/// One job as shown to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub id: Option<String>,
    pub spider: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl JobView {
    fn from_raw(job: &RawJob, now: DateTime<Utc>) -> Self {
        Self {
            id: job.id.clone(),
            spider: job.spider.clone(),
            start_time: normalize(job, TimestampField::StartTime, now),
            end_time: parse(job, TimestampField::EndTime),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusBuckets {
    pub pending: Vec<JobView>,
    pub running: Vec<JobView>,
    pub finished: Vec<JobView>,
}

impl StatusBuckets {
    pub fn bucket(&self, status: JobStatus) -> &[JobView] {
        match status {
            JobStatus::Pending => &self.pending,
            JobStatus::Running => &self.running,
            JobStatus::Finished => &self.finished,
        }
    }

    fn bucket_mut(&mut self, status: JobStatus) -> &mut Vec<JobView> {
        match status {
            JobStatus::Pending => &mut self.pending,
            JobStatus::Running => &mut self.running,
            JobStatus::Finished => &mut self.finished,
        }
    }

    fn into_bucket(self, status: JobStatus) -> Vec<JobView> {
        match status {
            JobStatus::Pending => self.pending,
            JobStatus::Running => self.running,
            JobStatus::Finished => self.finished,
        }
    }
}

/// Whether the listing reflects a successful remote fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Freshness {
    Live,
    /// The daemon could not be queried; the buckets are empty placeholders.
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ListedJobs {
    All(StatusBuckets),
    Single { status: JobStatus, jobs: Vec<JobView> },
}

impl ListedJobs {
    fn select(buckets: StatusBuckets, filter: Option<JobStatus>) -> Self {
        match filter {
            Some(status) => ListedJobs::Single {
                status,
                jobs: buckets.into_bucket(status),
            },
            None => ListedJobs::All(buckets),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobListing {
    pub freshness: Freshness,
    pub jobs: ListedJobs,
    /// Executions recorded for the first time while building this listing.
    #[serde(skip)]
    pub created: usize,
}

impl JobListing {
    pub fn is_live(&self) -> bool {
        matches!(self.freshness, Freshness::Live)
    }
}

/// Reconciles one job source against the local store.
#[derive(Clone)]
pub struct Reconciler {
    state: Arc<StateRuntime>,
    source: Arc<dyn JobSource>,
}

impl Reconciler {
    pub fn new(state: Arc<StateRuntime>, source: Arc<dyn JobSource>) -> Self {
        Self { state, source }
    }

    pub fn state(&self) -> &Arc<StateRuntime> {
        &self.state
    }

    /// Whether an execution with this remote id has already been recorded.
    pub async fn has_execution(&self, service_job_execution_id: &str) -> anyhow::Result<bool> {
        self.state.has_execution(service_job_execution_id).await
    }

    /// Record `job` unless its remote id is already known.
    pub async fn materialize(
        &self,
        job: &RawJob,
        project_id: i64,
        running_on: &str,
    ) -> anyhow::Result<MaterializeOutcome> {
        self.materialize_at(job, project_id, running_on, Utc::now())
            .await
    }

    async fn materialize_at(
        &self,
        job: &RawJob,
        project_id: i64,
        running_on: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<MaterializeOutcome> {
        let Some(service_id) = job.id.as_deref() else {
            debug!(project_id, spider = ?job.spider, "skipping job without an id");
            return Ok(MaterializeOutcome::Skipped);
        };
        if self.has_execution(service_id).await? {
            return Ok(MaterializeOutcome::AlreadyRecorded);
        }

        let spider_name = job.spider.as_deref().unwrap_or(UNKNOWN_SPIDER);
        let instance = JobInstanceCreateParams {
            project_id,
            spider_name: spider_name.to_string(),
            spider_arguments: String::new(),
            priority: 0,
            run_type: JobRunType::OneTime,
        };
        let execution = JobExecutionCreateParams {
            project_id,
            service_job_execution_id: service_id.to_string(),
            running_on: running_on.to_string(),
            create_time: normalize(job, TimestampField::StartTime, now),
            end_time: parse(job, TimestampField::EndTime),
        };
        let outcome = self
            .state
            .create_execution(&instance, &execution)
            .await
            .with_context(|| format!("failed to record execution {service_id}"))?;
        Ok(match outcome {
            ExecutionInsertOutcome::Created(created) => {
                info!(
                    project_id,
                    job_id = service_id,
                    spider = spider_name,
                    "recorded new execution"
                );
                MaterializeOutcome::Created(created)
            }
            ExecutionInsertOutcome::AlreadyRecorded => MaterializeOutcome::AlreadyRecorded,
        })
    }

    /// Fetch the remote snapshot for `project`, record new executions and
    /// return the jobs grouped by status.
    ///
    /// Remote failures do not surface as errors: the listing comes back empty
    /// and marked [`Freshness::Unavailable`]. Storage failures do.
    pub async fn list_jobs(
        &self,
        project: &Project,
        filter: Option<JobStatus>,
    ) -> anyhow::Result<JobListing> {
        let snapshot = match self.source.list_jobs(&project.name).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(
                    project = %project.name,
                    endpoint = self.source.endpoint(),
                    "job listing unavailable: {err}"
                );
                return Ok(JobListing {
                    freshness: Freshness::Unavailable {
                        reason: err.to_string(),
                    },
                    jobs: ListedJobs::select(StatusBuckets::default(), filter),
                    created: 0,
                });
            }
        };

        let running_on = self.source.endpoint().to_string();
        let now = Utc::now();
        let mut buckets = StatusBuckets::default();
        let mut created = 0;
        for status in JobStatus::ALL {
            for job in snapshot.bucket(status) {
                let outcome = self
                    .materialize_at(job, project.id, &running_on, now)
                    .await?;
                if matches!(outcome, MaterializeOutcome::Created(_)) {
                    created += 1;
                }
                buckets.bucket_mut(status).push(JobView::from_raw(job, now));
            }
        }

        Ok(JobListing {
            freshness: Freshness::Live,
            jobs: ListedJobs::select(buckets, filter),
            created,
        })
    }
}
