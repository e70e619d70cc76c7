use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Status string Scrapyd uses for successful responses.
pub(crate) const STATUS_OK: &str = "ok";

/// Lifecycle bucket a job is reported in by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Finished,
}

impl JobStatus {
    pub const ALL: [JobStatus; 3] = [JobStatus::Pending, JobStatus::Running, JobStatus::Finished];

    /// Key of the `listjobs.json` array holding jobs in this state.
    pub const fn bucket_name(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.bucket_name())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.bucket_name().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("invalid job status: {value}"))
    }
}

/// One job entry as reported by `listjobs.json`.
///
/// Every field is optional on the wire; ids may arrive as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawJob {
    #[serde(default, deserialize_with = "deserialize_job_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub spider: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

fn deserialize_job_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

/// Current jobs of one project, partitioned by bucket in daemon order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSnapshot {
    pub pending: Vec<RawJob>,
    pub running: Vec<RawJob>,
    pub finished: Vec<RawJob>,
}

impl JobSnapshot {
    pub fn bucket(&self, status: JobStatus) -> &[RawJob] {
        match status {
            JobStatus::Pending => &self.pending,
            JobStatus::Running => &self.running,
            JobStatus::Finished => &self.finished,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpiderDescriptor {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListProjectsResponse {
    #[serde(default)]
    pub(crate) status: Option<String>,
    #[serde(default)]
    pub(crate) message: Option<String>,
    pub(crate) projects: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListSpidersResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) spiders: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListJobsResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) pending: Vec<RawJob>,
    #[serde(default)]
    pub(crate) running: Vec<RawJob>,
    #[serde(default)]
    pub(crate) finished: Vec<RawJob>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScheduleResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default)]
    pub(crate) jobid: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) message: Option<String>,
}
