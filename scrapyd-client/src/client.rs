use crate::error::ScrapydError;
use crate::types::JobSnapshot;
use crate::types::ListJobsResponse;
use crate::types::ListProjectsResponse;
use crate::types::ListSpidersResponse;
use crate::types::STATUS_OK;
use crate::types::ScheduleResponse;
use crate::types::SpiderDescriptor;
use crate::types::StatusResponse;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;
use tracing::Level;
use tracing::debug;
use tracing::enabled;
use tracing::trace;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_USER_AGENT: &str = "keeper";

/// Where the reconciler reads live job state from.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Address jobs reported by this source run on.
    fn endpoint(&self) -> &str;

    async fn list_jobs(&self, project: &str) -> Result<JobSnapshot, ScrapydError>;
}

#[derive(Clone, Debug)]
pub struct ScrapydClient {
    base_url: String,
    http: reqwest::Client,
}

impl ScrapydClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ScrapydError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ScrapydError> {
        let mut base_url = base_url.into();
        // Trim trailing slashes for consistent URL building.
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|err| ScrapydError::Build(err.to_string()))?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{endpoint}", self.base_url)
    }

    async fn exec_request(
        &self,
        req: reqwest::RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<String, ScrapydError> {
        let (_, body) = self.send_request(req, method, url).await?;
        Ok(body)
    }

    /// Send `req` and return the success status with the body text.
    async fn send_request(
        &self,
        req: reqwest::RequestBuilder,
        method: &str,
        url: &str,
    ) -> Result<(StatusCode, String), ScrapydError> {
        if enabled!(Level::TRACE) {
            trace!("{method} {url}");
        }
        let res = req
            .send()
            .await
            .map_err(map_error)?;
        let status = res.status();
        let ct = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = res.text().await.map_err(map_error)?;
        debug!(%status, content_type = %ct, "{method} {url}");
        if !status.is_success() {
            return Err(ScrapydError::Http {
                status,
                url: url.to_string(),
                body: Some(body),
            });
        }
        Ok((status, body))
    }

    fn decode_json<T: DeserializeOwned>(&self, url: &str, body: &str) -> Result<T, ScrapydError> {
        serde_json::from_str::<T>(body).map_err(|source| ScrapydError::Decode {
            url: url.to_string(),
            source,
        })
    }

    /// `GET /listprojects.json`
    pub async fn list_projects(&self) -> Result<Vec<String>, ScrapydError> {
        let url = self.url("listprojects.json");
        let req = self.http.get(&url);
        let body = self.exec_request(req, "GET", &url).await?;
        let payload: ListProjectsResponse = self.decode_json(&url, &body)?;
        if let Some(status) = payload.status.as_deref() {
            ensure_ok(&url, status, payload.message)?;
        }
        Ok(payload.projects)
    }

    /// `GET /listspiders.json?project=P`
    pub async fn list_spiders(&self, project: &str) -> Result<Vec<SpiderDescriptor>, ScrapydError> {
        let url = self.url("listspiders.json");
        let req = self.http.get(&url).query(&[("project", project)]);
        let body = self.exec_request(req, "GET", &url).await?;
        let payload: ListSpidersResponse = self.decode_json(&url, &body)?;
        ensure_ok(&url, &payload.status, payload.message)?;
        Ok(payload
            .spiders
            .into_iter()
            .map(|name| SpiderDescriptor { name })
            .collect())
    }

    /// `GET /listjobs.json?project=P`
    pub async fn list_jobs(&self, project: &str) -> Result<JobSnapshot, ScrapydError> {
        let url = self.url("listjobs.json");
        let req = self.http.get(&url).query(&[("project", project)]);
        let body = self.exec_request(req, "GET", &url).await?;
        let payload: ListJobsResponse = self.decode_json(&url, &body)?;
        ensure_ok(&url, &payload.status, payload.message)?;
        Ok(JobSnapshot {
            pending: payload.pending,
            running: payload.running,
            finished: payload.finished,
        })
    }

    /// Schedule a spider run and return the job id the daemon assigned.
    ///
    /// `arguments` are passed through as extra form fields (spider arguments
    /// and Scrapy settings alike).
    pub async fn schedule(
        &self,
        project: &str,
        spider: &str,
        arguments: &[(String, String)],
    ) -> Result<String, ScrapydError> {
        let url = self.url("schedule.json");
        let mut form: Vec<(&str, &str)> = vec![("project", project), ("spider", spider)];
        form.extend(
            arguments
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );
        let req = self.http.post(&url).form(&form);
        let body = self.exec_request(req, "POST", &url).await?;
        let payload: ScheduleResponse = self.decode_json(&url, &body)?;
        ensure_ok(&url, &payload.status, payload.message)?;
        payload.jobid.ok_or_else(|| ScrapydError::Rejected {
            url,
            status: payload.status,
            message: Some("response carried no jobid".to_string()),
        })
    }

    /// Ask the daemon to cancel a job.
    ///
    /// `Ok(())` only means the request was accepted; the job may still be
    /// running when this returns.
    pub async fn cancel(&self, project: &str, job: &str) -> Result<(), ScrapydError> {
        let url = self.url("cancel.json");
        let req = self
            .http
            .post(&url)
            .form(&[("project", project), ("job", job)]);
        let body = self.exec_request(req, "POST", &url).await?;
        let _: serde_json::Value = self.decode_json(&url, &body)?;
        Ok(())
    }

    /// Upload an egg as a new version of `project`, versioned by the current
    /// epoch seconds. Returns the raw response body.
    pub async fn deploy(&self, project: &str, egg_path: &Path) -> Result<String, ScrapydError> {
        let egg = tokio::fs::read(egg_path)
            .await
            .map_err(|source| ScrapydError::io("read egg file", source))?;
        let version = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |duration| duration.as_secs());
        let file_name = egg_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{project}.egg"));
        let form = multipart::Form::new()
            .text("project", project.to_string())
            .text("version", version.to_string())
            .part("egg", multipart::Part::bytes(egg).file_name(file_name));

        let url = self.url("addversion.json");
        let req = self.http.post(&url).multipart(form);
        // The daemon answers a stored egg with exactly 200.
        let (status, body) = self.send_request(req, "POST", &url).await?;
        if status != StatusCode::OK {
            return Err(ScrapydError::Http {
                status,
                url,
                body: Some(body),
            });
        }
        Ok(body)
    }

    /// `POST /delproject.json`
    pub async fn delete_project(&self, project: &str) -> Result<(), ScrapydError> {
        let url = self.url("delproject.json");
        let req = self.http.post(&url).form(&[("project", project)]);
        let body = self.exec_request(req, "POST", &url).await?;
        let payload: StatusResponse = self.decode_json(&url, &body)?;
        ensure_ok(&url, &payload.status, payload.message)
    }

    /// URL of the log file the daemon keeps for a job. Not fetched.
    pub fn log_url(&self, project: &str, spider: &str, job: &str) -> String {
        format!("{}/logs/{project}/{spider}/{job}.log", self.base_url)
    }
}

#[async_trait]
impl JobSource for ScrapydClient {
    fn endpoint(&self) -> &str {
        self.base_url()
    }

    async fn list_jobs(&self, project: &str) -> Result<JobSnapshot, ScrapydError> {
        ScrapydClient::list_jobs(self, project).await
    }
}

fn ensure_ok(url: &str, status: &str, message: Option<String>) -> Result<(), ScrapydError> {
    if status == STATUS_OK {
        Ok(())
    } else {
        Err(ScrapydError::Rejected {
            url: url.to_string(),
            status: status.to_string(),
            message,
        })
    }
}

fn map_error(err: reqwest::Error) -> ScrapydError {
    if err.is_timeout() {
        ScrapydError::Timeout
    } else {
        ScrapydError::Network(err.to_string())
    }
}
