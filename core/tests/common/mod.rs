#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use keeper_scrapyd_client::JobSnapshot;
use keeper_scrapyd_client::JobSource;
use keeper_scrapyd_client::RawJob;
use keeper_scrapyd_client::ScrapydError;
use keeper_state::StateRuntime;
use tempfile::TempDir;

pub const FAKE_ENDPOINT: &str = "http://fake-scrapyd:6800";

/// State runtime in a temp dir that lives as long as the returned guard.
pub async fn temp_state() -> (TempDir, Arc<StateRuntime>) {
    let home = TempDir::new().expect("temp keeper home");
    let state = StateRuntime::init(home.path().to_path_buf())
        .await
        .expect("initialize state");
    (home, state)
}

pub fn raw_job(id: &str, spider: &str) -> RawJob {
    RawJob {
        id: Some(id.to_string()),
        spider: Some(spider.to_string()),
        start_time: None,
        end_time: None,
    }
}

/// In-memory job source whose snapshot can be swapped between polls.
pub struct FakeSource {
    snapshot: Mutex<Result<JobSnapshot, String>>,
}

impl FakeSource {
    pub fn new(snapshot: JobSnapshot) -> Arc<Self> {
        Arc::new(Self {
            snapshot: Mutex::new(Ok(snapshot)),
        })
    }

    pub fn set(&self, snapshot: JobSnapshot) {
        *self.snapshot.lock().expect("snapshot lock") = Ok(snapshot);
    }

    pub fn fail(&self, reason: &str) {
        *self.snapshot.lock().expect("snapshot lock") = Err(reason.to_string());
    }
}

#[async_trait]
impl JobSource for FakeSource {
    fn endpoint(&self) -> &str {
        FAKE_ENDPOINT
    }

    async fn list_jobs(&self, _project: &str) -> Result<JobSnapshot, ScrapydError> {
        self.snapshot
            .lock()
            .expect("snapshot lock")
            .clone()
            .map_err(ScrapydError::Network)
    }
}
