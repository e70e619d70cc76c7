use std::sync::Arc;
use std::time::Duration;

use keeper_scrapyd_client::JobSource;
use keeper_scrapyd_client::ScrapydClient;
use keeper_state::StateRuntime;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing::warn;

use crate::projects::sync_projects;
use crate::reconcile::Reconciler;

/// Summary of one reconciliation pass over all projects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub projects: usize,
    pub live: usize,
    pub unavailable: usize,
    pub created: usize,
    /// Projects whose listing could not be recorded.
    pub failed: usize,
}

/// Periodically reconciles every project the daemon reports.
pub struct Poller {
    client: Arc<ScrapydClient>,
    reconciler: Reconciler,
}

impl Poller {
    pub fn new(state: Arc<StateRuntime>, client: Arc<ScrapydClient>) -> Self {
        let source: Arc<dyn JobSource> = client.clone();
        Self {
            client,
            reconciler: Reconciler::new(state, source),
        }
    }

    /// Run a single pass.
    ///
    /// If the project list cannot be fetched the locally known projects are
    /// reconciled instead. A storage failure for one project is counted in
    /// [`PassReport::failed`] and the pass moves on to the next one.
    pub async fn run_once(&self) -> anyhow::Result<PassReport> {
        let state = self.reconciler.state();
        let projects = match sync_projects(&self.client, state).await {
            Ok(projects) => projects,
            Err(err) => {
                warn!("falling back to known projects: {err:#}");
                state.list_projects().await?
            }
        };

        let mut report = PassReport {
            projects: projects.len(),
            ..PassReport::default()
        };
        for project in &projects {
            match self.reconciler.list_jobs(project, None).await {
                Ok(listing) => {
                    if listing.is_live() {
                        report.live += 1;
                    } else {
                        report.unavailable += 1;
                    }
                    report.created += listing.created;
                }
                Err(err) => {
                    warn!(project = %project.name, "reconciliation failed: {err:#}");
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Run passes every `interval` until `cancel` fires.
    pub async fn run(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("poller stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(report) => info!(
                            projects = report.projects,
                            live = report.live,
                            unavailable = report.unavailable,
                            created = report.created,
                            failed = report.failed,
                            "reconciliation pass complete"
                        ),
                        Err(err) => warn!("reconciliation pass failed: {err:#}"),
                    }
                }
            }
        }
    }
}
