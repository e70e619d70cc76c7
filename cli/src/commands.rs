#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use keeper_core::Freshness;
use keeper_core::JobListing;
use keeper_core::JobView;
use keeper_core::KeeperConfig;
use keeper_core::ListedJobs;
use keeper_core::Poller;
use keeper_core::Reconciler;
use keeper_core::delete_project;
use keeper_core::sync_projects;
use keeper_scrapyd_client::JobSource;
use keeper_scrapyd_client::JobStatus;
use keeper_scrapyd_client::ScrapydClient;
use keeper_state::StateRuntime;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cli::SyncArgs;

pub async fn projects(config: &KeeperConfig, json: bool) -> anyhow::Result<()> {
    let client = config.scrapyd_client()?;
    let state = StateRuntime::init(config.keeper_home.clone()).await?;
    let projects = sync_projects(&client, &state).await?;
    let names: Vec<&str> = projects.iter().map(|project| project.name.as_str()).collect();
    if json {
        print_json(&names)?;
    } else {
        for name in names {
            println!("{name}");
        }
    }
    Ok(())
}

pub async fn spiders(config: &KeeperConfig, project: &str, json: bool) -> anyhow::Result<()> {
    let client = config.scrapyd_client()?;
    let spiders = client.list_spiders(project).await?;
    if json {
        print_json(&spiders)?;
    } else {
        for spider in spiders {
            println!("{}", spider.name);
        }
    }
    Ok(())
}

pub async fn jobs(
    config: &KeeperConfig,
    project: &str,
    status: Option<JobStatus>,
    json: bool,
) -> anyhow::Result<()> {
    let client = Arc::new(config.scrapyd_client()?);
    let state = StateRuntime::init(config.keeper_home.clone()).await?;
    let project = state.ensure_project(project).await?;
    let source: Arc<dyn JobSource> = client;
    let listing = Reconciler::new(state, source)
        .list_jobs(&project, status)
        .await?;
    if json {
        return print_json(&listing);
    }
    if let Freshness::Unavailable { reason } = &listing.freshness {
        eprintln!("warning: daemon unavailable, showing no jobs ({reason})");
    }
    print_listing(&listing);
    Ok(())
}

fn print_listing(listing: &JobListing) {
    match &listing.jobs {
        ListedJobs::All(buckets) => {
            for status in JobStatus::ALL {
                print_bucket(status, buckets.bucket(status));
            }
        }
        ListedJobs::Single { status, jobs } => print_bucket(*status, jobs),
    }
}

fn print_bucket(status: JobStatus, jobs: &[JobView]) {
    println!("{status} ({})", jobs.len());
    for job in jobs {
        println!(
            "  {:<34} {:<20} {:<20} {}",
            job.id.as_deref().unwrap_or("-"),
            job.spider.as_deref().unwrap_or("-"),
            format_time(Some(job.start_time)),
            format_time(job.end_time),
        );
    }
}

#[derive(Debug, Serialize)]
struct HistoryEntry {
    job_id: String,
    spider: String,
    running_on: String,
    create_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
}

pub async fn history(
    config: &KeeperConfig,
    project: &str,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let state = StateRuntime::init(config.keeper_home.clone()).await?;
    let Some(project) = state.get_project_by_name(project).await? else {
        anyhow::bail!("unknown project `{project}`; run `keeper projects` first");
    };
    let executions = state.list_executions(project.id, Some(limit)).await?;
    let mut entries = Vec::with_capacity(executions.len());
    for execution in executions {
        let spider = state
            .get_job_instance(execution.job_instance_id)
            .await?
            .map(|instance| instance.spider_name)
            .unwrap_or_default();
        entries.push(HistoryEntry {
            job_id: execution.service_job_execution_id,
            spider,
            running_on: execution.running_on,
            create_time: execution.create_time,
            end_time: execution.end_time,
        });
    }

    if json {
        return print_json(&entries);
    }
    for entry in entries {
        println!(
            "{:<34} {:<20} {:<20} {:<20} {}",
            entry.job_id,
            entry.spider,
            format_time(Some(entry.create_time)),
            format_time(entry.end_time),
            entry.running_on,
        );
    }
    Ok(())
}

pub async fn sync(config: &KeeperConfig, args: &SyncArgs, json: bool) -> anyhow::Result<()> {
    let client = Arc::new(config.scrapyd_client()?);
    let state = StateRuntime::init(config.keeper_home.clone()).await?;
    let poller = Poller::new(state, client);

    if !args.watch {
        let report = poller.run_once().await?;
        if json {
            print_json(&report)?;
        } else {
            println!(
                "{} projects ({} live, {} unavailable, {} failed), {} new executions",
                report.projects, report.live, report.unavailable, report.failed, report.created
            );
        }
        if report.failed > 0 {
            anyhow::bail!("failed to record history for {} project(s)", report.failed);
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });
    info!(
        interval_secs = config.poll_interval.as_secs(),
        server = %config.server_url,
        "watching daemon"
    );
    poller.run(config.poll_interval, cancel).await;
    Ok(())
}

pub async fn schedule(
    config: &KeeperConfig,
    project: &str,
    spider: &str,
    args: &[(String, String)],
    json: bool,
) -> anyhow::Result<()> {
    let client = config.scrapyd_client()?;
    let job_id = client.schedule(project, spider, args).await?;
    if json {
        return print_json(&serde_json::json!({ "jobid": job_id }));
    }
    println!("{job_id}");
    Ok(())
}

pub async fn cancel(config: &KeeperConfig, project: &str, job: &str) -> anyhow::Result<()> {
    let client = config.scrapyd_client()?;
    client.cancel(project, job).await?;
    println!("Cancel request for job {job} accepted.");
    Ok(())
}

pub async fn deploy(config: &KeeperConfig, project: &str, egg: &Path) -> anyhow::Result<()> {
    let client = config.scrapyd_client()?;
    let response = client
        .deploy(project, egg)
        .await
        .with_context(|| format!("failed to deploy {}", egg.display()))?;
    println!("{response}");
    Ok(())
}

pub async fn delete(config: &KeeperConfig, project: &str) -> anyhow::Result<()> {
    let client = config.scrapyd_client()?;
    let state = StateRuntime::init(config.keeper_home.clone()).await?;
    if delete_project(&client, &state, project).await? {
        println!("Deleted project {project} and its job history.");
    } else {
        println!("Deleted project {project} on the daemon; it had no local history.");
    }
    Ok(())
}

pub fn log_url(
    client: &ScrapydClient,
    project: &str,
    spider: &str,
    job: &str,
) -> anyhow::Result<()> {
    println!("{}", client.log_url(project, spider, job));
    Ok(())
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    time.map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| "-".to_string())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
