mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use chrono::Utc;
use common::FAKE_ENDPOINT;
use common::FakeSource;
use common::raw_job;
use common::temp_state;
use keeper_core::Freshness;
use keeper_core::JobListing;
use keeper_core::JobView;
use keeper_core::ListedJobs;
use keeper_core::MaterializeOutcome;
use keeper_core::Reconciler;
use keeper_core::StatusBuckets;
use keeper_core::UNKNOWN_SPIDER;
use keeper_scrapyd_client::JobSnapshot;
use keeper_scrapyd_client::JobSource;
use keeper_scrapyd_client::JobStatus;
use keeper_scrapyd_client::RawJob;
use keeper_scrapyd_client::ScrapydClient;
use keeper_state::JobRunType;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param;

fn all_buckets(listing: JobListing) -> StatusBuckets {
    match listing.jobs {
        ListedJobs::All(buckets) => buckets,
        other => panic!("expected all buckets, got {other:?}"),
    }
}

fn ids(views: &[JobView]) -> Vec<Option<&str>> {
    views.iter().map(|view| view.id.as_deref()).collect()
}

#[tokio::test]
async fn fresh_project_records_pending_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listjobs.json"))
        .and(query_param("project", "news"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "pending": [{"id": "j1", "spider": "s1"}],
            "running": [],
            "finished": []
        })))
        .mount(&server)
        .await;

    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let client = ScrapydClient::new(server.uri()).expect("client");
    let reconciler = Reconciler::new(state.clone(), Arc::new(client));

    let before = Utc::now();
    let listing = reconciler.list_jobs(&project, None).await.expect("list");
    let after = Utc::now();

    assert_eq!(listing.freshness, Freshness::Live);
    assert_eq!(listing.created, 1);
    let buckets = all_buckets(listing);
    assert_eq!(buckets.pending.len(), 1);
    assert!(buckets.running.is_empty());
    assert!(buckets.finished.is_empty());
    let view = &buckets.pending[0];
    assert_eq!(view.id.as_deref(), Some("j1"));
    assert_eq!(view.end_time, None);
    assert!(
        before <= view.start_time && view.start_time <= after,
        "start time {} should fall back to now",
        view.start_time
    );

    let execution = state
        .get_execution_by_service_id("j1")
        .await
        .expect("lookup")
        .expect("execution recorded");
    assert_eq!(execution.project_id, project.id);
    assert_eq!(execution.running_on, server.uri());
    assert_eq!(execution.end_time, None);
    // Stored times have whole-second precision.
    let stored = execution.create_time.timestamp();
    assert!(
        before.timestamp() <= stored && stored <= after.timestamp(),
        "stored create time {stored} should fall back to now"
    );

    let instance = state
        .get_job_instance(execution.job_instance_id)
        .await
        .expect("lookup instance")
        .expect("instance recorded");
    assert_eq!(instance.spider_name, "s1");
    assert_eq!(instance.spider_arguments, "");
    assert_eq!(instance.priority, 0);
    assert_eq!(instance.run_type, JobRunType::OneTime);
}

#[tokio::test]
async fn repeated_polls_record_each_job_once() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let source = FakeSource::new(JobSnapshot {
        pending: vec![raw_job("j1", "s1")],
        running: vec![raw_job("j2", "s2")],
        finished: Vec::new(),
    });
    let reconciler = Reconciler::new(state.clone(), source);

    let first = reconciler.list_jobs(&project, None).await.expect("first");
    assert_eq!(first.created, 2);
    for _ in 0..3 {
        let again = reconciler.list_jobs(&project, None).await.expect("again");
        assert_eq!(again.created, 0);
        assert_eq!(all_buckets(again).pending.len(), 1);
    }

    assert_eq!(
        state.count_executions(Some(project.id)).await.expect("count"),
        2
    );
    assert_eq!(
        state
            .count_job_instances(project.id)
            .await
            .expect("count instances"),
        2
    );
}

#[tokio::test]
async fn job_completing_between_polls_is_not_duplicated() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let running = RawJob {
        start_time: Some("2024-01-01 10:00:00.000000".to_string()),
        ..raw_job("j1", "s1")
    };
    let source = FakeSource::new(JobSnapshot {
        pending: Vec::new(),
        running: vec![running.clone()],
        finished: Vec::new(),
    });
    let reconciler = Reconciler::new(state.clone(), source.clone());

    let first = all_buckets(reconciler.list_jobs(&project, None).await.expect("first"));
    assert_eq!(ids(&first.running), vec![Some("j1")]);
    assert_eq!(first.running[0].end_time, None);

    source.set(JobSnapshot {
        pending: Vec::new(),
        running: Vec::new(),
        finished: vec![RawJob {
            end_time: Some("2024-01-02 00:00:00.000000".to_string()),
            ..running
        }],
    });
    let second = reconciler.list_jobs(&project, None).await.expect("second");
    assert_eq!(second.created, 0);
    let second = all_buckets(second);
    assert!(second.running.is_empty());
    assert_eq!(ids(&second.finished), vec![Some("j1")]);
    let jan_2 = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .expect("date")
        .and_utc();
    assert_eq!(second.finished[0].end_time, Some(jan_2));

    assert_eq!(state.count_executions(None).await.expect("count"), 1);
    // The stored row keeps what was seen first; only the view moves on.
    let stored = state
        .get_execution_by_service_id("j1")
        .await
        .expect("lookup")
        .expect("stored");
    assert_eq!(stored.end_time, None);
    assert_eq!(stored.create_time, second.finished[0].start_time);
}

#[tokio::test]
async fn buckets_partition_and_filter_projects_one_bucket() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let source = FakeSource::new(JobSnapshot {
        pending: vec![raw_job("p1", "s"), raw_job("p2", "s")],
        running: vec![raw_job("r1", "s")],
        finished: vec![raw_job("f1", "s"), raw_job("f2", "s"), raw_job("f3", "s")],
    });
    let reconciler = Reconciler::new(state.clone(), source);

    let all = all_buckets(reconciler.list_jobs(&project, None).await.expect("all"));
    assert_eq!(ids(&all.pending), vec![Some("p1"), Some("p2")]);
    assert_eq!(ids(&all.running), vec![Some("r1")]);
    assert_eq!(ids(&all.finished), vec![Some("f1"), Some("f2"), Some("f3")]);

    for status in JobStatus::ALL {
        let filtered = reconciler
            .list_jobs(&project, Some(status))
            .await
            .expect("filtered");
        let ListedJobs::Single {
            status: listed,
            jobs,
        } = filtered.jobs
        else {
            panic!("expected a single bucket for {status}");
        };
        assert_eq!(listed, status);
        assert_eq!(ids(&jobs), ids(all.bucket(status)));
    }
    assert_eq!(state.count_executions(None).await.expect("count"), 6);
}

#[tokio::test]
async fn filtered_call_still_records_other_buckets() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let source = FakeSource::new(JobSnapshot {
        pending: vec![raw_job("p1", "s")],
        running: Vec::new(),
        finished: vec![raw_job("f1", "s")],
    });
    let reconciler = Reconciler::new(state.clone(), source);

    let listing = reconciler
        .list_jobs(&project, Some(JobStatus::Running))
        .await
        .expect("list");
    assert_eq!(
        listing.jobs,
        ListedJobs::Single {
            status: JobStatus::Running,
            jobs: Vec::new(),
        }
    );
    assert_eq!(listing.created, 2);
    assert_eq!(state.has_execution("p1").await.expect("lookup"), true);
    assert_eq!(state.has_execution("f1").await.expect("lookup"), true);
}

#[tokio::test]
async fn remote_failures_degrade_to_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/listjobs.json"))
        .and(query_param("project", "broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listjobs.json"))
        .and(query_param("project", "garbled"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listjobs.json"))
        .and(query_param("project", "quiet"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "pending": [],
            "running": [],
            "finished": []
        })))
        .mount(&server)
        .await;

    let (_home, state) = temp_state().await;
    let client = ScrapydClient::new(server.uri()).expect("client");
    let reconciler = Reconciler::new(state.clone(), Arc::new(client));

    for name in ["broken", "garbled"] {
        let project = state.ensure_project(name).await.expect("project");
        let listing = reconciler.list_jobs(&project, None).await.expect("fail-soft");
        assert!(
            matches!(listing.freshness, Freshness::Unavailable { .. }),
            "{name}: {:?}",
            listing.freshness
        );
        assert_eq!(listing.jobs, ListedJobs::All(StatusBuckets::default()));
    }

    let quiet = state.ensure_project("quiet").await.expect("project");
    let listing = reconciler.list_jobs(&quiet, None).await.expect("empty");
    assert_eq!(listing.freshness, Freshness::Live);
    assert_eq!(listing.jobs, ListedJobs::All(StatusBuckets::default()));
    assert_eq!(state.count_executions(None).await.expect("count"), 0);
}

#[tokio::test]
async fn unavailable_listing_honors_filter_shape() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let source = FakeSource::new(JobSnapshot::default());
    source.fail("connection refused");
    let reconciler = Reconciler::new(state, source);

    let listing = reconciler
        .list_jobs(&project, Some(JobStatus::Finished))
        .await
        .expect("fail-soft");
    assert_eq!(
        listing.freshness,
        Freshness::Unavailable {
            reason: "network error: connection refused".to_string(),
        }
    );
    assert_eq!(
        listing.jobs,
        ListedJobs::Single {
            status: JobStatus::Finished,
            jobs: Vec::new(),
        }
    );
}

#[tokio::test]
async fn jobs_without_id_are_listed_but_not_recorded() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let anonymous = RawJob {
        id: None,
        spider: Some("s1".to_string()),
        start_time: None,
        end_time: None,
    };
    let source = FakeSource::new(JobSnapshot {
        pending: vec![anonymous.clone(), anonymous.clone()],
        running: Vec::new(),
        finished: Vec::new(),
    });
    let reconciler = Reconciler::new(state.clone(), source);

    let listing = all_buckets(reconciler.list_jobs(&project, None).await.expect("list"));
    assert_eq!(ids(&listing.pending), vec![None, None]);
    assert_eq!(state.count_executions(None).await.expect("count"), 0);
    assert_eq!(
        reconciler
            .materialize(&anonymous, project.id, FAKE_ENDPOINT)
            .await
            .expect("materialize"),
        MaterializeOutcome::Skipped
    );
}

#[tokio::test]
async fn materialize_defaults_spider_and_is_idempotent() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let reconciler = Reconciler::new(state.clone(), FakeSource::new(JobSnapshot::default()));
    let job = RawJob {
        id: Some("j9".to_string()),
        spider: None,
        start_time: Some("2024-03-05 08:09:10.000000".to_string()),
        end_time: Some("2024-03-06 01:00:00.000000".to_string()),
    };

    assert_eq!(reconciler.has_execution("j9").await.expect("lookup"), false);
    let outcome = reconciler
        .materialize(&job, project.id, "http://worker-2:6800")
        .await
        .expect("materialize");
    let MaterializeOutcome::Created(execution) = outcome else {
        panic!("expected a new execution, got {outcome:?}");
    };
    assert_eq!(execution.running_on, "http://worker-2:6800");
    assert_eq!(
        execution.create_time.date_naive(),
        NaiveDate::from_ymd_opt(2024, 3, 5).expect("date")
    );
    assert_eq!(
        execution.end_time.map(|end| end.date_naive()),
        NaiveDate::from_ymd_opt(2024, 3, 6)
    );
    let instance = state
        .get_job_instance(execution.job_instance_id)
        .await
        .expect("lookup")
        .expect("instance");
    assert_eq!(instance.spider_name, UNKNOWN_SPIDER);

    assert_eq!(
        reconciler
            .materialize(&job, project.id, "http://worker-2:6800")
            .await
            .expect("materialize again"),
        MaterializeOutcome::AlreadyRecorded
    );
    assert_eq!(reconciler.has_execution("j9").await.expect("lookup"), true);
}

#[tokio::test]
async fn concurrent_reconcilers_record_shared_job_once() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let snapshot = JobSnapshot {
        pending: Vec::new(),
        running: vec![raw_job("shared", "s1"), raw_job("other", "s1")],
        finished: Vec::new(),
    };
    let a = Reconciler::new(state.clone(), FakeSource::new(snapshot.clone()));
    let b = Reconciler::new(state.clone(), FakeSource::new(snapshot));

    let (left, right) = tokio::join!(a.list_jobs(&project, None), b.list_jobs(&project, None));
    let left = left.expect("left");
    let right = right.expect("right");

    assert_eq!(left.created + right.created, 2);
    assert_eq!(state.count_executions(None).await.expect("count"), 2);
    assert_eq!(
        state
            .count_job_instances(project.id)
            .await
            .expect("count instances"),
        2
    );
}

#[tokio::test]
async fn source_endpoint_is_recorded_as_running_on() {
    let (_home, state) = temp_state().await;
    let project = state.ensure_project("news").await.expect("project");
    let source = FakeSource::new(JobSnapshot {
        pending: vec![raw_job("j1", "s1")],
        running: Vec::new(),
        finished: Vec::new(),
    });
    assert_eq!(source.endpoint(), FAKE_ENDPOINT);
    let reconciler = Reconciler::new(state.clone(), source);
    reconciler.list_jobs(&project, None).await.expect("list");

    let stored = state
        .list_executions(project.id, None)
        .await
        .expect("history");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].running_on, FAKE_ENDPOINT);
}
