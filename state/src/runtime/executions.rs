use super::*;
use crate::model::ExecutionInsertOutcome;
use crate::model::JobExecution;
use crate::model::JobExecutionCreateParams;
use crate::model::JobExecutionRow;
use crate::model::JobInstance;
use crate::model::JobInstanceCreateParams;
use crate::model::JobInstanceRow;
use sqlx::QueryBuilder;
use sqlx::Sqlite;

impl StateRuntime {
    /// Whether an execution with this remote id has been recorded.
    ///
    /// Advisory only: [`StateRuntime::create_execution`] relies on the unique
    /// index, not on this check.
    pub async fn has_execution(&self, service_job_execution_id: &str) -> anyhow::Result<bool> {
        let row = sqlx::query(
            r#"
SELECT 1
FROM job_executions
WHERE service_job_execution_id = ?
LIMIT 1
            "#,
        )
        .bind(service_job_execution_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        Ok(row.is_some())
    }

    /// Insert a job instance and the execution referencing it in one
    /// transaction.
    ///
    /// When the remote id is already taken the transaction is rolled back, so
    /// no orphan instance is left behind.
    pub async fn create_execution(
        &self,
        instance: &JobInstanceCreateParams,
        execution: &JobExecutionCreateParams,
    ) -> anyhow::Result<ExecutionInsertOutcome> {
        let now = now_epoch_seconds();
        let mut tx = self.pool.begin().await?;
        let instance_id = sqlx::query(
            r#"
INSERT INTO job_instances (
    project_id,
    spider_name,
    spider_arguments,
    priority,
    run_type,
    created_at
) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(instance.project_id)
        .bind(instance.spider_name.as_str())
        .bind(instance.spider_arguments.as_str())
        .bind(instance.priority)
        .bind(instance.run_type.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let inserted = sqlx::query(
            r#"
INSERT INTO job_executions (
    project_id,
    service_job_execution_id,
    job_instance_id,
    running_on,
    create_time,
    end_time
) VALUES (?, ?, ?, ?, ?, ?)
ON CONFLICT(service_job_execution_id) DO NOTHING
            "#,
        )
        .bind(execution.project_id)
        .bind(execution.service_job_execution_id.as_str())
        .bind(instance_id)
        .bind(execution.running_on.as_str())
        .bind(datetime_to_epoch_seconds(execution.create_time))
        .bind(execution.end_time.map(datetime_to_epoch_seconds))
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(ExecutionInsertOutcome::AlreadyRecorded);
        }
        tx.commit().await?;

        let service_id = execution.service_job_execution_id.as_str();
        let created = self
            .get_execution_by_service_id(service_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to load created execution {service_id}"))?;
        Ok(ExecutionInsertOutcome::Created(created))
    }

    pub async fn get_execution_by_service_id(
        &self,
        service_job_execution_id: &str,
    ) -> anyhow::Result<Option<JobExecution>> {
        let row = sqlx::query_as::<_, JobExecutionRow>(
            r#"
SELECT
    id,
    project_id,
    service_job_execution_id,
    job_instance_id,
    running_on,
    create_time,
    end_time
FROM job_executions
WHERE service_job_execution_id = ?
            "#,
        )
        .bind(service_job_execution_id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        row.map(JobExecution::try_from).transpose()
    }

    /// Executions of a project, newest first.
    pub async fn list_executions(
        &self,
        project_id: i64,
        limit: Option<usize>,
    ) -> anyhow::Result<Vec<JobExecution>> {
        let mut builder = QueryBuilder::<Sqlite>::new(
            r#"
SELECT
    id,
    project_id,
    service_job_execution_id,
    job_instance_id,
    running_on,
    create_time,
    end_time
FROM job_executions
WHERE project_id =
            "#,
        );
        builder.push_bind(project_id);
        builder.push(" ORDER BY create_time DESC, id DESC");
        if let Some(limit) = limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }
        let rows: Vec<JobExecutionRow> = builder
            .build_query_as::<JobExecutionRow>()
            .fetch_all(self.pool.as_ref())
            .await?;
        rows.into_iter().map(JobExecution::try_from).collect()
    }

    /// Count executions, optionally restricted to one project.
    pub async fn count_executions(&self, project_id: Option<i64>) -> anyhow::Result<i64> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM job_executions");
        if let Some(project_id) = project_id {
            builder.push(" WHERE project_id = ");
            builder.push_bind(project_id);
        }
        let count: i64 = builder
            .build_query_scalar()
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(count)
    }

    pub async fn get_job_instance(&self, id: i64) -> anyhow::Result<Option<JobInstance>> {
        let row = sqlx::query_as::<_, JobInstanceRow>(
            r#"
SELECT
    id,
    project_id,
    spider_name,
    spider_arguments,
    priority,
    run_type,
    created_at
FROM job_instances
WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;
        row.map(JobInstance::try_from).transpose()
    }

    pub async fn count_job_instances(&self, project_id: i64) -> anyhow::Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM job_instances WHERE project_id = ?")
                .bind(project_id)
                .fetch_one(self.pool.as_ref())
                .await?;
        Ok(count)
    }
}
