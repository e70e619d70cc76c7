use super::*;
use crate::model::Project;
use crate::model::ProjectRow;

impl StateRuntime {
    /// Return the project named `name`, creating it if it is not known yet.
    pub async fn ensure_project(&self, name: &str) -> anyhow::Result<Project> {
        sqlx::query(
            r#"
INSERT INTO projects (project_name, created_at)
VALUES (?, ?)
ON CONFLICT(project_name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(now_epoch_seconds())
        .execute(self.pool.as_ref())
        .await?;
        self.get_project_by_name(name)
            .await?
            .ok_or_else(|| anyhow::anyhow!("failed to load project {name}"))
    }

    pub async fn get_project_by_name(&self, name: &str) -> anyhow::Result<Option<Project>> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
SELECT id, project_name, created_at
FROM projects
WHERE project_name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool.as_ref())
        .await?;
        row.map(Project::try_from).transpose()
    }

    pub async fn list_projects(&self) -> anyhow::Result<Vec<Project>> {
        let rows = sqlx::query_as::<_, ProjectRow>(
            r#"
SELECT id, project_name, created_at
FROM projects
ORDER BY id ASC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;
        rows.into_iter().map(Project::try_from).collect()
    }

    /// Delete a project and, through cascading foreign keys, its job history.
    ///
    /// Returns the number of project rows removed.
    pub async fn delete_project(&self, id: i64) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?")
            .bind(id)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected())
    }
}
