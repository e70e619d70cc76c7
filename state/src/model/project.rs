use anyhow::Result;
use chrono::DateTime;
use chrono::Utc;

use super::epoch_seconds_to_datetime;

/// A Scrapyd project the keeper has discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ProjectRow {
    pub(crate) id: i64,
    pub(crate) project_name: String,
    pub(crate) created_at: i64,
}

impl TryFrom<ProjectRow> for Project {
    type Error = anyhow::Error;

    fn try_from(value: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.id,
            name: value.project_name,
            created_at: epoch_seconds_to_datetime(value.created_at)?,
        })
    }
}
