use anyhow::Context;
use keeper_scrapyd_client::ScrapydClient;
use keeper_state::Project;
use keeper_state::StateRuntime;
use tracing::info;

/// Make sure every project the daemon knows about has a local row.
///
/// Returns the local records for the remote projects, in remote order.
/// Local projects the daemon no longer reports are left untouched.
pub async fn sync_projects(
    client: &ScrapydClient,
    state: &StateRuntime,
) -> anyhow::Result<Vec<Project>> {
    let names = client
        .list_projects()
        .await
        .context("failed to list remote projects")?;
    let mut projects = Vec::with_capacity(names.len());
    for name in names {
        let known = state.get_project_by_name(&name).await?;
        let project = match known {
            Some(project) => project,
            None => {
                let project = state.ensure_project(&name).await?;
                info!(project = %project.name, id = project.id, "discovered project");
                project
            }
        };
        projects.push(project);
    }
    Ok(projects)
}

/// Delete `name` on the daemon, then locally together with its history.
///
/// The local row is only removed once the daemon accepted the deletion.
/// Returns whether a local project existed.
pub async fn delete_project(
    client: &ScrapydClient,
    state: &StateRuntime,
    name: &str,
) -> anyhow::Result<bool> {
    client
        .delete_project(name)
        .await
        .with_context(|| format!("daemon refused to delete project {name}"))?;
    let Some(project) = state.get_project_by_name(name).await? else {
        return Ok(false);
    };
    let removed = state.delete_project(project.id).await?;
    info!(project = name, "deleted project and its job history");
    Ok(removed > 0)
}
