//! Session listing

use anyhow::Result;

use super::{print_next_cursor, resolve_project, short_id, timestamp, truncate, PageArgs};
use crate::repository::Repositories;

pub async fn list(
    repos: &Repositories,
    project: Option<String>,
    user: Option<String>,
    page: &PageArgs,
) -> Result<()> {
    let request = page.request();
    let sessions = match (project, user) {
        (Some(project), _) => {
            let project = resolve_project(repos, &project).await?;
            repos
                .deadline(repos.sessions.find_by_project(&project.id, &request))
                .await?
        }
        (None, Some(user)) => {
            repos
                .deadline(repos.sessions.find_by_user(&user, &request))
                .await?
        }
        (None, None) => repos.deadline(repos.sessions.find_all(&request)).await?,
    };

    if sessions.is_empty() {
        println!("No sessions found. Run 'agentledger import' or install the hook first.");
        return Ok(());
    }

    println!(
        "{:<12} {:<12} {:<10} {:<38} {:<15} {}",
        "Updated", "Started", "ID", "Claude session", "Branch", "Title"
    );
    println!("{}", "-".repeat(110));

    for session in &sessions.items {
        let title = session
            .title
            .as_deref()
            .map(|t| truncate(t, 35))
            .unwrap_or_else(|| "-".to_string());
        let branch = if session.branch.is_empty() {
            "-".to_string()
        } else {
            truncate(&session.branch, 15)
        };

        println!(
            "{:<12} {:<12} {:<10} {:<38} {:<15} {}",
            timestamp(&session.updated_at),
            timestamp(&session.started_at),
            short_id(&session.id),
            session.claude_session_id,
            branch,
            title,
        );
    }

    print_next_cursor(&sessions.next_cursor);
    Ok(())
}
