use anyhow::Result;

use super::{print_next_cursor, timestamp, PageArgs};
use crate::repository::Repositories;

pub async fn list(repos: &Repositories, page: &PageArgs) -> Result<()> {
    let projects = repos
        .deadline(repos.projects.find_all(&page.request()))
        .await?;
    if projects.is_empty() {
        println!("No projects found.");
        return Ok(());
    }

    println!("{:<38} {:<12} {}", "ID", "Created", "Repository");
    println!("{}", "-".repeat(90));
    for p in &projects.items {
        let repository = if p.is_default() {
            "(no repository)"
        } else {
            p.canonical_git_url.as_str()
        };
        println!("{:<38} {:<12} {}", p.id, timestamp(&p.created_at), repository);
    }

    print_next_cursor(&projects.next_cursor);
    Ok(())
}

/// Register a repository by remote url and print its project.
pub async fn add(repos: &Repositories, remote: &str) -> Result<()> {
    let project = repos
        .deadline(repos.projects.find_or_create_by_canonical_git_repository(remote))
        .await?;
    println!("Project '{}' has ID: {}", project.canonical_git_url, project.id);
    Ok(())
}
