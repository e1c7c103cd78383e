//! Maintenance commands

use anyhow::Result;
use chrono::Utc;

use crate::repository::Repositories;

/// Opening the repositories already ensured the schema; report what is there.
pub async fn init(repos: &Repositories) -> Result<()> {
    let project = repos.deadline(repos.projects.default_project()).await?;
    println!("Backend:         {}", repos.backend);
    println!("Default project: {}", project.id);
    println!("Schema ready.");
    Ok(())
}

/// Delete expired web sessions.
pub async fn sweep(repos: &Repositories) -> Result<()> {
    let removed = repos
        .deadline(repos.web_sessions.delete_expired(Utc::now()))
        .await?;
    println!("Removed {} expired web sessions", removed);
    Ok(())
}
