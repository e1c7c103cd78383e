//! Plan document listing

use anyhow::Result;

use super::{print_next_cursor, resolve_project, short_id, timestamp, truncate, PageArgs};
use crate::model::{PlanDocumentQuery, PlanStatus};
use crate::repository::Repositories;

pub async fn list(
    repos: &Repositories,
    statuses: Vec<PlanStatus>,
    project: Option<String>,
    search: Option<String>,
    page: &PageArgs,
) -> Result<()> {
    let mut query = PlanDocumentQuery::default().with_statuses(statuses);
    if let Some(project) = project {
        query = query.in_project(resolve_project(repos, &project).await?.id);
    }
    if let Some(search) = search {
        query = query.describing(search);
    }

    let plans = repos
        .deadline(repos.plan_documents.find(&query, &page.request()))
        .await?;
    if plans.is_empty() {
        println!("No plan documents found.");
        return Ok(());
    }

    println!("{:<12} {:<10} {:<15} {}", "Updated", "ID", "Status", "Description");
    println!("{}", "-".repeat(90));
    for plan in &plans.items {
        println!(
            "{:<12} {:<10} {:<15} {}",
            timestamp(&plan.updated_at),
            short_id(&plan.id),
            plan.status.as_str(),
            truncate(&plan.description, 50),
        );
    }

    print_next_cursor(&plans.next_cursor);
    Ok(())
}
