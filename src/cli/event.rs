//! Event listing of one session

use anyhow::Result;

use super::{print_next_cursor, resolve_session, short_id, timestamp, truncate, PageArgs};
use crate::repository::Repositories;

pub async fn list(repos: &Repositories, session: &str, page: &PageArgs) -> Result<()> {
    let session = resolve_session(repos, session).await?;
    let total = repos
        .deadline(repos.events.count_by_session(&session.id))
        .await?;
    let events = repos
        .deadline(repos.events.find_by_session(&session.id, &page.request()))
        .await?;

    println!(
        "Session {} ({}), {} events",
        short_id(&session.id),
        session.claude_session_id,
        total
    );
    if let Some(title) = &session.title {
        println!("{}", truncate(title, 100));
    }
    println!();

    if events.is_empty() {
        println!("No events recorded.");
        return Ok(());
    }

    println!("{:<12} {:<10} {:<18} {:<15} {}", "Time", "ID", "Type", "Tool", "Payload");
    println!("{}", "-".repeat(100));
    for event in &events.items {
        let tool = if event.tool_name.is_empty() { "-" } else { &event.tool_name };
        println!(
            "{:<12} {:<10} {:<18} {:<15} {}",
            timestamp(&event.created_at),
            short_id(&event.id),
            truncate(&event.event_type, 18),
            truncate(tool, 15),
            truncate(&event.payload.to_string(), 40),
        );
    }

    print_next_cursor(&events.next_cursor);
    Ok(())
}
