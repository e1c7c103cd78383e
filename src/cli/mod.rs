//! Command implementations and their shared table formatting

pub mod admin;
pub mod event;
pub mod import;
pub mod plan;
pub mod project;
pub mod record;
pub mod session;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};

use crate::model::{canonicalize_git_remote, Project, Session, SortField};
use crate::repository::{PageRequest, Repositories};

/// Paging flags shared by the listing commands.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct PageArgs {
    /// Rows per page (0 = default, capped at 500)
    #[arg(short, long, default_value_t = 20)]
    pub limit: usize,

    /// Continue after the cursor printed by a previous page
    #[arg(long)]
    pub cursor: Option<String>,

    /// Order by updated_at or created_at
    #[arg(long, default_value = "updated_at")]
    pub sort: SortField,
}

impl PageArgs {
    pub fn request(&self) -> PageRequest {
        let mut request = PageRequest::new(self.limit).sorted_by(self.sort);
        request.cursor = self.cursor.clone();
        request
    }
}

pub(crate) fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub(crate) fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.format("%m-%d %H:%M").to_string()
}

/// First line of `text`, cut to `width` characters.
pub(crate) fn truncate(text: &str, width: usize) -> String {
    let line = text.lines().next().unwrap_or(text);
    if line.chars().count() > width {
        let head: String = line.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        line.to_string()
    }
}

pub(crate) fn print_next_cursor(next: &Option<String>) {
    if let Some(cursor) = next {
        println!("\nMore rows: --cursor {}", cursor);
    }
}

/// Project by id or by any spelling of its git remote.
pub(crate) async fn resolve_project(repos: &Repositories, query: &str) -> Result<Project> {
    if let Some(project) = repos.deadline(repos.projects.find_by_id(query)).await? {
        return Ok(project);
    }
    let canonical = canonicalize_git_remote(query);
    repos
        .deadline(repos.projects.find_by_canonical_git_repository(&canonical))
        .await?
        .ok_or_else(|| anyhow!("Project not found: {}", query))
}

/// Session by id or by Claude session id.
pub(crate) async fn resolve_session(repos: &Repositories, query: &str) -> Result<Session> {
    if let Some(session) = repos.deadline(repos.sessions.find_by_id(query)).await? {
        return Ok(session);
    }
    repos
        .deadline(repos.sessions.find_by_claude_session_id(query))
        .await?
        .ok_or_else(|| anyhow!("Session not found: {}", query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("first\nsecond", 10), "first");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_page_args_request() {
        let args = PageArgs {
            limit: 5,
            cursor: Some("abc".to_string()),
            sort: SortField::CreatedAt,
        };
        let request = args.request();
        assert_eq!(request.effective_limit(), 5);
        assert_eq!(request.cursor.as_deref(), Some("abc"));
        assert_eq!(request.sort_by, SortField::CreatedAt);
    }
}
