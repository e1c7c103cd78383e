use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{fill, is_unset, Record, SortField, DEFAULT_PROJECT_ID};

/// One coding-agent session, correlated with the agent by `claude_session_id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub project_id: String,
    /// External correlation key, unique across all sessions
    pub claude_session_id: String,
    pub user_id: Option<String>,
    /// Working directory the agent ran in
    pub cwd: String,
    pub branch: String,
    pub title: Option<String>,
    pub started_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Advances on every event append
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(claude_session_id: impl Into<String>) -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            claude_session_id: claude_session_id.into(),
            ..Default::default()
        }
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn started(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = at;
        self
    }
}

impl Record for Session {
    const KIND: &'static str = "session";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        if self.project_id.is_empty() {
            self.project_id = DEFAULT_PROJECT_ID.to_string();
        }
        fill(&mut self.created_at, now);
        let created = self.created_at;
        fill(&mut self.started_at, created);
        fill(&mut self.updated_at, created);
    }

    fn sort_value(&self, field: SortField) -> DateTime<Utc> {
        match field {
            SortField::UpdatedAt if !is_unset(&self.updated_at) => self.updated_at,
            _ => self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_session_defaults_to_sentinel_project() {
        let session = Session::new("abc");
        assert_eq!(session.project_id, DEFAULT_PROJECT_ID);
        assert!(session.user_id.is_none());
    }

    #[test]
    fn test_stamp_keeps_explicit_timestamps() {
        let now = Utc::now();
        let earlier = now - Duration::minutes(10);
        let mut session = Session::new("abc").started(earlier);
        session.project_id.clear();
        session.stamp(now);
        assert_eq!(session.started_at, earlier);
        assert_eq!(session.created_at, now);
        assert_eq!(session.updated_at, now);
        assert_eq!(session.project_id, DEFAULT_PROJECT_ID);
    }
}
