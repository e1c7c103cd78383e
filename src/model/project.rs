use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{canonicalize_git_remote, fill, Record};

/// Reserved id of the "no repository" project. It exists in every store.
pub const DEFAULT_PROJECT_ID: &str = "00000000-0000-0000-0000-000000000000";

/// A repository sessions are grouped under, keyed by its canonical git remote.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    /// Canonical remote (`host/owner/repo`); empty for the default project
    pub canonical_git_url: String,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// New project for a raw remote url; the url is canonicalized.
    pub fn new(git_remote: &str) -> Self {
        Self {
            canonical_git_url: canonicalize_git_remote(git_remote),
            ..Default::default()
        }
    }

    /// The sentinel project with the reserved id and an empty url.
    pub fn default_project() -> Self {
        Self {
            id: DEFAULT_PROJECT_ID.to_string(),
            canonical_git_url: String::new(),
            created_at: DateTime::<Utc>::default(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.id == DEFAULT_PROJECT_ID
    }
}

impl Record for Project {
    const KIND: &'static str = "project";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        fill(&mut self.created_at, now);
    }

    fn sort_key(_field: super::SortField) -> &'static str {
        "created_at"
    }

    fn sort_value(&self, _field: super::SortField) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SortField;

    #[test]
    fn test_new_project_is_canonical() {
        let project = Project::new("git@github.com:acme/widgets.git");
        assert_eq!(project.canonical_git_url, "github.com/acme/widgets");
        assert!(project.id.is_empty());
        assert!(!project.is_default());
    }

    #[test]
    fn test_default_project() {
        let project = Project::default_project();
        assert!(project.is_default());
        assert!(project.canonical_git_url.is_empty());
        assert_eq!(Project::sort_key(SortField::UpdatedAt), "created_at");
    }
}
