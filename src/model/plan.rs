use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{fill, Record, SortField, DEFAULT_PROJECT_ID};
use crate::error::StoreError;

/// Lifecycle of a plan document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    #[default]
    Scratch,
    Draft,
    Planning,
    Pending,
    Implementation,
    Complete,
}

impl PlanStatus {
    pub const ALL: [PlanStatus; 6] = [
        PlanStatus::Scratch,
        PlanStatus::Draft,
        PlanStatus::Planning,
        PlanStatus::Pending,
        PlanStatus::Implementation,
        PlanStatus::Complete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Scratch => "scratch",
            PlanStatus::Draft => "draft",
            PlanStatus::Planning => "planning",
            PlanStatus::Pending => "pending",
            PlanStatus::Implementation => "implementation",
            PlanStatus::Complete => "complete",
        }
    }
}

impl FromStr for PlanStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PlanStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StoreError::Validation(format!("plan status: {}", s)))
    }
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collaboratively edited plan attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlanDocument {
    pub id: String,
    pub project_id: String,
    pub description: String,
    pub body: String,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanDocument {
    pub fn new(project_id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_status(mut self, status: PlanStatus) -> Self {
        self.status = status;
        self
    }
}

impl Record for PlanDocument {
    const KIND: &'static str = "plan document";

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
        fill(&mut self.updated_at, created);
    }

    fn sort_value(&self, field: SortField) -> DateTime<Utc> {
        match field {
            SortField::UpdatedAt => self.updated_at,
            SortField::CreatedAt => self.created_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanDocumentEventType {
    BodyChange,
    StatusChange,
}

impl PlanDocumentEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanDocumentEventType::BodyChange => "body_change",
            PlanDocumentEventType::StatusChange => "status_change",
        }
    }
}

impl FromStr for PlanDocumentEventType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "body_change" => Ok(PlanDocumentEventType::BodyChange),
            "status_change" => Ok(PlanDocumentEventType::StatusChange),
            other => Err(StoreError::Validation(format!("plan document event type: {}", other))),
        }
    }
}

/// Append-only change log entry of a plan document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDocumentEvent {
    pub id: String,
    pub plan_document_id: String,
    pub event_type: PlanDocumentEventType,
    /// Diff or patch describing the change
    pub patch: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PlanDocumentEvent {
    pub fn new(
        plan_document_id: impl Into<String>,
        event_type: PlanDocumentEventType,
        patch: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            plan_document_id: plan_document_id.into(),
            event_type,
            patch: patch.into(),
            session_id: None,
            user_id: None,
            message: None,
            created_at: DateTime::<Utc>::default(),
        }
    }

    pub fn by_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl Record for PlanDocumentEvent {
    const KIND: &'static str = "plan document event";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        fill(&mut self.created_at, now);
    }

    fn sort_key(_field: SortField) -> &'static str {
        "created_at"
    }

    fn sort_value(&self, _field: SortField) -> DateTime<Utc> {
        self.created_at
    }
}

/// Composable plan document filter. Unset parts do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanDocumentQuery {
    /// Empty means any status
    pub statuses: Vec<PlanStatus>,
    pub project_id: Option<String>,
    /// Case-insensitive substring of the description
    pub description_contains: Option<String>,
    /// Explicit id set; an empty set matches nothing
    pub ids: Option<Vec<String>>,
}

impl PlanDocumentQuery {
    pub fn with_statuses(mut self, statuses: impl IntoIterator<Item = PlanStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn describing(mut self, needle: impl Into<String>) -> Self {
        self.description_contains = Some(needle.into());
        self
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.ids = Some(ids.into_iter().collect());
        self
    }

    /// Lower-cased search needle, `None` when absent or blank.
    pub fn needle(&self) -> Option<String> {
        self.description_contains
            .as_deref()
            .filter(|needle| !needle.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, plan: &PlanDocument) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&plan.status) {
            return false;
        }
        if let Some(project_id) = &self.project_id {
            if &plan.project_id != project_id {
                return false;
            }
        }
        if let Some(ids) = &self.ids {
            if !ids.iter().any(|id| id == &plan.id) {
                return false;
            }
        }
        match self.needle() {
            Some(needle) => plan.description.to_lowercase().contains(&needle),
            None => true,
        }
    }
}
