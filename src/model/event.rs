use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{fill, Record, SortField};

/// A tool-use event recorded for a session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub session_id: String,
    /// Hook or transcript event type, e.g. `PreToolUse`
    pub event_type: String,
    pub tool_name: String,
    pub payload: Value,
    /// Correlation id, unique within its session only
    pub uuid: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        session_id: impl Into<String>,
        event_type: impl Into<String>,
        tool_name: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            event_type: event_type.into(),
            tool_name: tool_name.into(),
            payload,
            ..Default::default()
        }
    }

    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

impl Record for Event {
    const KIND: &'static str = "event";

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
