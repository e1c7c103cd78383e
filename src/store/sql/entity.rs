//! Row mapping between entities and their tables

use chrono::{DateTime, Utc};
use std::str::FromStr;

use super::dialect::SqlValue;
use super::schema::{
    ColumnSpec, TableSpec, API_KEYS, EVENTS, OAUTH_CONNECTIONS, PASSWORD_CREDENTIALS,
    PLAN_DOCUMENTS, PLAN_DOCUMENT_EVENTS, PROJECTS, SESSIONS, USERS, USER_FAVORITES, WEB_SESSIONS,
};
use crate::error::{StoreError, StoreResult};
use crate::model::{
    from_nanos, to_nanos, ApiKey, Event, OAuthConnection, PasswordCredential, PlanDocument,
    PlanDocumentEvent, Project, Record, Session, User, UserFavorite, WebSession,
};

/// One decoded result row.
#[derive(Debug, Clone)]
pub struct SqlRow {
    columns: &'static [ColumnSpec],
    values: Vec<SqlValue>,
}

impl SqlRow {
    pub fn new(columns: &'static [ColumnSpec], values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    fn get(&self, name: &str) -> StoreResult<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| self.values.get(i))
            .ok_or_else(|| StoreError::corrupt(format!("missing column {}", name)))
    }

    pub fn opt_text(&self, name: &str) -> StoreResult<Option<String>> {
        match self.get(name)? {
            SqlValue::Text(value) => Ok(value.clone()),
            SqlValue::Int(_) => Err(StoreError::corrupt(format!("column {} is not text", name))),
        }
    }

    pub fn text(&self, name: &str) -> StoreResult<String> {
        self.opt_text(name)?
            .ok_or_else(|| StoreError::corrupt(format!("column {} is null", name)))
    }

    pub fn opt_int(&self, name: &str) -> StoreResult<Option<i64>> {
        match self.get(name)? {
            SqlValue::Int(value) => Ok(*value),
            SqlValue::Text(_) => Err(StoreError::corrupt(format!("column {} is not an integer", name))),
        }
    }

    pub fn int(&self, name: &str) -> StoreResult<i64> {
        self.opt_int(name)?
            .ok_or_else(|| StoreError::corrupt(format!("column {} is null", name)))
    }

    pub fn ts(&self, name: &str) -> StoreResult<DateTime<Utc>> {
        Ok(from_nanos(self.int(name)?))
    }

    pub fn opt_ts(&self, name: &str) -> StoreResult<Option<DateTime<Utc>>> {
        Ok(self.opt_int(name)?.map(from_nanos))
    }

    pub fn parse<T: FromStr<Err = StoreError>>(&self, name: &str) -> StoreResult<T> {
        self.text(name)?.parse()
    }
}

fn text(value: &str) -> SqlValue {
    SqlValue::text(value)
}

fn opt_text(value: &Option<String>) -> SqlValue {
    SqlValue::Text(value.clone())
}

fn ts(value: DateTime<Utc>) -> StoreResult<SqlValue> {
    Ok(SqlValue::int(to_nanos(value)?))
}

fn opt_ts(value: Option<DateTime<Utc>>) -> StoreResult<SqlValue> {
    Ok(SqlValue::Int(value.map(to_nanos).transpose()?))
}

/// An entity stored in one table, one column per field.
pub trait SqlEntity: Record {
    fn table() -> &'static TableSpec;

    /// Values in the table's column order.
    fn to_values(&self) -> StoreResult<Vec<SqlValue>>;

    fn from_row(row: &SqlRow) -> StoreResult<Self>;
}

impl SqlEntity for Project {
    fn table() -> &'static TableSpec {
        &PROJECTS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.canonical_git_url),
            ts(self.created_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(Project {
            id: row.text("id")?,
            canonical_git_url: row.text("canonical_git_url")?,
            created_at: row.ts("created_at")?,
        })
    }
}

impl SqlEntity for Session {
    fn table() -> &'static TableSpec {
        &SESSIONS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.project_id),
            text(&self.claude_session_id),
            opt_text(&self.user_id),
            text(&self.cwd),
            text(&self.branch),
            opt_text(&self.title),
            ts(self.started_at)?,
            ts(self.created_at)?,
            ts(self.updated_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(Session {
            id: row.text("id")?,
            project_id: row.text("project_id")?,
            claude_session_id: row.text("claude_session_id")?,
            user_id: row.opt_text("user_id")?,
            cwd: row.text("cwd")?,
            branch: row.text("branch")?,
            title: row.opt_text("title")?,
            started_at: row.ts("started_at")?,
            created_at: row.ts("created_at")?,
            updated_at: row.ts("updated_at")?,
        })
    }
}

impl SqlEntity for Event {
    fn table() -> &'static TableSpec {
        &EVENTS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.session_id),
            text(&self.event_type),
            text(&self.tool_name),
            SqlValue::text(serde_json::to_string(&self.payload)?),
            opt_text(&self.uuid),
            ts(self.created_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(Event {
            id: row.text("id")?,
            session_id: row.text("session_id")?,
            event_type: row.text("event_type")?,
            tool_name: row.text("tool_name")?,
            payload: serde_json::from_str(&row.text("payload")?)?,
            uuid: row.opt_text("uuid")?,
            created_at: row.ts("created_at")?,
        })
    }
}

impl SqlEntity for PlanDocument {
    fn table() -> &'static TableSpec {
        &PLAN_DOCUMENTS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.project_id),
            text(&self.description),
            text(&self.body),
            text(self.status.as_str()),
            ts(self.created_at)?,
            ts(self.updated_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(PlanDocument {
            id: row.text("id")?,
            project_id: row.text("project_id")?,
            description: row.text("description")?,
            body: row.text("body")?,
            status: row.parse("status")?,
            created_at: row.ts("created_at")?,
            updated_at: row.ts("updated_at")?,
        })
    }
}

impl SqlEntity for PlanDocumentEvent {
    fn table() -> &'static TableSpec {
        &PLAN_DOCUMENT_EVENTS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.plan_document_id),
            text(self.event_type.as_str()),
            text(&self.patch),
            opt_text(&self.session_id),
            opt_text(&self.user_id),
            opt_text(&self.message),
            ts(self.created_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(PlanDocumentEvent {
            id: row.text("id")?,
            plan_document_id: row.text("plan_document_id")?,
            event_type: row.parse("event_type")?,
            patch: row.text("patch")?,
            session_id: row.opt_text("session_id")?,
            user_id: row.opt_text("user_id")?,
            message: row.opt_text("message")?,
            created_at: row.ts("created_at")?,
        })
    }
}

impl SqlEntity for User {
    fn table() -> &'static TableSpec {
        &USERS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.email),
            text(&self.display_name),
            ts(self.created_at)?,
            ts(self.updated_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(User {
            id: row.text("id")?,
            email: row.text("email")?,
            display_name: row.text("display_name")?,
            created_at: row.ts("created_at")?,
            updated_at: row.ts("updated_at")?,
        })
    }
}

impl SqlEntity for ApiKey {
    fn table() -> &'static TableSpec {
        &API_KEYS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(&self.name),
            text(&self.key_hash),
            text(&self.key_prefix),
            opt_ts(self.last_used_at)?,
            ts(self.created_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(ApiKey {
            id: row.text("id")?,
            user_id: row.text("user_id")?,
            name: row.text("name")?,
            key_hash: row.text("key_hash")?,
            key_prefix: row.text("key_prefix")?,
            last_used_at: row.opt_ts("last_used_at")?,
            created_at: row.ts("created_at")?,
        })
    }
}

impl SqlEntity for WebSession {
    fn table() -> &'static TableSpec {
        &WEB_SESSIONS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            ts(self.expires_at)?,
            ts(self.created_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(WebSession {
            id: row.text("id")?,
            user_id: row.text("user_id")?,
            expires_at: row.ts("expires_at")?,
            created_at: row.ts("created_at")?,
        })
    }
}

impl SqlEntity for PasswordCredential {
    fn table() -> &'static TableSpec {
        &PASSWORD_CREDENTIALS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.user_id),
            text(&self.password_hash),
            ts(self.created_at)?,
            ts(self.updated_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(PasswordCredential {
            user_id: row.text("user_id")?,
            password_hash: row.text("password_hash")?,
            created_at: row.ts("created_at")?,
            updated_at: row.ts("updated_at")?,
        })
    }
}

impl SqlEntity for OAuthConnection {
    fn table() -> &'static TableSpec {
        &OAUTH_CONNECTIONS
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(&self.provider),
            text(&self.provider_user_id),
            opt_text(&self.email),
            ts(self.created_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(OAuthConnection {
            id: row.text("id")?,
            user_id: row.text("user_id")?,
            provider: row.text("provider")?,
            provider_user_id: row.text("provider_user_id")?,
            email: row.opt_text("email")?,
            created_at: row.ts("created_at")?,
        })
    }
}

impl SqlEntity for UserFavorite {
    fn table() -> &'static TableSpec {
        &USER_FAVORITES
    }

    fn to_values(&self) -> StoreResult<Vec<SqlValue>> {
        Ok(vec![
            text(&self.id),
            text(&self.user_id),
            text(self.target_type.as_str()),
            text(&self.target_id),
            ts(self.created_at)?,
        ])
    }

    fn from_row(row: &SqlRow) -> StoreResult<Self> {
        Ok(UserFavorite {
            id: row.text("id")?,
            user_id: row.text("user_id")?,
            target_type: row.parse("target_type")?,
            target_id: row.text("target_id")?,
            created_at: row.ts("created_at")?,
        })
    }
}
