//! Column family and index layout of every entity

use chrono::{DateTime, Utc};

use super::keys;
use crate::error::StoreResult;
use crate::model::{
    composite_key, identity_key, target_key, ApiKey, Event, FavoriteTargetType, OAuthConnection,
    PasswordCredential, PlanDocument, PlanDocumentEvent, Project, Record, Session, SortField, User,
    UserFavorite, WebSession,
};

/// Partition of the whole-table listings.
pub const ALL: &str = "all";

/// One entry a record owns in its table's index column family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEntry {
    /// Ordered listing key; the value is empty.
    Sorted(Vec<u8>),
    /// Natural key; the value is the owning record id.
    Unique(Vec<u8>),
}

impl IndexEntry {
    pub fn key(&self) -> &[u8] {
        match self {
            IndexEntry::Sorted(key) | IndexEntry::Unique(key) => key,
        }
    }
}

/// Name of the sorted index over `scope` ordered by `field`.
pub fn index_name(scope: &str, field: &str) -> String {
    format!("{}:{}", scope, field)
}

pub fn index_cf(table: &str) -> String {
    format!("{}/index", table)
}

pub trait WideRecord: Record {
    const TABLE: &'static str;

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>>;
}

/// Collects the index entries of one record.
struct Entries<'a, T> {
    record: &'a T,
    out: Vec<IndexEntry>,
}

impl<'a, T: Record> Entries<'a, T> {
    fn of(record: &'a T) -> Self {
        Self {
            record,
            out: Vec::new(),
        }
    }

    /// Sorted entries under `scope` for every timestamp the record lists by.
    fn listed(mut self, scope: &str, partition: &str) -> StoreResult<Self> {
        let mut fields = vec![SortField::UpdatedAt, SortField::CreatedAt];
        fields.dedup_by_key(|field| T::sort_key(*field));
        for field in fields {
            let name = index_name(scope, T::sort_key(field));
            let key = keys::sorted_key(&name, partition, self.record.sort_value(field), self.record.id())?;
            self.out.push(IndexEntry::Sorted(key));
        }
        Ok(self)
    }

    fn sorted_at(mut self, name: &str, partition: &str, at: DateTime<Utc>) -> StoreResult<Self> {
        let key = keys::sorted_key(name, partition, at, self.record.id())?;
        self.out.push(IndexEntry::Sorted(key));
        Ok(self)
    }

    fn unique(mut self, name: &str, value: &str) -> Self {
        self.out.push(IndexEntry::Unique(keys::unique_key(name, value)));
        self
    }

    fn done(self) -> Vec<IndexEntry> {
        self.out
    }
}

pub const EXPIRES: &str = "expires:expires_at";
pub const CANONICAL_URL: &str = "canonical_git_url";
pub const CLAUDE_SESSION_ID: &str = "claude_session_id";
pub const SESSION_UUID: &str = "session_uuid";
pub const EMAIL: &str = "email";
pub const KEY_HASH: &str = "key_hash";
pub const IDENTITY: &str = "identity";
pub const TARGET: &str = "target";

/// Natural key of an event's correlation uuid within its session.
pub fn session_uuid(session_id: &str, uuid: &str) -> String {
    composite_key(&[session_id, uuid])
}

/// Partition of a user's favorites of one target type.
pub fn favorite_scope(user_id: &str, target_type: FavoriteTargetType) -> String {
    composite_key(&[user_id, target_type.as_str()])
}

impl WideRecord for Project {
    const TABLE: &'static str = "projects";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        Ok(Entries::of(self)
            .listed(ALL, ALL)?
            .unique(CANONICAL_URL, &self.canonical_git_url)
            .done())
    }
}

impl WideRecord for Session {
    const TABLE: &'static str = "sessions";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        let mut entries = Entries::of(self)
            .listed(ALL, ALL)?
            .listed("project", &self.project_id)?
            .unique(CLAUDE_SESSION_ID, &self.claude_session_id);
        if let Some(user_id) = &self.user_id {
            entries = entries.listed("user", user_id)?;
        }
        Ok(entries.done())
    }
}

impl WideRecord for Event {
    const TABLE: &'static str = "events";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        let mut entries = Entries::of(self).listed("session", &self.session_id)?;
        if let Some(uuid) = &self.uuid {
            entries = entries.unique(SESSION_UUID, &session_uuid(&self.session_id, uuid));
        }
        Ok(entries.done())
    }
}

impl WideRecord for PlanDocument {
    const TABLE: &'static str = "plan_documents";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        Ok(Entries::of(self)
            .listed(ALL, ALL)?
            .listed("project", &self.project_id)?
            .done())
    }
}

impl WideRecord for PlanDocumentEvent {
    const TABLE: &'static str = "plan_document_events";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        let mut entries = Entries::of(self).listed("plan", &self.plan_document_id)?;
        if let Some(user_id) = &self.user_id {
            entries = entries.listed("user", user_id)?;
        }
        Ok(entries.done())
    }
}

impl WideRecord for User {
    const TABLE: &'static str = "users";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        Ok(Entries::of(self)
            .listed(ALL, ALL)?
            .unique(EMAIL, &self.email)
            .done())
    }
}

impl WideRecord for ApiKey {
    const TABLE: &'static str = "api_keys";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        Ok(Entries::of(self)
            .listed("user", &self.user_id)?
            .unique(KEY_HASH, &self.key_hash)
            .done())
    }
}

impl WideRecord for WebSession {
    const TABLE: &'static str = "web_sessions";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        Ok(Entries::of(self)
            .listed("user", &self.user_id)?
            .sorted_at(EXPIRES, ALL, self.expires_at)?
            .done())
    }
}

impl WideRecord for PasswordCredential {
    const TABLE: &'static str = "password_credentials";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        Ok(Vec::new())
    }
}

impl WideRecord for OAuthConnection {
    const TABLE: &'static str = "oauth_connections";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        Ok(Entries::of(self)
            .listed("user", &self.user_id)?
            .unique(IDENTITY, &identity_key(&self.provider, &self.provider_user_id))
            .done())
    }
}

impl WideRecord for UserFavorite {
    const TABLE: &'static str = "user_favorites";

    fn index_entries(&self) -> StoreResult<Vec<IndexEntry>> {
        let typed = favorite_scope(&self.user_id, self.target_type);
        Ok(Entries::of(self)
            .listed("user", &self.user_id)?
            .listed("user_type", &typed)?
            .unique(TARGET, &target_key(&self.user_id, self.target_type, &self.target_id))
            .done())
    }
}

/// Every table, in column family order.
pub const TABLES: [&str; 11] = [
    Project::TABLE,
    Session::TABLE,
    Event::TABLE,
    PlanDocument::TABLE,
    PlanDocumentEvent::TABLE,
    User::TABLE,
    ApiKey::TABLE,
    WebSession::TABLE,
    PasswordCredential::TABLE,
    OAuthConnection::TABLE,
    UserFavorite::TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::prepare;
    use serde_json::json;

    fn unique_keys(entries: &[IndexEntry]) -> Vec<Vec<u8>> {
        entries
            .iter()
            .filter_map(|e| match e {
                IndexEntry::Unique(key) => Some(key.clone()),
                IndexEntry::Sorted(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_session_indexes() {
        let mut session = Session::new("claude-1").with_project("p1");
        prepare(&mut session, Utc::now());
        let entries = session.index_entries().unwrap();
        // all + project listings by two fields, plus the natural key
        assert_eq!(entries.len(), 5);
        assert_eq!(
            unique_keys(&entries),
            vec![keys::unique_key(CLAUDE_SESSION_ID, "claude-1")]
        );

        let with_user = session.clone().with_user("u1").index_entries().unwrap();
        assert_eq!(with_user.len(), 7);
    }

    #[test]
    fn test_event_uuid_key_is_scoped_to_session() {
        let mut event = Event::new("s1", "PreToolUse", "Bash", json!({})).with_uuid("u-1");
        prepare(&mut event, Utc::now());
        assert_eq!(
            unique_keys(&event.index_entries().unwrap()),
            vec![keys::unique_key(SESSION_UUID, "2:s13:u-1")]
        );

        let mut bare = Event::new("s1", "Stop", "", json!(null));
        prepare(&mut bare, Utc::now());
        let entries = bare.index_entries().unwrap();
        assert!(unique_keys(&entries).is_empty());
        // created_at only
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_touch_moves_updated_index_only() {
        let mut session = Session::new("claude-1");
        prepare(&mut session, Utc::now());
        let before = session.index_entries().unwrap();
        session.updated_at = session.updated_at + chrono::Duration::seconds(3);
        let after = session.index_entries().unwrap();
        let moved = before.iter().filter(|e| !after.contains(e)).count();
        assert_eq!(moved, 2);
    }

    #[test]
    fn test_favorite_keys() {
        let mut favorite = UserFavorite::new("u1", FavoriteTargetType::Plan, "p9");
        prepare(&mut favorite, Utc::now());
        assert_eq!(
            unique_keys(&favorite.index_entries().unwrap()),
            vec![keys::unique_key(TARGET, "2:u14:plan2:p9")]
        );
    }

    #[test]
    fn test_index_cf_names() {
        assert_eq!(index_cf("events"), "events/index");
        assert_eq!(TABLES.len(), 11);
    }
}
