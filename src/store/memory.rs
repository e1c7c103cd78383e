//! In-process store backed by one `RwLock<HashMap>` per collection
//!
//! Uniqueness is checked under the collection's write guard, so two concurrent
//! creates for one natural key cannot both succeed. No guard is held across
//! another collection's lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    normalize_email, prepare, ApiKey, Event, FavoriteTargetType, OAuthConnection,
    PasswordCredential, PlanDocument, PlanDocumentEvent, PlanDocumentQuery, PlanStatus, Project,
    Record, Session, User, UserFavorite, WebSession,
};
use crate::repository::{
    guard_default_project, newest_first, paginate, ApiKeyRepository, EventRepository,
    OAuthConnectionRepository, Page, PageRequest, PasswordCredentialRepository,
    PlanDocumentEventRepository, PlanDocumentRepository, ProjectRepository, SessionRepository,
    UserFavoriteRepository, UserRepository, WebSessionRepository,
};

/// Rows of one entity keyed by id.
struct Collection<T> {
    rows: RwLock<HashMap<String, T>>,
}

impl<T: Record> Collection<T> {
    fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }

    /// Insert `record` unless its id or a natural key collides.
    ///
    /// `conflicts` names the colliding key of an existing row, if any.
    async fn insert<F>(&self, mut record: T, conflicts: F) -> StoreResult<T>
    where
        F: Fn(&T, &T) -> Option<String>,
    {
        prepare(&mut record, Utc::now());
        let mut rows = self.rows.write().await;
        if rows.contains_key(record.id()) {
            return Err(StoreError::Duplicate(format!("{} id {}", T::KIND, record.id())));
        }
        if let Some(key) = rows.values().find_map(|existing| conflicts(existing, &record)) {
            return Err(StoreError::Duplicate(format!("{} {}", T::KIND, key)));
        }
        rows.insert(record.id().to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Option<T> {
        self.rows.read().await.get(id).cloned()
    }

    async fn find<F: Fn(&T) -> bool>(&self, pred: F) -> Option<T> {
        self.rows.read().await.values().find(|row| pred(row)).cloned()
    }

    async fn filter<F: Fn(&T) -> bool>(&self, pred: F) -> Vec<T> {
        self.rows
            .read()
            .await
            .values()
            .filter(|row| pred(row))
            .cloned()
            .collect()
    }

    async fn page<F: Fn(&T) -> bool>(&self, request: &PageRequest, pred: F) -> Page<T> {
        paginate(self.filter(pred).await, request)
    }

    /// Apply `change` to the row with `id`; false when there is none.
    async fn update<F: FnOnce(&mut T)>(&self, id: &str, change: F) -> bool {
        match self.rows.write().await.get_mut(id) {
            Some(row) => {
                change(row);
                true
            }
            None => false,
        }
    }

    async fn remove(&self, id: &str) -> bool {
        self.rows.write().await.remove(id).is_some()
    }

    async fn remove_where<F: Fn(&T) -> bool>(&self, pred: F) -> u64 {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, row| !pred(row));
        (before - rows.len()) as u64
    }
}

fn no_conflict<T>(_: &T, _: &T) -> Option<String> {
    None
}

/// Store for tests and single-process development use.
pub struct MemoryStore {
    projects: Collection<Project>,
    sessions: Collection<Session>,
    events: Collection<Event>,
    plan_documents: Collection<PlanDocument>,
    plan_document_events: Collection<PlanDocumentEvent>,
    users: Collection<User>,
    api_keys: Collection<ApiKey>,
    web_sessions: Collection<WebSession>,
    password_credentials: Collection<PasswordCredential>,
    oauth_connections: Collection<OAuthConnection>,
    favorites: Collection<UserFavorite>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            projects: Collection::new(),
            sessions: Collection::new(),
            events: Collection::new(),
            plan_documents: Collection::new(),
            plan_document_events: Collection::new(),
            users: Collection::new(),
            api_keys: Collection::new(),
            web_sessions: Collection::new(),
            password_credentials: Collection::new(),
            oauth_connections: Collection::new(),
            favorites: Collection::new(),
        }
    }
}

#[async_trait]
impl ProjectRepository for MemoryStore {
    async fn create(&self, project: Project) -> StoreResult<Project> {
        self.projects
            .insert(project, |existing, new| {
                (existing.canonical_git_url == new.canonical_git_url)
                    .then(|| format!("canonical url {:?}", new.canonical_git_url))
            })
            .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Project>> {
        Ok(self.projects.get(id).await)
    }

    async fn find_by_canonical_git_repository(&self, canonical: &str) -> StoreResult<Option<Project>> {
        Ok(self
            .projects
            .find(|p| p.canonical_git_url == canonical)
            .await)
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Project>> {
        Ok(self.projects.page(page, |_| true).await)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        guard_default_project(id)?;
        Ok(self.projects.remove(id).await)
    }
}

#[async_trait]
impl SessionRepository for MemoryStore {
    async fn create(&self, session: Session) -> StoreResult<Session> {
        self.sessions
            .insert(session, |existing, new| {
                (existing.claude_session_id == new.claude_session_id)
                    .then(|| format!("claude session id {}", new.claude_session_id))
            })
            .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Session>> {
        Ok(self.sessions.get(id).await)
    }

    async fn find_by_claude_session_id(&self, claude_session_id: &str) -> StoreResult<Option<Session>> {
        Ok(self
            .sessions
            .find(|s| s.claude_session_id == claude_session_id)
            .await)
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Session>> {
        Ok(self.sessions.page(page, |_| true).await)
    }

    async fn find_by_project(&self, project_id: &str, page: &PageRequest) -> StoreResult<Page<Session>> {
        Ok(self.sessions.page(page, |s| s.project_id == project_id).await)
    }

    async fn find_by_user(&self, user_id: &str, page: &PageRequest) -> StoreResult<Page<Session>> {
        Ok(self
            .sessions
            .page(page, |s| s.user_id.as_deref() == Some(user_id))
            .await)
    }

    async fn update_title(&self, id: &str, title: Option<String>) -> StoreResult<bool> {
        Ok(self.sessions.update(id, |s| s.title = title).await)
    }

    async fn assign_user(&self, id: &str, user_id: Option<String>) -> StoreResult<bool> {
        Ok(self.sessions.update(id, |s| s.user_id = user_id).await)
    }

    async fn touch(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .sessions
            .update(id, |s| s.updated_at = s.updated_at.max(at))
            .await)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.sessions.remove(id).await)
    }
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create(&self, event: Event) -> StoreResult<Event> {
        let event = self
            .events
            .insert(event, |existing, new| match (&existing.uuid, &new.uuid) {
                (Some(a), Some(b)) if a == b && existing.session_id == new.session_id => {
                    Some(format!("uuid {} in session {}", b, new.session_id))
                }
                _ => None,
            })
            .await?;
        SessionRepository::touch(self, &event.session_id, event.created_at).await?;
        Ok(event)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Event>> {
        Ok(self.events.get(id).await)
    }

    async fn find_by_session_and_uuid(&self, session_id: &str, uuid: &str) -> StoreResult<Option<Event>> {
        Ok(self
            .events
            .find(|e| e.session_id == session_id && e.uuid.as_deref() == Some(uuid))
            .await)
    }

    async fn find_by_session(&self, session_id: &str, page: &PageRequest) -> StoreResult<Page<Event>> {
        Ok(self.events.page(page, |e| e.session_id == session_id).await)
    }

    async fn count_by_session(&self, session_id: &str) -> StoreResult<u64> {
        Ok(self.events.filter(|e| e.session_id == session_id).await.len() as u64)
    }

    async fn delete_by_session(&self, session_id: &str) -> StoreResult<u64> {
        Ok(self.events.remove_where(|e| e.session_id == session_id).await)
    }
}

#[async_trait]
impl PlanDocumentRepository for MemoryStore {
    async fn create(&self, plan: PlanDocument) -> StoreResult<PlanDocument> {
        self.plan_documents.insert(plan, no_conflict).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocument>> {
        Ok(self.plan_documents.get(id).await)
    }

    async fn find(&self, query: &PlanDocumentQuery, page: &PageRequest) -> StoreResult<Page<PlanDocument>> {
        Ok(self.plan_documents.page(page, |p| query.matches(p)).await)
    }

    async fn update_body(&self, id: &str, body: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .plan_documents
            .update(id, |p| {
                p.body = body.to_string();
                p.updated_at = at;
            })
            .await)
    }

    async fn update_description(&self, id: &str, description: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .plan_documents
            .update(id, |p| {
                p.description = description.to_string();
                p.updated_at = at;
            })
            .await)
    }

    async fn set_status(&self, id: &str, status: PlanStatus, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .plan_documents
            .update(id, |p| {
                p.status = status;
                p.updated_at = at;
            })
            .await)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.plan_documents.remove(id).await)
    }
}

#[async_trait]
impl PlanDocumentEventRepository for MemoryStore {
    async fn create(&self, event: PlanDocumentEvent) -> StoreResult<PlanDocumentEvent> {
        self.plan_document_events.insert(event, no_conflict).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocumentEvent>> {
        Ok(self.plan_document_events.get(id).await)
    }

    async fn find_by_plan_document(
        &self,
        plan_document_id: &str,
        page: &PageRequest,
    ) -> StoreResult<Page<PlanDocumentEvent>> {
        Ok(self
            .plan_document_events
            .page(page, |e| e.plan_document_id == plan_document_id)
            .await)
    }

    async fn plan_document_ids_by_user_ids(&self, user_ids: &[String]) -> StoreResult<Vec<String>> {
        let ids: BTreeSet<String> = self
            .plan_document_events
            .filter(|e| e.user_id.as_ref().map_or(false, |u| user_ids.contains(u)))
            .await
            .into_iter()
            .map(|e| e.plan_document_id)
            .collect();
        Ok(ids.into_iter().collect())
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        self.users
            .insert(user, |existing, new| {
                (existing.email == normalize_email(&new.email))
                    .then(|| format!("email {}", new.email))
            })
            .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.users.get(id).await)
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = normalize_email(email);
        Ok(self.users.find(|u| u.email == email).await)
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<User>> {
        Ok(self.users.page(page, |_| true).await)
    }

    async fn update_display_name(&self, id: &str, display_name: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .users
            .update(id, |u| {
                u.display_name = display_name.to_string();
                u.updated_at = at;
            })
            .await)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.users.remove(id).await)
    }
}

#[async_trait]
impl ApiKeyRepository for MemoryStore {
    async fn create(&self, key: ApiKey) -> StoreResult<ApiKey> {
        self.api_keys
            .insert(key, |existing, new| {
                (existing.key_hash == new.key_hash).then(|| "key hash".to_string())
            })
            .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<ApiKey>> {
        Ok(self.api_keys.get(id).await)
    }

    async fn find_by_key_hash(&self, key_hash: &str) -> StoreResult<Option<ApiKey>> {
        Ok(self.api_keys.find(|k| k.key_hash == key_hash).await)
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<ApiKey>> {
        let mut keys = self.api_keys.filter(|k| k.user_id == user_id).await;
        keys.sort_by(|a, b| newest_first(a, b, Default::default()));
        Ok(keys)
    }

    async fn update_last_used_at(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self.api_keys.update(id, |k| k.last_used_at = Some(at)).await)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.api_keys.remove(id).await)
    }
}

#[async_trait]
impl WebSessionRepository for MemoryStore {
    async fn create(&self, session: WebSession) -> StoreResult<WebSession> {
        self.web_sessions.insert(session, no_conflict).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WebSession>> {
        Ok(self.web_sessions.get(id).await)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.web_sessions.remove(id).await)
    }

    async fn delete_by_user(&self, user_id: &str) -> StoreResult<u64> {
        Ok(self.web_sessions.remove_where(|s| s.user_id == user_id).await)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        Ok(self.web_sessions.remove_where(|s| s.is_expired(now)).await)
    }
}

#[async_trait]
impl PasswordCredentialRepository for MemoryStore {
    async fn upsert(&self, mut credential: PasswordCredential) -> StoreResult<PasswordCredential> {
        if credential.user_id.is_empty() {
            return Err(StoreError::Validation("password credential without user".to_string()));
        }
        let now = Utc::now();
        credential.updated_at = now;
        let mut rows = self.password_credentials.rows.write().await;
        credential.created_at = match rows.get(&credential.user_id) {
            Some(existing) => existing.created_at,
            None => now,
        };
        rows.insert(credential.user_id.clone(), credential.clone());
        Ok(credential)
    }

    async fn find_by_user_id(&self, user_id: &str) -> StoreResult<Option<PasswordCredential>> {
        Ok(self.password_credentials.get(user_id).await)
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        Ok(self.password_credentials.remove(user_id).await)
    }
}

#[async_trait]
impl OAuthConnectionRepository for MemoryStore {
    async fn create(&self, connection: OAuthConnection) -> StoreResult<OAuthConnection> {
        self.oauth_connections
            .insert(connection, |existing, new| {
                (existing.provider == new.provider
                    && existing.provider_user_id == new.provider_user_id)
                    .then(|| format!("identity {} {}", new.provider, new.provider_user_id))
            })
            .await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<OAuthConnection>> {
        Ok(self.oauth_connections.get(id).await)
    }

    async fn find_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> StoreResult<Option<OAuthConnection>> {
        Ok(self
            .oauth_connections
            .find(|c| c.provider == provider && c.provider_user_id == provider_user_id)
            .await)
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<OAuthConnection>> {
        let mut connections = self.oauth_connections.filter(|c| c.user_id == user_id).await;
        connections.sort_by(|a, b| newest_first(a, b, Default::default()));
        Ok(connections)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.oauth_connections.remove(id).await)
    }
}

#[async_trait]
impl UserFavoriteRepository for MemoryStore {
    async fn create(&self, favorite: UserFavorite) -> StoreResult<UserFavorite> {
        self.favorites
            .insert(favorite, |existing, new| {
                (existing.user_id == new.user_id
                    && existing.target_type == new.target_type
                    && existing.target_id == new.target_id)
                    .then(|| format!("target {} {} {}", new.user_id, new.target_type, new.target_id))
            })
            .await
    }

    async fn find(
        &self,
        user_id: &str,
        target_type: FavoriteTargetType,
        target_id: &str,
    ) -> StoreResult<Option<UserFavorite>> {
        Ok(self
            .favorites
            .find(|f| f.user_id == user_id && f.target_type == target_type && f.target_id == target_id)
            .await)
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        target_type: Option<FavoriteTargetType>,
        page: &PageRequest,
    ) -> StoreResult<Page<UserFavorite>> {
        Ok(self
            .favorites
            .page(page, |f| {
                f.user_id == user_id && target_type.map_or(true, |t| f.target_type == t)
            })
            .await)
    }

    async fn remove(
        &self,
        user_id: &str,
        target_type: FavoriteTargetType,
        target_id: &str,
    ) -> StoreResult<bool> {
        let removed = self
            .favorites
            .remove_where(|f| {
                f.user_id == user_id && f.target_type == target_type && f.target_id == target_id
            })
            .await;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_event_uuid_is_unique_per_session_only() {
        let store = MemoryStore::new();
        let event = |session: &str| Event::new(session, "PreToolUse", "Bash", json!({})).with_uuid("u-1");

        EventRepository::create(&store, event("s1")).await.unwrap();
        EventRepository::create(&store, event("s2")).await.unwrap();
        let err = EventRepository::create(&store, event("s1")).await.unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.count_by_session("s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_events_without_uuid_never_conflict() {
        let store = MemoryStore::new();
        for _ in 0..3 {
            EventRepository::create(&store, Event::new("s1", "Stop", "", json!(null)))
                .await
                .unwrap();
        }
        assert_eq!(store.count_by_session("s1").await.unwrap(), 3);
        assert_eq!(store.delete_by_session("s1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_password_upsert_keeps_created_at() {
        let store = MemoryStore::new();
        let first = store.upsert(PasswordCredential::new("u1", "h1")).await.unwrap();
        let second = store.upsert(PasswordCredential::new("u1", "h2")).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(
            store.find_by_user_id("u1").await.unwrap().unwrap().password_hash,
            "h2"
        );
        assert!(store.upsert(PasswordCredential::new("", "h")).await.is_err());
    }
}
