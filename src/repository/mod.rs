//! Repository contracts
//!
//! One async trait per entity family. Every backend implements all of them on a
//! single store value; [`Repositories`] bundles that value behind trait objects.
//! Find-or-create logic lives here as default methods so the duplicate race is
//! settled the same way everywhere.

pub mod factory;
mod page;

pub use factory::{open, BackendKind};
pub use page::{newest_first, paginate, Page, PageRequest, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    canonicalize_git_remote, ApiKey, Event, FavoriteTargetType, OAuthConnection,
    PasswordCredential, PlanDocument, PlanDocumentEvent, PlanDocumentQuery, PlanStatus, Project,
    Record, Session, User, UserFavorite, WebSession, DEFAULT_PROJECT_ID,
};

/// Resolve a lost create race: the natural key was taken between our lookup
/// and our insert, so the row read back afterwards is the winner.
fn settle_race<T: Record>(key: &str, winner: Option<T>, err: StoreError) -> StoreResult<T> {
    match winner {
        Some(found) => {
            tracing::warn!(kind = T::KIND, key, "concurrent create, using existing row");
            Ok(found)
        }
        None => Err(err),
    }
}

/// Refuse operations that would remove the sentinel project.
pub(crate) fn guard_default_project(id: &str) -> StoreResult<()> {
    if id == DEFAULT_PROJECT_ID {
        return Err(StoreError::Validation(
            "default project cannot be deleted".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn create(&self, project: Project) -> StoreResult<Project>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Project>>;

    /// Look up by an already canonical url.
    async fn find_by_canonical_git_repository(&self, canonical: &str)
        -> StoreResult<Option<Project>>;

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Project>>;

    /// Deleting the default project is rejected.
    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// The sentinel project, created on first use.
    async fn default_project(&self) -> StoreResult<Project> {
        if let Some(found) = self.find_by_id(DEFAULT_PROJECT_ID).await? {
            return Ok(found);
        }
        match self.create(Project::default_project()).await {
            Err(err) if err.is_duplicate() => {
                settle_race(DEFAULT_PROJECT_ID, self.find_by_id(DEFAULT_PROJECT_ID).await?, err)
            }
            other => other,
        }
    }

    /// Project for a raw remote url; blank urls map to the default project.
    async fn find_or_create_by_canonical_git_repository(&self, remote: &str) -> StoreResult<Project> {
        let canonical = canonicalize_git_remote(remote);
        if canonical.is_empty() {
            return self.default_project().await;
        }
        if let Some(found) = self.find_by_canonical_git_repository(&canonical).await? {
            return Ok(found);
        }
        match self.create(Project::new(&canonical)).await {
            Err(err) if err.is_duplicate() => settle_race(
                &canonical,
                self.find_by_canonical_git_repository(&canonical).await?,
                err,
            ),
            other => other,
        }
    }
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: Session) -> StoreResult<Session>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Session>>;

    async fn find_by_claude_session_id(&self, claude_session_id: &str)
        -> StoreResult<Option<Session>>;

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Session>>;

    async fn find_by_project(&self, project_id: &str, page: &PageRequest)
        -> StoreResult<Page<Session>>;

    async fn find_by_user(&self, user_id: &str, page: &PageRequest) -> StoreResult<Page<Session>>;

    async fn update_title(&self, id: &str, title: Option<String>) -> StoreResult<bool>;

    async fn assign_user(&self, id: &str, user_id: Option<String>) -> StoreResult<bool>;

    /// Advance `updated_at` to `at` unless it is already later.
    async fn touch(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;

    /// Existing session for `template.claude_session_id`, or `template` stored.
    async fn find_or_create_by_claude_session_id(&self, template: Session) -> StoreResult<Session> {
        let key = template.claude_session_id.clone();
        if let Some(found) = self.find_by_claude_session_id(&key).await? {
            return Ok(found);
        }
        match self.create(template).await {
            Err(err) if err.is_duplicate() => {
                settle_race(&key, self.find_by_claude_session_id(&key).await?, err)
            }
            other => other,
        }
    }
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Append an event and advance its session's `updated_at`.
    ///
    /// A second event with the same `(session_id, uuid)` fails with
    /// [`StoreError::Duplicate`].
    async fn create(&self, event: Event) -> StoreResult<Event>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Event>>;

    async fn find_by_session_and_uuid(&self, session_id: &str, uuid: &str)
        -> StoreResult<Option<Event>>;

    async fn find_by_session(&self, session_id: &str, page: &PageRequest)
        -> StoreResult<Page<Event>>;

    async fn count_by_session(&self, session_id: &str) -> StoreResult<u64>;

    async fn delete_by_session(&self, session_id: &str) -> StoreResult<u64>;
}

#[async_trait]
pub trait PlanDocumentRepository: Send + Sync {
    async fn create(&self, plan: PlanDocument) -> StoreResult<PlanDocument>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocument>>;

    async fn find(&self, query: &PlanDocumentQuery, page: &PageRequest)
        -> StoreResult<Page<PlanDocument>>;

    async fn update_body(&self, id: &str, body: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn update_description(&self, id: &str, description: &str, at: DateTime<Utc>)
        -> StoreResult<bool>;

    async fn set_status(&self, id: &str, status: PlanStatus, at: DateTime<Utc>)
        -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait PlanDocumentEventRepository: Send + Sync {
    async fn create(&self, event: PlanDocumentEvent) -> StoreResult<PlanDocumentEvent>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocumentEvent>>;

    async fn find_by_plan_document(&self, plan_document_id: &str, page: &PageRequest)
        -> StoreResult<Page<PlanDocumentEvent>>;

    /// Distinct plan ids any of `user_ids` changed, ascending.
    async fn plan_document_ids_by_user_ids(&self, user_ids: &[String]) -> StoreResult<Vec<String>>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> StoreResult<User>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>>;

    /// Lookup by email; the argument is normalized first.
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<User>>;

    async fn update_display_name(&self, id: &str, display_name: &str, at: DateTime<Utc>)
        -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;

    async fn find_or_create_by_email(&self, email: &str, display_name: &str) -> StoreResult<User> {
        let template = User::new(email, display_name);
        let key = template.email.clone();
        if let Some(found) = self.find_by_email(&key).await? {
            return Ok(found);
        }
        match self.create(template).await {
            Err(err) if err.is_duplicate() => {
                settle_race(&key, self.find_by_email(&key).await?, err)
            }
            other => other,
        }
    }
}

#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    async fn create(&self, key: ApiKey) -> StoreResult<ApiKey>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<ApiKey>>;

    async fn find_by_key_hash(&self, key_hash: &str) -> StoreResult<Option<ApiKey>>;

    /// All keys of a user, newest first.
    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<ApiKey>>;

    async fn update_last_used_at(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait WebSessionRepository: Send + Sync {
    async fn create(&self, session: WebSession) -> StoreResult<WebSession>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WebSession>>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;

    async fn delete_by_user(&self, user_id: &str) -> StoreResult<u64>;

    /// Remove every session with `expires_at <= now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64>;
}

#[async_trait]
pub trait PasswordCredentialRepository: Send + Sync {
    /// Insert or replace the hash; `created_at` of an existing row is kept.
    async fn upsert(&self, credential: PasswordCredential) -> StoreResult<PasswordCredential>;

    async fn find_by_user_id(&self, user_id: &str) -> StoreResult<Option<PasswordCredential>>;

    async fn delete(&self, user_id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait OAuthConnectionRepository: Send + Sync {
    async fn create(&self, connection: OAuthConnection) -> StoreResult<OAuthConnection>;

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<OAuthConnection>>;

    async fn find_by_provider_identity(&self, provider: &str, provider_user_id: &str)
        -> StoreResult<Option<OAuthConnection>>;

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<OAuthConnection>>;

    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait UserFavoriteRepository: Send + Sync {
    async fn create(&self, favorite: UserFavorite) -> StoreResult<UserFavorite>;

    async fn find(&self, user_id: &str, target_type: FavoriteTargetType, target_id: &str)
        -> StoreResult<Option<UserFavorite>>;

    async fn list_by_user(
        &self,
        user_id: &str,
        target_type: Option<FavoriteTargetType>,
        page: &PageRequest,
    ) -> StoreResult<Page<UserFavorite>>;

    async fn remove(&self, user_id: &str, target_type: FavoriteTargetType, target_id: &str)
        -> StoreResult<bool>;

    /// Idempotent add: an existing favorite is returned unchanged.
    async fn add(&self, favorite: UserFavorite) -> StoreResult<UserFavorite> {
        let (user_id, target_type, target_id) = (
            favorite.user_id.clone(),
            favorite.target_type,
            favorite.target_id.clone(),
        );
        if let Some(found) = self.find(&user_id, target_type, &target_id).await? {
            return Ok(found);
        }
        match self.create(favorite).await {
            Err(err) if err.is_duplicate() => settle_race(
                &target_id,
                self.find(&user_id, target_type, &target_id).await?,
                err,
            ),
            other => other,
        }
    }
}

/// A store implementing every contract.
pub trait RepositorySet:
    ProjectRepository
    + SessionRepository
    + EventRepository
    + PlanDocumentRepository
    + PlanDocumentEventRepository
    + UserRepository
    + ApiKeyRepository
    + WebSessionRepository
    + PasswordCredentialRepository
    + OAuthConnectionRepository
    + UserFavoriteRepository
    + 'static
{
}

impl<T> RepositorySet for T where
    T: ProjectRepository
        + SessionRepository
        + EventRepository
        + PlanDocumentRepository
        + PlanDocumentEventRepository
        + UserRepository
        + ApiKeyRepository
        + WebSessionRepository
        + PasswordCredentialRepository
        + OAuthConnectionRepository
        + UserFavoriteRepository
        + 'static
{
}

/// Every repository of one backend, opened once per process.
#[derive(Clone)]
pub struct Repositories {
    pub backend: BackendKind,
    pub projects: Arc<dyn ProjectRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub events: Arc<dyn EventRepository>,
    pub plan_documents: Arc<dyn PlanDocumentRepository>,
    pub plan_document_events: Arc<dyn PlanDocumentEventRepository>,
    pub users: Arc<dyn UserRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pub web_sessions: Arc<dyn WebSessionRepository>,
    pub password_credentials: Arc<dyn PasswordCredentialRepository>,
    pub oauth_connections: Arc<dyn OAuthConnectionRepository>,
    pub favorites: Arc<dyn UserFavoriteRepository>,
    timeout: Option<Duration>,
}

impl Repositories {
    pub fn from_store<S: RepositorySet>(backend: BackendKind, store: S) -> Self {
        let store = Arc::new(store);
        Self {
            backend,
            projects: store.clone(),
            sessions: store.clone(),
            events: store.clone(),
            plan_documents: store.clone(),
            plan_document_events: store.clone(),
            users: store.clone(),
            api_keys: store.clone(),
            web_sessions: store.clone(),
            password_credentials: store.clone(),
            oauth_connections: store.clone(),
            favorites: store,
            timeout: None,
        }
    }

    /// Bound every call routed through [`Repositories::deadline`]; `None` disables it.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run a contract call under the configured operation timeout.
    pub async fn deadline<T, F>(&self, call: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, call).await?,
            None => call.await,
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories")
            .field("backend", &self.backend)
            .field("timeout", &self.timeout)
            .finish()
    }
}
