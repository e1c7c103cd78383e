//! Relational store shared by SQLite, Postgres and MySQL
//!
//! All query logic lives here once; [`SqlExecutor`] implementations only
//! differ in how statements reach the database.

mod dialect;
mod entity;
mod executor;
mod schema;

pub use dialect::{Condition, Dialect, SqlValue, Statement};
pub use executor::{AnyExecutor, SqlExecutor, SqliteExecutor};
pub use schema::{TableSpec, ALL_TABLES};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    normalize_email, prepare, to_nanos, ApiKey, Event, FavoriteTargetType, OAuthConnection,
    PasswordCredential, PlanDocument, PlanDocumentEvent, PlanDocumentQuery, PlanStatus, Project,
    Record, Session, User, UserFavorite, WebSession,
};
use crate::repository::{
    guard_default_project, ApiKeyRepository, EventRepository, OAuthConnectionRepository, Page,
    PageRequest, PasswordCredentialRepository, PlanDocumentEventRepository,
    PlanDocumentRepository, ProjectRepository, SessionRepository, UserFavoriteRepository,
    UserRepository, WebSessionRepository,
};
use entity::{SqlEntity, SqlRow};
use schema::{
    API_KEYS, COUNT_COLUMN, EVENTS, OAUTH_CONNECTIONS, PASSWORD_CREDENTIALS, PLAN_DOCUMENTS,
    PLAN_DOCUMENT_EVENTS, PLAN_ID_COLUMN, PROJECTS, SESSIONS, USERS, USER_FAVORITES, WEB_SESSIONS,
};

fn eq(column: &'static str, value: SqlValue) -> Condition {
    Condition::Eq(column, value)
}

fn text(value: &str) -> SqlValue {
    SqlValue::text(value)
}

fn check_row(table: &TableSpec, dialect: Dialect, values: &[SqlValue]) -> StoreResult<()> {
    table.check_lengths(dialect, table.columns.iter().map(|c| c.name).zip(values))
}

fn nanos(at: DateTime<Utc>) -> StoreResult<SqlValue> {
    Ok(SqlValue::int(to_nanos(at)?))
}

pub struct SqlStore<E> {
    exec: E,
}

impl<E: SqlExecutor> SqlStore<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }

    pub fn executor(&self) -> &E {
        &self.exec
    }

    /// Create every table and index that does not exist yet.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        let dialect = self.exec.dialect();
        for table in ALL_TABLES {
            for ddl in table.ddl(dialect) {
                let mut stmt = self.exec.statement();
                stmt.push(&ddl);
                self.exec.execute(stmt).await?;
            }
        }
        info!(dialect = dialect.name(), tables = ALL_TABLES.len(), "schema ensured");
        Ok(())
    }

    async fn insert<T: SqlEntity>(&self, mut record: T) -> StoreResult<T> {
        prepare(&mut record, Utc::now());
        let table = T::table();
        let values = record.to_values()?;
        check_row(table, self.exec.dialect(), &values)?;
        let mut stmt = self.exec.statement();
        stmt.push("INSERT INTO ")
            .push(table.name)
            .push(" (")
            .push(&table.column_list())
            .push(") VALUES (")
            .push_binds(values)
            .push(")");
        self.exec.execute(stmt).await.map_err(|err| match err {
            StoreError::Duplicate(detail) => {
                StoreError::Duplicate(format!("{} ({})", T::KIND, detail))
            }
            other => other,
        })?;
        debug!(kind = T::KIND, id = record.id(), "inserted");
        Ok(record)
    }

    fn select<T: SqlEntity>(&self, conditions: &[Condition]) -> StoreResult<Statement> {
        let table = T::table();
        let mut stmt = self.exec.statement();
        stmt.push("SELECT ")
            .push(&table.column_list())
            .push(" FROM ")
            .push(table.name)
            .push_where(conditions)?;
        Ok(stmt)
    }

    async fn rows<T: SqlEntity>(&self, stmt: Statement) -> StoreResult<Vec<T>> {
        self.exec
            .query(stmt, T::table().columns)
            .await?
            .iter()
            .map(T::from_row)
            .collect()
    }

    async fn find_one<T: SqlEntity>(&self, conditions: &[Condition]) -> StoreResult<Option<T>> {
        let mut stmt = self.select::<T>(conditions)?;
        stmt.push(" LIMIT 1");
        Ok(self.rows(stmt).await?.into_iter().next())
    }

    async fn find_by_key<T: SqlEntity>(&self, id: &str) -> StoreResult<Option<T>> {
        self.find_one(&[eq(T::table().primary_key, text(id))]).await
    }

    /// Every matching row, newest first.
    async fn find_many<T: SqlEntity>(&self, conditions: &[Condition]) -> StoreResult<Vec<T>> {
        let mut stmt = self.select::<T>(conditions)?;
        stmt.push(" ORDER BY created_at DESC, id DESC");
        self.rows(stmt).await
    }

    async fn find_page<T: SqlEntity>(
        &self,
        mut conditions: Vec<Condition>,
        page: &PageRequest,
    ) -> StoreResult<Page<T>> {
        let column = T::sort_key(page.sort_by);
        if let Some(cursor) = page.decoded_cursor() {
            conditions.push(Condition::After(column, cursor));
        }
        let mut stmt = self.select::<T>(&conditions)?;
        stmt.push(" ORDER BY ")
            .push(column)
            .push(" DESC, id DESC LIMIT ")
            .push(&page.fetch_limit().to_string());
        Ok(Page::from_overfetch(self.rows(stmt).await?, page))
    }

    async fn count(&self, table: &TableSpec, conditions: &[Condition]) -> StoreResult<u64> {
        let mut stmt = self.exec.statement();
        stmt.push("SELECT COUNT(*) AS n FROM ")
            .push(table.name)
            .push_where(conditions)?;
        let rows = self.exec.query(stmt, &COUNT_COLUMN).await?;
        let n = match rows.first() {
            Some(row) => row.int("n")?,
            None => 0,
        };
        Ok(n.max(0) as u64)
    }

    async fn exists(&self, table: &TableSpec, id: &str) -> StoreResult<bool> {
        Ok(self.count(table, &[eq(table.primary_key, text(id))]).await? > 0)
    }

    async fn update_where(
        &self,
        table: &TableSpec,
        sets: Vec<(&'static str, SqlValue)>,
        conditions: &[Condition],
    ) -> StoreResult<u64> {
        let touched = sets.iter().map(|(column, value)| (*column, value));
        table.check_lengths(self.exec.dialect(), touched)?;
        let mut stmt = self.exec.statement();
        stmt.push("UPDATE ").push(table.name).push(" SET ");
        for (i, (column, value)) in sets.into_iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push(column).push(" = ").push_bind(value);
        }
        stmt.push_where(conditions)?;
        self.exec.execute(stmt).await
    }

    /// Update one row by primary key; false when it does not exist.
    async fn update_row(
        &self,
        table: &TableSpec,
        id: &str,
        sets: Vec<(&'static str, SqlValue)>,
    ) -> StoreResult<bool> {
        let changed = self
            .update_where(table, sets, &[eq(table.primary_key, text(id))])
            .await?;
        if changed > 0 {
            return Ok(true);
        }
        // MySQL reports changed rather than matched rows
        self.exists(table, id).await
    }

    async fn delete_where(&self, table: &TableSpec, conditions: &[Condition]) -> StoreResult<u64> {
        let mut stmt = self.exec.statement();
        stmt.push("DELETE FROM ").push(table.name).push_where(conditions)?;
        let removed = self.exec.execute(stmt).await?;
        debug!(table = table.name, removed, "deleted");
        Ok(removed)
    }

    async fn delete_row(&self, table: &TableSpec, id: &str) -> StoreResult<bool> {
        Ok(self
            .delete_where(table, &[eq(table.primary_key, text(id))])
            .await?
            > 0)
    }
}

fn plan_conditions(query: &PlanDocumentQuery) -> Vec<Condition> {
    let mut conditions = Vec::new();
    if !query.statuses.is_empty() {
        conditions.push(Condition::In(
            "status",
            query.statuses.iter().map(|s| text(s.as_str())).collect(),
        ));
    }
    if let Some(project_id) = &query.project_id {
        conditions.push(eq("project_id", text(project_id)));
    }
    if let Some(ids) = &query.ids {
        conditions.push(Condition::In("id", ids.iter().map(|id| text(id)).collect()));
    }
    if let Some(needle) = query.needle() {
        conditions.push(Condition::Contains("description", needle));
    }
    conditions
}

#[async_trait]
impl<E: SqlExecutor> ProjectRepository for SqlStore<E> {
    async fn create(&self, project: Project) -> StoreResult<Project> {
        self.insert(project).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Project>> {
        self.find_by_key(id).await
    }

    async fn find_by_canonical_git_repository(&self, canonical: &str) -> StoreResult<Option<Project>> {
        self.find_one(&[eq("canonical_git_url", text(canonical))]).await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Project>> {
        self.find_page(Vec::new(), page).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        guard_default_project(id)?;
        self.delete_row(&PROJECTS, id).await
    }
}

#[async_trait]
impl<E: SqlExecutor> SessionRepository for SqlStore<E> {
    async fn create(&self, session: Session) -> StoreResult<Session> {
        self.insert(session).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Session>> {
        self.find_by_key(id).await
    }

    async fn find_by_claude_session_id(&self, claude_session_id: &str) -> StoreResult<Option<Session>> {
        self.find_one(&[eq("claude_session_id", text(claude_session_id))]).await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.find_page(Vec::new(), page).await
    }

    async fn find_by_project(&self, project_id: &str, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.find_page(vec![eq("project_id", text(project_id))], page).await
    }

    async fn find_by_user(&self, user_id: &str, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.find_page(vec![eq("user_id", text(user_id))], page).await
    }

    async fn update_title(&self, id: &str, title: Option<String>) -> StoreResult<bool> {
        self.update_row(&SESSIONS, id, vec![("title", SqlValue::Text(title))]).await
    }

    async fn assign_user(&self, id: &str, user_id: Option<String>) -> StoreResult<bool> {
        self.update_row(&SESSIONS, id, vec![("user_id", SqlValue::Text(user_id))]).await
    }

    async fn touch(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let at = nanos(at)?;
        let changed = self
            .update_where(
                &SESSIONS,
                vec![("updated_at", at.clone())],
                &[eq("id", text(id)), Condition::Lt("updated_at", at)],
            )
            .await?;
        if changed > 0 {
            return Ok(true);
        }
        self.exists(&SESSIONS, id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_row(&SESSIONS, id).await
    }
}

#[async_trait]
impl<E: SqlExecutor> EventRepository for SqlStore<E> {
    async fn create(&self, event: Event) -> StoreResult<Event> {
        if let Some(uuid) = &event.uuid {
            if self.find_by_session_and_uuid(&event.session_id, uuid).await?.is_some() {
                return Err(StoreError::Duplicate(format!(
                    "event uuid {} in session {}",
                    uuid, event.session_id
                )));
            }
        }
        let event = self.insert(event).await?;
        SessionRepository::touch(self, &event.session_id, event.created_at).await?;
        Ok(event)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Event>> {
        self.find_by_key(id).await
    }

    async fn find_by_session_and_uuid(&self, session_id: &str, uuid: &str) -> StoreResult<Option<Event>> {
        self.find_one(&[eq("session_id", text(session_id)), eq("uuid", text(uuid))])
            .await
    }

    async fn find_by_session(&self, session_id: &str, page: &PageRequest) -> StoreResult<Page<Event>> {
        self.find_page(vec![eq("session_id", text(session_id))], page).await
    }

    async fn count_by_session(&self, session_id: &str) -> StoreResult<u64> {
        self.count(&EVENTS, &[eq("session_id", text(session_id))]).await
    }

    async fn delete_by_session(&self, session_id: &str) -> StoreResult<u64> {
        self.delete_where(&EVENTS, &[eq("session_id", text(session_id))]).await
    }
}

#[async_trait]
impl<E: SqlExecutor> PlanDocumentRepository for SqlStore<E> {
    async fn create(&self, plan: PlanDocument) -> StoreResult<PlanDocument> {
        self.insert(plan).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocument>> {
        self.find_by_key(id).await
    }

    async fn find(&self, query: &PlanDocumentQuery, page: &PageRequest) -> StoreResult<Page<PlanDocument>> {
        self.find_page(plan_conditions(query), page).await
    }

    async fn update_body(&self, id: &str, body: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update_row(
            &PLAN_DOCUMENTS,
            id,
            vec![("body", text(body)), ("updated_at", nanos(at)?)],
        )
        .await
    }

    async fn update_description(&self, id: &str, description: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update_row(
            &PLAN_DOCUMENTS,
            id,
            vec![("description", text(description)), ("updated_at", nanos(at)?)],
        )
        .await
    }

    async fn set_status(&self, id: &str, status: PlanStatus, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update_row(
            &PLAN_DOCUMENTS,
            id,
            vec![("status", text(status.as_str())), ("updated_at", nanos(at)?)],
        )
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_row(&PLAN_DOCUMENTS, id).await
    }
}

#[async_trait]
impl<E: SqlExecutor> PlanDocumentEventRepository for SqlStore<E> {
    async fn create(&self, event: PlanDocumentEvent) -> StoreResult<PlanDocumentEvent> {
        self.insert(event).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocumentEvent>> {
        self.find_by_key(id).await
    }

    async fn find_by_plan_document(
        &self,
        plan_document_id: &str,
        page: &PageRequest,
    ) -> StoreResult<Page<PlanDocumentEvent>> {
        self.find_page(vec![eq("plan_document_id", text(plan_document_id))], page)
            .await
    }

    async fn plan_document_ids_by_user_ids(&self, user_ids: &[String]) -> StoreResult<Vec<String>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.exec.statement();
        stmt.push("SELECT DISTINCT plan_document_id FROM ")
            .push(PLAN_DOCUMENT_EVENTS.name)
            .push_where(&[Condition::In("user_id", user_ids.iter().map(|u| text(u)).collect())])?
            .push(" ORDER BY plan_document_id");
        self.exec
            .query(stmt, &PLAN_ID_COLUMN)
            .await?
            .iter()
            .map(|row: &SqlRow| row.text("plan_document_id"))
            .collect()
    }
}

#[async_trait]
impl<E: SqlExecutor> UserRepository for SqlStore<E> {
    async fn create(&self, user: User) -> StoreResult<User> {
        self.insert(user).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.find_by_key(id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one(&[eq("email", SqlValue::text(normalize_email(email)))])
            .await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<User>> {
        self.find_page(Vec::new(), page).await
    }

    async fn update_display_name(&self, id: &str, display_name: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update_row(
            &USERS,
            id,
            vec![("display_name", text(display_name)), ("updated_at", nanos(at)?)],
        )
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_row(&USERS, id).await
    }
}

#[async_trait]
impl<E: SqlExecutor> ApiKeyRepository for SqlStore<E> {
    async fn create(&self, key: ApiKey) -> StoreResult<ApiKey> {
        self.insert(key).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<ApiKey>> {
        self.find_by_key(id).await
    }

    async fn find_by_key_hash(&self, key_hash: &str) -> StoreResult<Option<ApiKey>> {
        self.find_one(&[eq("key_hash", text(key_hash))]).await
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<ApiKey>> {
        self.find_many(&[eq("user_id", text(user_id))]).await
    }

    async fn update_last_used_at(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update_row(&API_KEYS, id, vec![("last_used_at", nanos(at)?)]).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_row(&API_KEYS, id).await
    }
}

#[async_trait]
impl<E: SqlExecutor> WebSessionRepository for SqlStore<E> {
    async fn create(&self, session: WebSession) -> StoreResult<WebSession> {
        self.insert(session).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WebSession>> {
        self.find_by_key(id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_row(&WEB_SESSIONS, id).await
    }

    async fn delete_by_user(&self, user_id: &str) -> StoreResult<u64> {
        self.delete_where(&WEB_SESSIONS, &[eq("user_id", text(user_id))]).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.delete_where(&WEB_SESSIONS, &[Condition::Le("expires_at", nanos(now)?)])
            .await
    }
}

#[async_trait]
impl<E: SqlExecutor> PasswordCredentialRepository for SqlStore<E> {
    async fn upsert(&self, mut credential: PasswordCredential) -> StoreResult<PasswordCredential> {
        if credential.user_id.is_empty() {
            return Err(StoreError::Validation("password credential without user".to_string()));
        }
        let now = Utc::now();
        credential.created_at = now;
        credential.updated_at = now;

        let table = &PASSWORD_CREDENTIALS;
        let values = credential.to_values()?;
        check_row(table, self.exec.dialect(), &values)?;
        let mut stmt = self.exec.statement();
        stmt.push("INSERT INTO ")
            .push(table.name)
            .push(" (")
            .push(&table.column_list())
            .push(") VALUES (")
            .push_binds(values)
            .push(")")
            .push(
                &self
                    .exec
                    .dialect()
                    .upsert_clause(table.primary_key, &["password_hash", "updated_at"]),
            );
        self.exec.execute(stmt).await?;

        let user_id = credential.user_id.clone();
        Ok(self.find_by_user_id(&user_id).await?.unwrap_or(credential))
    }

    async fn find_by_user_id(&self, user_id: &str) -> StoreResult<Option<PasswordCredential>> {
        self.find_by_key(user_id).await
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        self.delete_row(&PASSWORD_CREDENTIALS, user_id).await
    }
}

#[async_trait]
impl<E: SqlExecutor> OAuthConnectionRepository for SqlStore<E> {
    async fn create(&self, connection: OAuthConnection) -> StoreResult<OAuthConnection> {
        self.insert(connection).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<OAuthConnection>> {
        self.find_by_key(id).await
    }

    async fn find_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> StoreResult<Option<OAuthConnection>> {
        self.find_one(&[
            eq("provider", text(provider)),
            eq("provider_user_id", text(provider_user_id)),
        ])
        .await
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<OAuthConnection>> {
        self.find_many(&[eq("user_id", text(user_id))]).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_row(&OAUTH_CONNECTIONS, id).await
    }
}

fn favorite_key(user_id: &str, target_type: FavoriteTargetType, target_id: &str) -> [Condition; 3] {
    [
        eq("user_id", text(user_id)),
        eq("target_type", text(target_type.as_str())),
        eq("target_id", text(target_id)),
    ]
}

#[async_trait]
impl<E: SqlExecutor> UserFavoriteRepository for SqlStore<E> {
    async fn create(&self, favorite: UserFavorite) -> StoreResult<UserFavorite> {
        self.insert(favorite).await
    }

    async fn find(
        &self,
        user_id: &str,
        target_type: FavoriteTargetType,
        target_id: &str,
    ) -> StoreResult<Option<UserFavorite>> {
        self.find_one(&favorite_key(user_id, target_type, target_id)).await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        target_type: Option<FavoriteTargetType>,
        page: &PageRequest,
    ) -> StoreResult<Page<UserFavorite>> {
        let mut conditions = vec![eq("user_id", text(user_id))];
        if let Some(target_type) = target_type {
            conditions.push(eq("target_type", text(target_type.as_str())));
        }
        self.find_page(conditions, page).await
    }

    async fn remove(
        &self,
        user_id: &str,
        target_type: FavoriteTargetType,
        target_id: &str,
    ) -> StoreResult<bool> {
        let removed = self
            .delete_where(&USER_FAVORITES, &favorite_key(user_id, target_type, target_id))
            .await?;
        Ok(removed > 0)
    }
}
