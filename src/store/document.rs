//! MongoDB store
//!
//! One collection per entity. Documents are the serde form of the entity plus
//! `_id` and an Int64 `<field>_ns` mirror of every timestamp that is sorted or
//! compared on, since the serialized timestamps are strings.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::bson::{self, doc, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};
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

const DUPLICATE_KEY: i32 = 11000;

trait MongoEntity: Record {
    const COLLECTION: &'static str;
    /// Timestamp fields mirrored as `<field>_ns`
    const NANOS: &'static [&'static str];
}

macro_rules! mongo_entity {
    ($ty:ty, $collection:literal, [$($field:literal),*]) => {
        impl MongoEntity for $ty {
            const COLLECTION: &'static str = $collection;
            const NANOS: &'static [&'static str] = &[$($field),*];
        }
    };
}

mongo_entity!(Project, "projects", ["created_at"]);
mongo_entity!(Session, "sessions", ["created_at", "updated_at"]);
mongo_entity!(Event, "events", ["created_at"]);
mongo_entity!(PlanDocument, "plan_documents", ["created_at", "updated_at"]);
mongo_entity!(PlanDocumentEvent, "plan_document_events", ["created_at"]);
mongo_entity!(User, "users", ["created_at", "updated_at"]);
mongo_entity!(ApiKey, "api_keys", ["created_at"]);
mongo_entity!(WebSession, "web_sessions", ["created_at", "expires_at"]);
mongo_entity!(PasswordCredential, "password_credentials", ["created_at", "updated_at"]);
mongo_entity!(OAuthConnection, "oauth_connections", ["created_at"]);
mongo_entity!(UserFavorite, "user_favorites", ["created_at"]);

fn ns_field(field: &str) -> String {
    format!("{}_ns", field)
}

/// `{field: <serde form>, field_ns: <nanos>}` for a `$set`.
fn timestamp_fields(field: &str, at: DateTime<Utc>) -> StoreResult<Document> {
    let mut doc = Document::new();
    doc.insert(field, bson::to_bson(&at)?);
    doc.insert(ns_field(field), to_nanos(at)?);
    Ok(doc)
}

fn encode<T: MongoEntity>(record: &T) -> StoreResult<Document> {
    let mut doc = bson::to_document(record)?;
    for field in T::NANOS {
        let nanos = match doc.get(*field) {
            Some(Bson::String(raw)) => {
                let at = DateTime::parse_from_rfc3339(raw)
                    .map_err(|e| StoreError::Backend(format!("{} {}: {}", T::KIND, field, e)))?;
                Bson::Int64(to_nanos(at.with_timezone(&Utc))?)
            }
            _ => Bson::Null,
        };
        doc.insert(ns_field(field), nanos);
    }
    doc.insert("_id", record.id());
    Ok(doc)
}

fn decode<T: MongoEntity>(doc: Document) -> StoreResult<T> {
    Ok(bson::from_document(doc)?)
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY
    )
}

fn strings(values: &[String]) -> Vec<Bson> {
    values.iter().map(|v| Bson::String(v.clone())).collect()
}

fn newest_first(field: &str) -> Document {
    let mut sort = Document::new();
    sort.insert(ns_field(field), -1);
    sort.insert("_id", -1);
    sort
}

fn index(keys: Document, name: &str, unique: bool) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(unique)
                .build(),
        )
        .build()
}

pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        info!(database, "connected to mongodb");
        Ok(Self {
            db: client.database(database),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn collection<T: MongoEntity>(&self) -> Collection<Document> {
        self.db.collection(T::COLLECTION)
    }

    /// Create the unique and listing indexes. Existing indexes are left alone.
    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        let specs: Vec<(&str, Vec<(Document, &str, bool)>)> = vec![
            (
                Project::COLLECTION,
                vec![
                    (doc! {"canonical_git_url": 1}, "uq_canonical_git_url", true),
                    (doc! {"created_at_ns": -1, "_id": -1}, "idx_created", false),
                ],
            ),
            (
                Session::COLLECTION,
                vec![
                    (doc! {"claude_session_id": 1}, "uq_claude_session_id", true),
                    (doc! {"updated_at_ns": -1, "_id": -1}, "idx_updated", false),
                    (doc! {"project_id": 1, "updated_at_ns": -1, "_id": -1}, "idx_project", false),
                    (doc! {"user_id": 1, "updated_at_ns": -1, "_id": -1}, "idx_user", false),
                ],
            ),
            (
                Event::COLLECTION,
                vec![(doc! {"session_id": 1, "created_at_ns": -1, "_id": -1}, "idx_session", false)],
            ),
            (
                PlanDocument::COLLECTION,
                vec![
                    (doc! {"updated_at_ns": -1, "_id": -1}, "idx_updated", false),
                    (doc! {"project_id": 1, "updated_at_ns": -1}, "idx_project", false),
                ],
            ),
            (
                PlanDocumentEvent::COLLECTION,
                vec![
                    (doc! {"plan_document_id": 1, "created_at_ns": -1, "_id": -1}, "idx_plan", false),
                    (doc! {"user_id": 1}, "idx_user", false),
                ],
            ),
            (
                User::COLLECTION,
                vec![(doc! {"email": 1}, "uq_email", true)],
            ),
            (
                ApiKey::COLLECTION,
                vec![
                    (doc! {"key_hash": 1}, "uq_key_hash", true),
                    (doc! {"user_id": 1, "created_at_ns": -1}, "idx_user", false),
                ],
            ),
            (
                WebSession::COLLECTION,
                vec![
                    (doc! {"user_id": 1}, "idx_user", false),
                    (doc! {"expires_at_ns": 1}, "idx_expires", false),
                ],
            ),
            (
                OAuthConnection::COLLECTION,
                vec![
                    (doc! {"provider": 1, "provider_user_id": 1}, "uq_identity", true),
                    (doc! {"user_id": 1}, "idx_user", false),
                ],
            ),
            (
                UserFavorite::COLLECTION,
                vec![(
                    doc! {"user_id": 1, "target_type": 1, "target_id": 1},
                    "uq_target",
                    true,
                )],
            ),
        ];

        for (collection, models) in specs {
            let models: Vec<IndexModel> = models
                .into_iter()
                .map(|(keys, name, unique)| index(keys, name, unique))
                .collect();
            self.db
                .collection::<Document>(collection)
                .create_indexes(models)
                .await?;
        }

        // Events without a uuid must not collide, so the index only covers string uuids
        let event_uuid = IndexModel::builder()
            .keys(doc! {"session_id": 1, "uuid": 1})
            .options(
                IndexOptions::builder()
                    .name("uq_session_uuid".to_string())
                    .unique(true)
                    .partial_filter_expression(doc! {"uuid": {"$type": "string"}})
                    .build(),
            )
            .build();
        self.collection::<Event>().create_index(event_uuid).await?;

        info!("mongodb indexes ensured");
        Ok(())
    }

    async fn insert<T: MongoEntity>(&self, mut record: T) -> StoreResult<T> {
        prepare(&mut record, Utc::now());
        let doc = encode(&record)?;
        match self.collection::<T>().insert_one(doc).await {
            Ok(_) => {
                debug!(kind = T::KIND, id = record.id(), "inserted");
                Ok(record)
            }
            Err(err) if is_duplicate_key(&err) => {
                Err(StoreError::Duplicate(format!("{} ({})", T::KIND, err)))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_one<T: MongoEntity>(&self, filter: Document) -> StoreResult<Option<T>> {
        self.collection::<T>()
            .find_one(filter)
            .await?
            .map(decode)
            .transpose()
    }

    async fn find_by_key<T: MongoEntity>(&self, id: &str) -> StoreResult<Option<T>> {
        self.find_one(doc! {"_id": id}).await
    }

    async fn find_many<T: MongoEntity>(
        &self,
        filter: Document,
        sort: Document,
        limit: Option<i64>,
    ) -> StoreResult<Vec<T>> {
        let coll = self.collection::<T>();
        let mut find = coll.find(filter).sort(sort);
        if let Some(limit) = limit {
            find = find.limit(limit);
        }
        let docs: Vec<Document> = find.await?.try_collect().await?;
        docs.into_iter().map(decode).collect()
    }

    async fn find_page<T: MongoEntity>(
        &self,
        filter: Document,
        page: &PageRequest,
    ) -> StoreResult<Page<T>> {
        let field = T::sort_key(page.sort_by);
        let filter = match page.decoded_cursor() {
            Some(cursor) => {
                let ns = ns_field(field);
                let sv = to_nanos(cursor.sort_value)?;
                let mut older = Document::new();
                older.insert(ns.clone(), doc! {"$lt": sv});
                let mut tied = Document::new();
                tied.insert(ns, sv);
                tied.insert("_id", doc! {"$lt": cursor.id.as_str()});
                doc! {"$and": [filter, {"$or": [older, tied]}]}
            }
            None => filter,
        };
        let rows = self
            .find_many(filter, newest_first(field), Some(page.fetch_limit() as i64))
            .await?;
        Ok(Page::from_overfetch(rows, page))
    }

    /// `$set` on one document; false when it does not exist.
    async fn update_by_id<T: MongoEntity>(&self, id: &str, set: Document) -> StoreResult<bool> {
        let result = self
            .collection::<T>()
            .update_one(doc! {"_id": id}, doc! {"$set": set})
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn count<T: MongoEntity>(&self, filter: Document) -> StoreResult<u64> {
        Ok(self.collection::<T>().count_documents(filter).await?)
    }

    async fn delete_many<T: MongoEntity>(&self, filter: Document) -> StoreResult<u64> {
        let removed = self.collection::<T>().delete_many(filter).await?.deleted_count;
        debug!(collection = T::COLLECTION, removed, "deleted");
        Ok(removed)
    }

    async fn delete_by_id<T: MongoEntity>(&self, id: &str) -> StoreResult<bool> {
        Ok(self.delete_many::<T>(doc! {"_id": id}).await? > 0)
    }
}

fn plan_filter(query: &PlanDocumentQuery) -> Document {
    let mut filter = Document::new();
    if !query.statuses.is_empty() {
        let statuses: Vec<&str> = query.statuses.iter().map(PlanStatus::as_str).collect();
        filter.insert("status", doc! {"$in": statuses});
    }
    if let Some(project_id) = &query.project_id {
        filter.insert("project_id", project_id.as_str());
    }
    if let Some(ids) = &query.ids {
        filter.insert("_id", doc! {"$in": strings(ids)});
    }
    if let Some(needle) = query.needle() {
        filter.insert(
            "description",
            doc! {"$regex": regex::escape(&needle), "$options": "i"},
        );
    }
    filter
}

#[async_trait]
impl ProjectRepository for MongoStore {
    async fn create(&self, project: Project) -> StoreResult<Project> {
        self.insert(project).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Project>> {
        self.find_by_key(id).await
    }

    async fn find_by_canonical_git_repository(&self, canonical: &str) -> StoreResult<Option<Project>> {
        self.find_one(doc! {"canonical_git_url": canonical}).await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Project>> {
        self.find_page(Document::new(), page).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        guard_default_project(id)?;
        self.delete_by_id::<Project>(id).await
    }
}

#[async_trait]
impl SessionRepository for MongoStore {
    async fn create(&self, session: Session) -> StoreResult<Session> {
        self.insert(session).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Session>> {
        self.find_by_key(id).await
    }

    async fn find_by_claude_session_id(&self, claude_session_id: &str) -> StoreResult<Option<Session>> {
        self.find_one(doc! {"claude_session_id": claude_session_id}).await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.find_page(Document::new(), page).await
    }

    async fn find_by_project(&self, project_id: &str, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.find_page(doc! {"project_id": project_id}, page).await
    }

    async fn find_by_user(&self, user_id: &str, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.find_page(doc! {"user_id": user_id}, page).await
    }

    async fn update_title(&self, id: &str, title: Option<String>) -> StoreResult<bool> {
        self.update_by_id::<Session>(id, doc! {"title": title}).await
    }

    async fn assign_user(&self, id: &str, user_id: Option<String>) -> StoreResult<bool> {
        self.update_by_id::<Session>(id, doc! {"user_id": user_id}).await
    }

    async fn touch(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let result = self
            .collection::<Session>()
            .update_one(
                doc! {"_id": id, "updated_at_ns": {"$lt": to_nanos(at)?}},
                doc! {"$set": timestamp_fields("updated_at", at)?},
            )
            .await?;
        if result.matched_count > 0 {
            return Ok(true);
        }
        Ok(self.count::<Session>(doc! {"_id": id}).await? > 0)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<Session>(id).await
    }
}

#[async_trait]
impl EventRepository for MongoStore {
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
        self.find_one(doc! {"session_id": session_id, "uuid": uuid}).await
    }

    async fn find_by_session(&self, session_id: &str, page: &PageRequest) -> StoreResult<Page<Event>> {
        self.find_page(doc! {"session_id": session_id}, page).await
    }

    async fn count_by_session(&self, session_id: &str) -> StoreResult<u64> {
        self.count::<Event>(doc! {"session_id": session_id}).await
    }

    async fn delete_by_session(&self, session_id: &str) -> StoreResult<u64> {
        self.delete_many::<Event>(doc! {"session_id": session_id}).await
    }
}

#[async_trait]
impl PlanDocumentRepository for MongoStore {
    async fn create(&self, plan: PlanDocument) -> StoreResult<PlanDocument> {
        self.insert(plan).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocument>> {
        self.find_by_key(id).await
    }

    async fn find(&self, query: &PlanDocumentQuery, page: &PageRequest) -> StoreResult<Page<PlanDocument>> {
        self.find_page(plan_filter(query), page).await
    }

    async fn update_body(&self, id: &str, body: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut set = timestamp_fields("updated_at", at)?;
        set.insert("body", body);
        self.update_by_id::<PlanDocument>(id, set).await
    }

    async fn update_description(&self, id: &str, description: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut set = timestamp_fields("updated_at", at)?;
        set.insert("description", description);
        self.update_by_id::<PlanDocument>(id, set).await
    }

    async fn set_status(&self, id: &str, status: PlanStatus, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut set = timestamp_fields("updated_at", at)?;
        set.insert("status", status.as_str());
        self.update_by_id::<PlanDocument>(id, set).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<PlanDocument>(id).await
    }
}

#[async_trait]
impl PlanDocumentEventRepository for MongoStore {
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
        self.find_page(doc! {"plan_document_id": plan_document_id}, page)
            .await
    }

    async fn plan_document_ids_by_user_ids(&self, user_ids: &[String]) -> StoreResult<Vec<String>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let values = self
            .collection::<PlanDocumentEvent>()
            .distinct("plan_document_id", doc! {"user_id": {"$in": strings(user_ids)}})
            .await?;
        let mut ids: Vec<String> = values
            .into_iter()
            .filter_map(|v| match v {
                Bson::String(id) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

#[async_trait]
impl UserRepository for MongoStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        self.insert(user).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.find_by_key(id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_one(doc! {"email": normalize_email(email)}).await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<User>> {
        self.find_page(Document::new(), page).await
    }

    async fn update_display_name(&self, id: &str, display_name: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut set = timestamp_fields("updated_at", at)?;
        set.insert("display_name", display_name);
        self.update_by_id::<User>(id, set).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<User>(id).await
    }
}

#[async_trait]
impl ApiKeyRepository for MongoStore {
    async fn create(&self, key: ApiKey) -> StoreResult<ApiKey> {
        self.insert(key).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<ApiKey>> {
        self.find_by_key(id).await
    }

    async fn find_by_key_hash(&self, key_hash: &str) -> StoreResult<Option<ApiKey>> {
        self.find_one(doc! {"key_hash": key_hash}).await
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<ApiKey>> {
        self.find_many(doc! {"user_id": user_id}, newest_first("created_at"), None)
            .await
    }

    async fn update_last_used_at(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update_by_id::<ApiKey>(id, doc! {"last_used_at": bson::to_bson(&at)?})
            .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<ApiKey>(id).await
    }
}

#[async_trait]
impl WebSessionRepository for MongoStore {
    async fn create(&self, session: WebSession) -> StoreResult<WebSession> {
        self.insert(session).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WebSession>> {
        self.find_by_key(id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<WebSession>(id).await
    }

    async fn delete_by_user(&self, user_id: &str) -> StoreResult<u64> {
        self.delete_many::<WebSession>(doc! {"user_id": user_id}).await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.delete_many::<WebSession>(doc! {"expires_at_ns": {"$lte": to_nanos(now)?}})
            .await
    }
}

#[async_trait]
impl PasswordCredentialRepository for MongoStore {
    async fn upsert(&self, credential: PasswordCredential) -> StoreResult<PasswordCredential> {
        if credential.user_id.is_empty() {
            return Err(StoreError::Validation("password credential without user".to_string()));
        }
        let now = Utc::now();
        let mut set = timestamp_fields("updated_at", now)?;
        set.insert("user_id", credential.user_id.as_str());
        set.insert("password_hash", credential.password_hash.as_str());
        let on_insert = timestamp_fields("created_at", now)?;

        self.collection::<PasswordCredential>()
            .update_one(
                doc! {"_id": credential.user_id.as_str()},
                doc! {"$set": set, "$setOnInsert": on_insert},
            )
            .upsert(true)
            .await?;

        self.find_by_user_id(&credential.user_id)
            .await?
            .ok_or_else(|| StoreError::Backend("upserted password credential vanished".to_string()))
    }

    async fn find_by_user_id(&self, user_id: &str) -> StoreResult<Option<PasswordCredential>> {
        self.find_by_key(user_id).await
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        self.delete_by_id::<PasswordCredential>(user_id).await
    }
}

#[async_trait]
impl OAuthConnectionRepository for MongoStore {
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
        self.find_one(doc! {"provider": provider, "provider_user_id": provider_user_id})
            .await
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<OAuthConnection>> {
        self.find_many(doc! {"user_id": user_id}, newest_first("created_at"), None)
            .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.delete_by_id::<OAuthConnection>(id).await
    }
}

fn favorite_filter(user_id: &str, target_type: FavoriteTargetType, target_id: &str) -> Document {
    doc! {
        "user_id": user_id,
        "target_type": target_type.as_str(),
        "target_id": target_id,
    }
}

#[async_trait]
impl UserFavoriteRepository for MongoStore {
    async fn create(&self, favorite: UserFavorite) -> StoreResult<UserFavorite> {
        self.insert(favorite).await
    }

    async fn find(
        &self,
        user_id: &str,
        target_type: FavoriteTargetType,
        target_id: &str,
    ) -> StoreResult<Option<UserFavorite>> {
        self.find_one(favorite_filter(user_id, target_type, target_id))
            .await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        target_type: Option<FavoriteTargetType>,
        page: &PageRequest,
    ) -> StoreResult<Page<UserFavorite>> {
        let mut filter = doc! {"user_id": user_id};
        if let Some(target_type) = target_type {
            filter.insert("target_type", target_type.as_str());
        }
        self.find_page(filter, page).await
    }

    async fn remove(
        &self,
        user_id: &str,
        target_type: FavoriteTargetType,
        target_id: &str,
    ) -> StoreResult<bool> {
        let removed = self
            .delete_many::<UserFavorite>(favorite_filter(user_id, target_type, target_id))
            .await?;
        Ok(removed > 0)
    }
}
