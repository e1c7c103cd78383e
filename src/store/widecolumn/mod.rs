//! RocksDB store
//!
//! Every table is a column family holding the JSON form of its records keyed
//! by id, next to a `<table>/index` column family with the secondary keys the
//! record owns (see [`records`]). Writes run in pessimistic transactions that
//! lock the record and every natural key it claims, so index entries never
//! drift from their records. Listings scan a sorted index backwards from the
//! cursor position and load records until the page is full.

mod keys;
mod records;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{
    ColumnFamily, ColumnFamilyDescriptor, Options, Transaction, TransactionDB,
    TransactionDBOptions,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    identity_key, normalize_email, prepare, target_key, ApiKey, Event, FavoriteTargetType,
    OAuthConnection, PasswordCredential, PlanDocument, PlanDocumentEvent, PlanDocumentQuery,
    PlanStatus, Project, Session, User, UserFavorite, WebSession,
};
use crate::repository::{
    guard_default_project, paginate, ApiKeyRepository, EventRepository,
    OAuthConnectionRepository, Page, PageRequest, PasswordCredentialRepository,
    PlanDocumentEventRepository, PlanDocumentRepository, ProjectRepository, SessionRepository,
    UserFavoriteRepository, UserRepository, WebSessionRepository,
};
use records::{index_cf, index_name, session_uuid, IndexEntry, WideRecord, ALL, TABLES};

fn cf<'a>(db: &'a TransactionDB, name: &str) -> StoreResult<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::Backend(format!("missing column family {}", name)))
}

/// Record and index column families of `T`.
fn families<T: WideRecord>(db: &TransactionDB) -> StoreResult<(&ColumnFamily, &ColumnFamily)> {
    Ok((cf(db, T::TABLE)?, cf(db, &index_cf(T::TABLE))?))
}

fn decode<T: WideRecord>(raw: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(raw).map_err(|e| StoreError::corrupt(format!("{}: {}", T::KIND, e)))
}

fn load<T: WideRecord>(db: &TransactionDB, id: &str) -> StoreResult<Option<T>> {
    let base = cf(db, T::TABLE)?;
    db.get_cf(base, id)?.map(|raw| decode(&raw)).transpose()
}

fn owner<T: WideRecord>(db: &TransactionDB, name: &str, value: &str) -> StoreResult<Option<String>> {
    let index = cf(db, &index_cf(T::TABLE))?;
    db.get_cf(index, keys::unique_key(name, value))?
        .map(|raw| String::from_utf8(raw).map_err(|_| StoreError::corrupt("unique index owner")))
        .transpose()
}

/// Record owning a natural key.
fn find_unique<T: WideRecord>(db: &TransactionDB, name: &str, value: &str) -> StoreResult<Option<T>> {
    match owner::<T>(db, name, value)? {
        Some(id) => load(db, &id),
        None => Ok(None),
    }
}

/// Lock every natural key in `entries`; fails when another record holds one.
fn claim_unique(
    txn: &Transaction<'_, TransactionDB>,
    index: &ColumnFamily,
    entries: &[IndexEntry],
    id: &str,
    kind: &str,
) -> StoreResult<()> {
    for entry in entries {
        if let IndexEntry::Unique(key) = entry {
            if let Some(holder) = txn.get_for_update_cf(index, key, true)? {
                if holder != id.as_bytes() {
                    return Err(StoreError::Duplicate(format!(
                        "{} {}",
                        kind,
                        String::from_utf8_lossy(key).replace('\0', " ")
                    )));
                }
            }
        }
    }
    Ok(())
}

fn write_entries(
    txn: &Transaction<'_, TransactionDB>,
    index: &ColumnFamily,
    entries: &[IndexEntry],
    id: &str,
) -> StoreResult<()> {
    for entry in entries {
        match entry {
            IndexEntry::Sorted(key) => txn.put_cf(index, key, b"")?,
            IndexEntry::Unique(key) => txn.put_cf(index, key, id.as_bytes())?,
        }
    }
    Ok(())
}

fn insert<T: WideRecord>(db: &TransactionDB, record: &T) -> StoreResult<()> {
    let (base, index) = families::<T>(db)?;
    let entries = record.index_entries()?;
    let txn = db.transaction();
    if txn.get_for_update_cf(base, record.id(), true)?.is_some() {
        return Err(StoreError::Duplicate(format!("{} id {}", T::KIND, record.id())));
    }
    claim_unique(&txn, index, &entries, record.id(), T::KIND)?;
    txn.put_cf(base, record.id(), serde_json::to_vec(record)?)?;
    write_entries(&txn, index, &entries, record.id())?;
    txn.commit()?;
    Ok(())
}

/// Apply `change` to a stored record and move its index entries along.
fn update<T, F>(db: &TransactionDB, id: &str, change: F) -> StoreResult<bool>
where
    T: WideRecord,
    F: FnOnce(&mut T),
{
    let (base, index) = families::<T>(db)?;
    let txn = db.transaction();
    let Some(raw) = txn.get_for_update_cf(base, id, true)? else {
        return Ok(false);
    };
    let mut record: T = decode(&raw)?;
    let before = record.index_entries()?;
    change(&mut record);
    let after = record.index_entries()?;

    claim_unique(&txn, index, &after, id, T::KIND)?;
    for stale in before.iter().filter(|entry| !after.contains(entry)) {
        txn.delete_cf(index, stale.key())?;
    }
    write_entries(&txn, index, &after, id)?;
    txn.put_cf(base, id, serde_json::to_vec(&record)?)?;
    txn.commit()?;
    Ok(true)
}

fn remove<T: WideRecord>(db: &TransactionDB, id: &str) -> StoreResult<bool> {
    let (base, index) = families::<T>(db)?;
    let txn = db.transaction();
    let Some(raw) = txn.get_for_update_cf(base, id, true)? else {
        return Ok(false);
    };
    let record: T = decode(&raw)?;
    for entry in record.index_entries()? {
        txn.delete_cf(index, entry.key())?;
    }
    txn.delete_cf(base, id)?;
    txn.commit()?;
    Ok(true)
}

fn remove_all<T: WideRecord>(db: &TransactionDB, ids: &[String]) -> StoreResult<u64> {
    let mut removed = 0;
    for id in ids {
        if remove::<T>(db, id)? {
            removed += 1;
        }
    }
    debug!(table = T::TABLE, removed, "deleted");
    Ok(removed)
}

/// Walk one sorted index partition newest first.
///
/// With `after`, the walk starts strictly below that key. `visit` returns
/// false to stop.
fn scan_sorted<F>(
    db: &TransactionDB,
    index: &ColumnFamily,
    prefix: &[u8],
    after: Option<&[u8]>,
    mut visit: F,
) -> StoreResult<()>
where
    F: FnMut(&str) -> StoreResult<bool>,
{
    let mut iter = db.raw_iterator_cf(index);
    match after {
        Some(start) => {
            iter.seek_for_prev(start);
            if iter.valid() && iter.key() == Some(start) {
                iter.prev();
            }
        }
        None => iter.seek_for_prev(keys::upper_bound(prefix)),
    }

    while iter.valid() {
        let Some(key) = iter.key() else {
            break;
        };
        if !key.starts_with(prefix) {
            break;
        }
        if !visit(keys::id_of(key, prefix)?)? {
            break;
        }
        iter.prev();
    }
    iter.status()?;
    Ok(())
}

/// Every id in one index partition, newest first.
fn partition_ids<T: WideRecord>(db: &TransactionDB, name: &str, partition: &str) -> StoreResult<Vec<String>> {
    let index = cf(db, &index_cf(T::TABLE))?;
    let prefix = keys::sorted_prefix(name, partition);
    let mut ids = Vec::new();
    scan_sorted(db, index, &prefix, None, |id| {
        ids.push(id.to_string());
        Ok(true)
    })?;
    Ok(ids)
}

/// One page of `scope`/`partition` keeping rows that pass `keep`.
fn page<T, F>(db: &TransactionDB, scope: &str, partition: &str, request: &PageRequest, keep: F) -> StoreResult<Page<T>>
where
    T: WideRecord,
    F: Fn(&T) -> bool,
{
    let (base, index) = families::<T>(db)?;
    let name = index_name(scope, T::sort_key(request.sort_by));
    let prefix = keys::sorted_prefix(&name, partition);
    let after = request
        .decoded_cursor()
        .map(|cursor| keys::sorted_key(&name, partition, cursor.sort_value, &cursor.id))
        .transpose()?;
    let limit = request.fetch_limit();

    let mut rows = Vec::with_capacity(limit);
    scan_sorted(db, index, &prefix, after.as_deref(), |id| {
        if let Some(raw) = db.get_cf(base, id)? {
            let record: T = decode(&raw)?;
            if keep(&record) {
                rows.push(record);
            }
        }
        Ok(rows.len() < limit)
    })?;
    Ok(Page::from_overfetch(rows, request))
}

/// Every record of one partition, newest first.
fn all_of<T: WideRecord>(db: &TransactionDB, scope: &str, partition: &str) -> StoreResult<Vec<T>> {
    let name = index_name(scope, "created_at");
    let mut rows = Vec::new();
    for id in partition_ids::<T>(db, &name, partition)? {
        if let Some(record) = load(db, &id)? {
            rows.push(record);
        }
    }
    Ok(rows)
}

pub struct WideColumnStore {
    db: Arc<TransactionDB>,
}

impl WideColumnStore {
    /// Open or create the database with every column family it needs.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {}", parent.display(), e)))?;
        }
        let mut options = Options::default();
        options.create_if_missing(true);
        options.create_missing_column_families(true);

        let descriptors = TABLES.iter().flat_map(|table| {
            [
                ColumnFamilyDescriptor::new(*table, Options::default()),
                ColumnFamilyDescriptor::new(index_cf(table), Options::default()),
            ]
        });
        let db = TransactionDB::open_cf_descriptors(
            &options,
            &TransactionDBOptions::default(),
            path,
            descriptors,
        )?;
        info!(path = %path.display(), column_families = TABLES.len() * 2, "opened rocksdb");
        Ok(Self { db: Arc::new(db) })
    }

    /// Run blocking RocksDB work off the async runtime.
    async fn run<R, F>(&self, work: F) -> StoreResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&TransactionDB) -> StoreResult<R> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || work(db.as_ref())).await?
    }

    async fn insert<T: WideRecord>(&self, mut record: T) -> StoreResult<T> {
        prepare(&mut record, Utc::now());
        self.run(move |db| {
            insert(db, &record)?;
            debug!(kind = T::KIND, id = record.id(), "inserted");
            Ok(record)
        })
        .await
    }

    async fn get<T: WideRecord>(&self, id: &str) -> StoreResult<Option<T>> {
        let id = id.to_string();
        self.run(move |db| load(db, &id)).await
    }

    async fn unique<T: WideRecord>(&self, name: &'static str, value: String) -> StoreResult<Option<T>> {
        self.run(move |db| find_unique(db, name, &value)).await
    }

    async fn update<T, F>(&self, id: &str, change: F) -> StoreResult<bool>
    where
        T: WideRecord,
        F: FnOnce(&mut T) + Send + 'static,
    {
        let id = id.to_string();
        self.run(move |db| update(db, &id, change)).await
    }

    async fn remove<T: WideRecord>(&self, id: &str) -> StoreResult<bool> {
        let id = id.to_string();
        self.run(move |db| remove::<T>(db, &id)).await
    }

    async fn page<T, F>(&self, scope: &'static str, partition: &str, request: &PageRequest, keep: F) -> StoreResult<Page<T>>
    where
        T: WideRecord,
        F: Fn(&T) -> bool + Send + 'static,
    {
        let partition = partition.to_string();
        let request = request.clone();
        self.run(move |db| page(db, scope, &partition, &request, keep))
            .await
    }

    async fn list<T: WideRecord>(&self, scope: &'static str, partition: &str) -> StoreResult<Vec<T>> {
        let partition = partition.to_string();
        self.run(move |db| all_of(db, scope, &partition)).await
    }
}

#[async_trait]
impl ProjectRepository for WideColumnStore {
    async fn create(&self, project: Project) -> StoreResult<Project> {
        self.insert(project).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Project>> {
        self.get(id).await
    }

    async fn find_by_canonical_git_repository(&self, canonical: &str) -> StoreResult<Option<Project>> {
        self.unique(records::CANONICAL_URL, canonical.to_string())
            .await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Project>> {
        self.page(ALL, ALL, page, |_| true).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        guard_default_project(id)?;
        self.remove::<Project>(id).await
    }
}

#[async_trait]
impl SessionRepository for WideColumnStore {
    async fn create(&self, session: Session) -> StoreResult<Session> {
        self.insert(session).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Session>> {
        self.get(id).await
    }

    async fn find_by_claude_session_id(&self, claude_session_id: &str) -> StoreResult<Option<Session>> {
        self.unique(records::CLAUDE_SESSION_ID, claude_session_id.to_string())
            .await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.page(ALL, ALL, page, |_| true).await
    }

    async fn find_by_project(&self, project_id: &str, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.page("project", project_id, page, |_| true).await
    }

    async fn find_by_user(&self, user_id: &str, page: &PageRequest) -> StoreResult<Page<Session>> {
        self.page("user", user_id, page, |_| true).await
    }

    async fn update_title(&self, id: &str, title: Option<String>) -> StoreResult<bool> {
        self.update(id, move |s: &mut Session| s.title = title).await
    }

    async fn assign_user(&self, id: &str, user_id: Option<String>) -> StoreResult<bool> {
        self.update(id, move |s: &mut Session| s.user_id = user_id)
            .await
    }

    async fn touch(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update(id, move |s: &mut Session| s.updated_at = s.updated_at.max(at))
            .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.remove::<Session>(id).await
    }
}

#[async_trait]
impl EventRepository for WideColumnStore {
    async fn create(&self, event: Event) -> StoreResult<Event> {
        // The uuid claim and the insert share one transaction
        let event = self.insert(event).await?;
        SessionRepository::touch(self, &event.session_id, event.created_at).await?;
        Ok(event)
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<Event>> {
        self.get(id).await
    }

    async fn find_by_session_and_uuid(&self, session_id: &str, uuid: &str) -> StoreResult<Option<Event>> {
        self.unique(records::SESSION_UUID, session_uuid(session_id, uuid))
            .await
    }

    async fn find_by_session(&self, session_id: &str, page: &PageRequest) -> StoreResult<Page<Event>> {
        self.page("session", session_id, page, |_| true).await
    }

    async fn count_by_session(&self, session_id: &str) -> StoreResult<u64> {
        let session_id = session_id.to_string();
        self.run(move |db| {
            let name = index_name("session", "created_at");
            Ok(partition_ids::<Event>(db, &name, &session_id)?.len() as u64)
        })
        .await
    }

    async fn delete_by_session(&self, session_id: &str) -> StoreResult<u64> {
        let session_id = session_id.to_string();
        self.run(move |db| {
            let name = index_name("session", "created_at");
            let ids = partition_ids::<Event>(db, &name, &session_id)?;
            remove_all::<Event>(db, &ids)
        })
        .await
    }
}

#[async_trait]
impl PlanDocumentRepository for WideColumnStore {
    async fn create(&self, plan: PlanDocument) -> StoreResult<PlanDocument> {
        self.insert(plan).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocument>> {
        self.get(id).await
    }

    async fn find(&self, query: &PlanDocumentQuery, page: &PageRequest) -> StoreResult<Page<PlanDocument>> {
        let query = query.clone();
        let request = page.clone();

        // An explicit id set is loaded directly instead of scanning
        if let Some(ids) = query.ids.clone() {
            return self
                .run(move |db| {
                    let mut rows = Vec::new();
                    for id in ids.iter().collect::<BTreeSet<_>>() {
                        if let Some(plan) = load::<PlanDocument>(db, id)? {
                            if query.matches(&plan) {
                                rows.push(plan);
                            }
                        }
                    }
                    Ok(paginate(rows, &request))
                })
                .await;
        }

        match query.project_id.clone() {
            Some(project_id) => {
                self.page("project", &project_id, page, move |p: &PlanDocument| query.matches(p))
                    .await
            }
            None => {
                self.page(ALL, ALL, page, move |p: &PlanDocument| query.matches(p))
                    .await
            }
        }
    }

    async fn update_body(&self, id: &str, body: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let body = body.to_string();
        self.update(id, move |p: &mut PlanDocument| {
            p.body = body;
            p.updated_at = at;
        })
        .await
    }

    async fn update_description(&self, id: &str, description: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let description = description.to_string();
        self.update(id, move |p: &mut PlanDocument| {
            p.description = description;
            p.updated_at = at;
        })
        .await
    }

    async fn set_status(&self, id: &str, status: PlanStatus, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update(id, move |p: &mut PlanDocument| {
            p.status = status;
            p.updated_at = at;
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.remove::<PlanDocument>(id).await
    }
}

#[async_trait]
impl PlanDocumentEventRepository for WideColumnStore {
    async fn create(&self, event: PlanDocumentEvent) -> StoreResult<PlanDocumentEvent> {
        self.insert(event).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<PlanDocumentEvent>> {
        self.get(id).await
    }

    async fn find_by_plan_document(
        &self,
        plan_document_id: &str,
        page: &PageRequest,
    ) -> StoreResult<Page<PlanDocumentEvent>> {
        self.page("plan", plan_document_id, page, |_| true).await
    }

    async fn plan_document_ids_by_user_ids(&self, user_ids: &[String]) -> StoreResult<Vec<String>> {
        let user_ids = user_ids.to_vec();
        self.run(move |db| {
            let mut ids = BTreeSet::new();
            for user_id in &user_ids {
                for event in all_of::<PlanDocumentEvent>(db, "user", user_id)? {
                    ids.insert(event.plan_document_id);
                }
            }
            Ok(ids.into_iter().collect())
        })
        .await
    }
}

#[async_trait]
impl UserRepository for WideColumnStore {
    async fn create(&self, user: User) -> StoreResult<User> {
        self.insert(user).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<User>> {
        self.get(id).await
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.unique(records::EMAIL, normalize_email(email)).await
    }

    async fn find_all(&self, page: &PageRequest) -> StoreResult<Page<User>> {
        self.page(ALL, ALL, page, |_| true).await
    }

    async fn update_display_name(&self, id: &str, display_name: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        let display_name = display_name.to_string();
        self.update(id, move |u: &mut User| {
            u.display_name = display_name;
            u.updated_at = at;
        })
        .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.remove::<User>(id).await
    }
}

#[async_trait]
impl ApiKeyRepository for WideColumnStore {
    async fn create(&self, key: ApiKey) -> StoreResult<ApiKey> {
        self.insert(key).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<ApiKey>> {
        self.get(id).await
    }

    async fn find_by_key_hash(&self, key_hash: &str) -> StoreResult<Option<ApiKey>> {
        self.unique(records::KEY_HASH, key_hash.to_string()).await
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<ApiKey>> {
        self.list("user", user_id).await
    }

    async fn update_last_used_at(&self, id: &str, at: DateTime<Utc>) -> StoreResult<bool> {
        self.update(id, move |k: &mut ApiKey| k.last_used_at = Some(at))
            .await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.remove::<ApiKey>(id).await
    }
}

#[async_trait]
impl WebSessionRepository for WideColumnStore {
    async fn create(&self, session: WebSession) -> StoreResult<WebSession> {
        self.insert(session).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<WebSession>> {
        self.get(id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.remove::<WebSession>(id).await
    }

    async fn delete_by_user(&self, user_id: &str) -> StoreResult<u64> {
        let user_id = user_id.to_string();
        self.run(move |db| {
            let name = index_name("user", "created_at");
            let ids = partition_ids::<WebSession>(db, &name, &user_id)?;
            remove_all::<WebSession>(db, &ids)
        })
        .await
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> StoreResult<u64> {
        self.run(move |db| {
            let index = cf(db, &index_cf(WebSession::TABLE))?;
            let prefix = keys::sorted_prefix(records::EXPIRES, ALL);
            // Start just above every key expiring at `now`
            let mut start = prefix.clone();
            start.extend_from_slice(&keys::encode_sort(now)?);
            let start = keys::upper_bound(&start);

            let mut ids = Vec::new();
            scan_sorted(db, index, &prefix, Some(&start), |id| {
                ids.push(id.to_string());
                Ok(true)
            })?;
            remove_all::<WebSession>(db, &ids)
        })
        .await
    }
}

#[async_trait]
impl PasswordCredentialRepository for WideColumnStore {
    async fn upsert(&self, mut credential: PasswordCredential) -> StoreResult<PasswordCredential> {
        if credential.user_id.is_empty() {
            return Err(StoreError::Validation("password credential without user".to_string()));
        }
        let now = Utc::now();
        self.run(move |db| {
            let base = cf(db, PasswordCredential::TABLE)?;
            let txn = db.transaction();
            let existing = txn
                .get_for_update_cf(base, &credential.user_id, true)?
                .map(|raw| decode::<PasswordCredential>(&raw))
                .transpose()?;
            credential.created_at = existing.map_or(now, |found| found.created_at);
            credential.updated_at = now;
            txn.put_cf(base, &credential.user_id, serde_json::to_vec(&credential)?)?;
            txn.commit()?;
            Ok(credential)
        })
        .await
    }

    async fn find_by_user_id(&self, user_id: &str) -> StoreResult<Option<PasswordCredential>> {
        self.get(user_id).await
    }

    async fn delete(&self, user_id: &str) -> StoreResult<bool> {
        self.remove::<PasswordCredential>(user_id).await
    }
}

#[async_trait]
impl OAuthConnectionRepository for WideColumnStore {
    async fn create(&self, connection: OAuthConnection) -> StoreResult<OAuthConnection> {
        self.insert(connection).await
    }

    async fn find_by_id(&self, id: &str) -> StoreResult<Option<OAuthConnection>> {
        self.get(id).await
    }

    async fn find_by_provider_identity(
        &self,
        provider: &str,
        provider_user_id: &str,
    ) -> StoreResult<Option<OAuthConnection>> {
        self.unique(records::IDENTITY, identity_key(provider, provider_user_id))
            .await
    }

    async fn find_by_user(&self, user_id: &str) -> StoreResult<Vec<OAuthConnection>> {
        self.list("user", user_id).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.remove::<OAuthConnection>(id).await
    }
}

#[async_trait]
impl UserFavoriteRepository for WideColumnStore {
    async fn create(&self, favorite: UserFavorite) -> StoreResult<UserFavorite> {
        self.insert(favorite).await
    }

    async fn find(
        &self,
        user_id: &str,
        target_type: FavoriteTargetType,
        target_id: &str,
    ) -> StoreResult<Option<UserFavorite>> {
        self.unique(records::TARGET, target_key(user_id, target_type, target_id))
            .await
    }

    async fn list_by_user(
        &self,
        user_id: &str,
        target_type: Option<FavoriteTargetType>,
        page: &PageRequest,
    ) -> StoreResult<Page<UserFavorite>> {
        match target_type {
            Some(target_type) => {
                let typed = records::favorite_scope(user_id, target_type);
                self.page("user_type", &typed, page, |_| true).await
            }
            None => self.page("user", user_id, page, |_| true).await,
        }
    }

    async fn remove(
        &self,
        user_id: &str,
        target_type: FavoriteTargetType,
        target_id: &str,
    ) -> StoreResult<bool> {
        let key = target_key(user_id, target_type, target_id);
        self.run(move |db| match owner::<UserFavorite>(db, records::TARGET, &key)? {
            Some(id) => remove::<UserFavorite>(db, &id),
            None => Ok(false),
        })
        .await
    }
}
