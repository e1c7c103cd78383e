//! Domain model
//!
//! Plain entity types and the invariants every backend relies on. Nothing in
//! here performs I/O except the small `.git` readers in [`git`].

mod event;
mod favorite;
pub mod git;
mod plan;
mod project;
mod session;
mod user;

pub use event::Event;
pub use favorite::{FavoriteTargetType, UserFavorite};
pub use git::canonicalize_git_remote;
pub use plan::{
    PlanDocument, PlanDocumentEvent, PlanDocumentEventType, PlanDocumentQuery, PlanStatus,
};
pub use project::{Project, DEFAULT_PROJECT_ID};
pub use session::Session;
pub use user::{
    hash_secret, normalize_email, ApiKey, OAuthConnection, PasswordCredential, User, WebSession,
};

pub(crate) use favorite::target_key;
pub(crate) use user::identity_key;

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};

/// Timestamp field a listing is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    UpdatedAt,
    CreatedAt,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::UpdatedAt => "updated_at",
            SortField::CreatedAt => "created_at",
        }
    }
}

impl FromStr for SortField {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "updated_at" => Ok(SortField::UpdatedAt),
            "created_at" => Ok(SortField::CreatedAt),
            other => Err(StoreError::Validation(format!("sort field: {}", other))),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface of every persisted entity.
///
/// Backends use it to assign identifiers, to read the value a listing is
/// ordered by, and to name the stored timestamp field for that ordering.
pub trait Record: Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Singular entity name used in logs and error messages.
    const KIND: &'static str;

    fn id(&self) -> &str;

    fn set_id(&mut self, id: String);

    /// Fill timestamps still at their default value.
    fn stamp(&mut self, now: DateTime<Utc>);

    /// Stored field holding the value ordered by `field`.
    ///
    /// Entities without an `updated_at` always order by `created_at`.
    fn sort_key(field: SortField) -> &'static str {
        field.as_str()
    }

    fn sort_value(&self, field: SortField) -> DateTime<Utc>;
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Assign an id and timestamps to a record about to be inserted.
pub fn prepare<T: Record>(record: &mut T, now: DateTime<Utc>) {
    if record.id().is_empty() {
        record.set_id(new_id());
    }
    record.stamp(now);
}

/// Single-string key for a tuple. Each part is length-prefixed, so parts
/// containing any separator character still map to distinct keys.
pub(crate) fn composite_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| format!("{}:{}", part.len(), part))
        .collect()
}

pub(crate) fn is_unset(ts: &DateTime<Utc>) -> bool {
    *ts == DateTime::<Utc>::default()
}

pub(crate) fn fill(ts: &mut DateTime<Utc>, value: DateTime<Utc>) {
    if is_unset(ts) {
        *ts = value;
    }
}

/// Nanoseconds since the epoch, the lossless representation every backend stores.
pub fn to_nanos(ts: DateTime<Utc>) -> StoreResult<i64> {
    ts.timestamp_nanos_opt()
        .ok_or_else(|| StoreError::Validation(format!("timestamp out of range: {}", ts)))
}

pub fn from_nanos(nanos: i64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos)
}
