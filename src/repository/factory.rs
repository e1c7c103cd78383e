//! Backend selection
//!
//! Opens exactly one store for the configured backend, ensures its schema and
//! the default project, and hands back the [`Repositories`] bundle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

use super::Repositories;
use crate::config::StorageConfig;
use crate::error::{StoreError, StoreResult};
use crate::store::memory::MemoryStore;
use crate::store::sql::{AnyExecutor, Dialect, SqlStore, SqliteExecutor};

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process maps (tests and development)
    Memory,
    #[default]
    Sqlite,
    Postgres,
    MySql,
    MongoDb,
    RocksDb,
}

impl BackendKind {
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Memory,
        BackendKind::Sqlite,
        BackendKind::Postgres,
        BackendKind::MySql,
        BackendKind::MongoDb,
        BackendKind::RocksDb,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Memory => "memory",
            BackendKind::Sqlite => "sqlite",
            BackendKind::Postgres => "postgres",
            BackendKind::MySql => "mysql",
            BackendKind::MongoDb => "mongodb",
            BackendKind::RocksDb => "rocksdb",
        }
    }

    /// Whether this build carries the backend's driver.
    pub fn is_available(&self) -> bool {
        match self {
            BackendKind::MongoDb => cfg!(feature = "document"),
            BackendKind::RocksDb => cfg!(feature = "widecolumn"),
            _ => true,
        }
    }
}

impl FromStr for BackendKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        match lowered.as_str() {
            "postgresql" => Ok(BackendKind::Postgres),
            "mongo" => Ok(BackendKind::MongoDb),
            other => BackendKind::ALL
                .into_iter()
                .find(|kind| kind.as_str() == other)
                .ok_or_else(|| StoreError::Validation(format!("backend: {}", s))),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(not(all(feature = "document", feature = "widecolumn")))]
fn unavailable(kind: BackendKind) -> StoreError {
    StoreError::Validation(format!("backend {} is not compiled into this build", kind))
}

/// Open the configured backend.
#[tracing::instrument(skip(config), fields(backend = %config.backend))]
pub async fn open(config: &StorageConfig) -> StoreResult<Repositories> {
    let kind = config.backend;
    let repos = match kind {
        BackendKind::Memory => Repositories::from_store(kind, MemoryStore::new()),
        BackendKind::Sqlite => {
            let path = config.sqlite.path();
            let exec = tokio::task::spawn_blocking(move || SqliteExecutor::open(&path)).await??;
            let store = SqlStore::new(exec);
            store.ensure_schema().await?;
            Repositories::from_store(kind, store)
        }
        BackendKind::Postgres | BackendKind::MySql => {
            let (server, dialect) = match kind {
                BackendKind::Postgres => (&config.postgres, Dialect::Postgres),
                _ => (&config.mysql, Dialect::MySql),
            };
            let exec = AnyExecutor::connect(&server.url, server.max_connections, dialect).await?;
            let store = SqlStore::new(exec);
            store.ensure_schema().await?;
            Repositories::from_store(kind, store)
        }
        BackendKind::MongoDb => open_document(config).await?,
        BackendKind::RocksDb => open_widecolumn(config).await?,
    };

    let repos = repos.with_timeout(config.operation_timeout());
    repos.deadline(repos.projects.default_project()).await?;
    info!(backend = %kind, "repositories ready");
    Ok(repos)
}

#[cfg(feature = "document")]
async fn open_document(config: &StorageConfig) -> StoreResult<Repositories> {
    use crate::store::document::MongoStore;

    let store = MongoStore::connect(&config.mongodb.uri, &config.mongodb.database).await?;
    store.ensure_indexes().await?;
    Ok(Repositories::from_store(BackendKind::MongoDb, store))
}

#[cfg(not(feature = "document"))]
async fn open_document(_config: &StorageConfig) -> StoreResult<Repositories> {
    Err(unavailable(BackendKind::MongoDb))
}

#[cfg(feature = "widecolumn")]
async fn open_widecolumn(config: &StorageConfig) -> StoreResult<Repositories> {
    use crate::store::widecolumn::WideColumnStore;

    let path = config.rocksdb.path();
    let store = tokio::task::spawn_blocking(move || WideColumnStore::open(&path)).await??;
    Ok(Repositories::from_store(BackendKind::RocksDb, store))
}

#[cfg(not(feature = "widecolumn"))]
async fn open_widecolumn(_config: &StorageConfig) -> StoreResult<Repositories> {
    Err(unavailable(BackendKind::RocksDb))
}
