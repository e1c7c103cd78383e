//! Backend fixtures for the contract suite

use agentledger::config::StorageConfig;
use agentledger::repository::{self, BackendKind, Repositories};
use tempfile::TempDir;

pub struct Fixture {
    pub repos: Repositories,
    // Keeps file-backed stores alive for the test
    _dir: Option<TempDir>,
}

async fn open(config: StorageConfig, dir: Option<TempDir>) -> Fixture {
    let repos = repository::open(&config).await.unwrap();
    Fixture { repos, _dir: dir }
}

fn required_env(name: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| panic!("{} must be set to run this test", name))
}

pub async fn memory() -> Fixture {
    open(StorageConfig::memory(), None).await
}

pub async fn sqlite() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StorageConfig::default();
    config.backend = BackendKind::Sqlite;
    config.sqlite.path = dir.path().join("ledger.db").display().to_string();
    open(config, Some(dir)).await
}

#[cfg(feature = "widecolumn")]
pub async fn rocksdb() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let mut config = StorageConfig::default();
    config.backend = BackendKind::RocksDb;
    config.rocksdb.path = dir.path().join("rocksdb").display().to_string();
    open(config, Some(dir)).await
}

pub async fn postgres() -> Fixture {
    let mut config = StorageConfig::default();
    config.backend = BackendKind::Postgres;
    config.postgres.url = required_env("AGENTLEDGER_TEST_POSTGRES_URL");
    open(config, None).await
}

pub async fn mysql() -> Fixture {
    let mut config = StorageConfig::default();
    config.backend = BackendKind::MySql;
    config.mysql.url = required_env("AGENTLEDGER_TEST_MYSQL_URL");
    open(config, None).await
}

#[cfg(feature = "document")]
pub async fn mongodb() -> Fixture {
    let mut config = StorageConfig::default();
    config.backend = BackendKind::MongoDb;
    config.mongodb.uri = required_env("AGENTLEDGER_TEST_MONGODB_URI");
    config.mongodb.database = format!("agentledger_test_{}", std::process::id());
    open(config, None).await
}
