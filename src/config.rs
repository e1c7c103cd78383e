//! Configuration management with YAML support

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::repository::BackendKind;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

/// Backend selection plus the settings of every backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Per-call limit in milliseconds, 0 disables it
    #[serde(default)]
    pub operation_timeout_ms: u64,

    #[serde(default)]
    pub sqlite: SqliteConfig,

    #[serde(default = "default_postgres")]
    pub postgres: SqlServerConfig,

    #[serde(default = "default_mysql")]
    pub mysql: SqlServerConfig,

    #[serde(default)]
    pub mongodb: MongoConfig,

    #[serde(default)]
    pub rocksdb: RocksDbConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteConfig {
    #[serde(default = "default_sqlite_path")]
    pub path: String,
}

/// Postgres or MySQL connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlServerConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConfig {
    #[serde(default = "default_mongodb_uri")]
    pub uri: String,

    #[serde(default = "default_database_name")]
    pub database: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    #[serde(default = "default_rocksdb_path")]
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_claude_projects_path")]
    pub claude_projects_path: String,
}

// Default value functions
fn default_sqlite_path() -> String {
    "~/.local/share/agentledger/agentledger.db".to_string()
}

fn default_rocksdb_path() -> String {
    "~/.local/share/agentledger/rocksdb".to_string()
}

fn default_postgres() -> SqlServerConfig {
    SqlServerConfig {
        url: "postgres://localhost/agentledger".to_string(),
        max_connections: default_max_connections(),
    }
}

fn default_mysql() -> SqlServerConfig {
    SqlServerConfig {
        url: "mysql://localhost/agentledger".to_string(),
        max_connections: default_max_connections(),
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_mongodb_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_database_name() -> String {
    "agentledger".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

fn default_claude_projects_path() -> String {
    "~/.claude/projects".to_string()
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            operation_timeout_ms: 0,
            sqlite: SqliteConfig::default(),
            postgres: default_postgres(),
            mysql: default_mysql(),
            mongodb: MongoConfig::default(),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: default_sqlite_path(),
        }
    }
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: default_mongodb_uri(),
            database: default_database_name(),
        }
    }
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            path: default_rocksdb_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            claude_projects_path: default_claude_projects_path(),
        }
    }
}

impl StorageConfig {
    /// Storage settings for the in-process backend, as used by tests.
    pub fn memory() -> Self {
        Self {
            backend: BackendKind::Memory,
            ..Default::default()
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        match self.operation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

impl SqliteConfig {
    /// Database file, expanding ~ to home directory
    pub fn path(&self) -> PathBuf {
        expand(&self.path)
    }
}

impl RocksDbConfig {
    pub fn path(&self) -> PathBuf {
        expand(&self.path)
    }
}

impl IngestConfig {
    pub fn claude_projects_path(&self) -> PathBuf {
        expand(&self.claude_projects_path)
    }
}

impl Config {
    /// Load configuration from a YAML file
    /// Searches in order:
    /// 1. Provided path
    /// 2. ./agentledger.yaml (current directory)
    /// 3. ~/.config/agentledger/agentledger.yaml
    pub fn load(path: &str) -> Result<Self> {
        let search_paths = vec![
            shellexpand::tilde(path).to_string(),
            "agentledger.yaml".to_string(),
            shellexpand::tilde("~/.config/agentledger/agentledger.yaml").to_string(),
        ];

        for search_path in &search_paths {
            if std::path::Path::new(search_path).exists() {
                let content = std::fs::read_to_string(search_path)
                    .with_context(|| format!("reading {}", search_path))?;
                let config: Config = serde_yaml::from_str(&content)
                    .with_context(|| format!("parsing {}", search_path))?;
                return Ok(config);
            }
        }

        // No config file found, use defaults
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.storage.backend, BackendKind::Sqlite);
        assert!(config.storage.operation_timeout().is_none());
        assert_eq!(config.storage.postgres.max_connections, 10);
        assert_eq!(config.storage.mysql.url, "mysql://localhost/agentledger");
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r#"
storage:
  backend: rocksdb
  operation_timeout_ms: 2500
  rocksdb:
    path: /tmp/ledger
  postgres:
    url: postgres://db/ledger

logging:
  filter: agentledger=debug
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.backend, BackendKind::RocksDb);
        assert_eq!(
            config.storage.operation_timeout(),
            Some(Duration::from_millis(2500))
        );
        assert_eq!(config.storage.rocksdb.path(), PathBuf::from("/tmp/ledger"));
        assert_eq!(config.storage.postgres.url, "postgres://db/ledger");
        assert_eq!(config.storage.postgres.max_connections, 10);
        assert_eq!(config.storage.mongodb.database, "agentledger");
        assert_eq!(config.logging.filter, "agentledger=debug");
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let yaml = "storage:\n  backend: cassandra\n";
        assert!(serde_yaml::from_str::<Config>(yaml).is_err());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.ingest.claude_projects_path, "~/.claude/projects");
    }

    #[test]
    fn test_load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agentledger.yaml");
        std::fs::write(&path, "storage:\n  backend: memory\n").unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.storage.backend, BackendKind::Memory);
    }
}
