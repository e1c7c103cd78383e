//! Relational schema
//!
//! Tables are described once and rendered per dialect. Timestamps are stored as
//! BIGINT nanoseconds since the epoch. Key columns compare byte-wise on every
//! engine (`COLLATE "C"` on Postgres, `utf8mb4_bin` tables on MySQL) so id
//! tie-breaks order the same everywhere.
//!
//! MySQL key columns are bounded VARCHARs so composite unique indexes stay
//! under InnoDB's 3072-byte key limit. Values longer than a column's bound are
//! rejected with [`StoreError::Validation`] before the statement is sent.

use super::dialect::{Dialect, SqlValue};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// Identifiers and other indexed strings
    Key,
    /// Indexed strings supplied from outside (git remotes, correlation ids)
    LongKey,
    /// Short unindexed text
    Text,
    /// Unbounded text (payloads, plan bodies, patches)
    Body,
    /// Nanoseconds since the epoch
    Timestamp,
    Integer,
}

impl ColumnType {
    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Timestamp | ColumnType::Integer)
    }

    /// Longest value, in characters, the column holds on `dialect`.
    pub fn max_chars(&self, dialect: Dialect) -> Option<usize> {
        match (self, dialect) {
            (ColumnType::Key, Dialect::MySql) => Some(255),
            (ColumnType::LongKey, Dialect::MySql) => Some(512),
            _ => None,
        }
    }

    fn ddl(&self, dialect: Dialect) -> &'static str {
        match (self, dialect) {
            (ColumnType::Key, Dialect::Sqlite) => "TEXT",
            (ColumnType::Key, Dialect::Postgres) => "TEXT COLLATE \"C\"",
            (ColumnType::Key, Dialect::MySql) => "VARCHAR(255)",
            (ColumnType::LongKey, Dialect::Sqlite) => "TEXT",
            (ColumnType::LongKey, Dialect::Postgres) => "TEXT COLLATE \"C\"",
            (ColumnType::LongKey, Dialect::MySql) => "VARCHAR(512)",
            (ColumnType::Text, _) => "TEXT",
            (ColumnType::Body, Dialect::MySql) => "LONGTEXT",
            (ColumnType::Body, _) => "TEXT",
            (ColumnType::Timestamp | ColumnType::Integer, Dialect::Sqlite) => "INTEGER",
            (ColumnType::Timestamp | ColumnType::Integer, _) => "BIGINT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
}

const fn col(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: false,
    }
}

const fn opt(name: &'static str, ty: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        ty,
        nullable: true,
    }
}

use ColumnType::{Body, Key, LongKey, Text, Timestamp};

#[derive(Debug)]
pub struct TableSpec {
    pub name: &'static str,
    pub columns: &'static [ColumnSpec],
    pub primary_key: &'static str,
    pub uniques: &'static [(&'static str, &'static [&'static str])],
    pub indexes: &'static [(&'static str, &'static [&'static str])],
}

impl TableSpec {
    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Reject values longer than their column holds on `dialect`.
    pub fn check_lengths<'a>(
        &self,
        dialect: Dialect,
        values: impl IntoIterator<Item = (&'a str, &'a SqlValue)>,
    ) -> StoreResult<()> {
        for (name, value) in values {
            let SqlValue::Text(Some(text)) = value else {
                continue;
            };
            let limit = self
                .columns
                .iter()
                .find(|c| c.name == name)
                .and_then(|c| c.ty.max_chars(dialect));
            if let Some(limit) = limit {
                let len = text.chars().count();
                if len > limit {
                    return Err(StoreError::Validation(format!(
                        "{}.{} is {} characters, {} allows at most {}",
                        self.name,
                        name,
                        len,
                        dialect.name(),
                        limit
                    )));
                }
            }
        }
        Ok(())
    }

    /// Statements that create the table and its indexes when missing.
    pub fn ddl(&self, dialect: Dialect) -> Vec<String> {
        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                let null = if c.nullable { "" } else { " NOT NULL" };
                format!("{} {}{}", c.name, c.ty.ddl(dialect), null)
            })
            .collect();
        parts.push(format!("PRIMARY KEY ({})", self.primary_key));
        for (name, columns) in self.uniques {
            parts.push(format!("CONSTRAINT {} UNIQUE ({})", name, columns.join(", ")));
        }

        let mut statements = Vec::new();
        match dialect {
            // MySQL has no CREATE INDEX IF NOT EXISTS, so indexes are declared inline
            Dialect::MySql => {
                for (name, columns) in self.indexes {
                    parts.push(format!("INDEX {} ({})", name, columns.join(", ")));
                }
                statements.push(format!(
                    "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_bin",
                    self.name,
                    parts.join(",\n    ")
                ));
            }
            Dialect::Sqlite | Dialect::Postgres => {
                statements.push(format!(
                    "CREATE TABLE IF NOT EXISTS {} (\n    {}\n)",
                    self.name,
                    parts.join(",\n    ")
                ));
                for (name, columns) in self.indexes {
                    statements.push(format!(
                        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                        name,
                        self.name,
                        columns.join(", ")
                    ));
                }
            }
        }
        statements
    }
}

// ============================================
// PROJECTS & SESSIONS
// ============================================

pub static PROJECTS: TableSpec = TableSpec {
    name: "projects",
    columns: &[
        col("id", Key),
        col("canonical_git_url", LongKey),
        col("created_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[("uq_projects_canonical_git_url", &["canonical_git_url"])],
    indexes: &[("idx_projects_created", &["created_at", "id"])],
};

pub static SESSIONS: TableSpec = TableSpec {
    name: "sessions",
    columns: &[
        col("id", Key),
        col("project_id", Key),
        col("claude_session_id", Key),
        opt("user_id", Key),
        col("cwd", Text),
        col("branch", Text),
        opt("title", Text),
        col("started_at", Timestamp),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[("uq_sessions_claude_session_id", &["claude_session_id"])],
    indexes: &[
        ("idx_sessions_updated", &["updated_at", "id"]),
        ("idx_sessions_created", &["created_at", "id"]),
        ("idx_sessions_project", &["project_id", "updated_at", "id"]),
        ("idx_sessions_user", &["user_id", "updated_at", "id"]),
    ],
};

// ============================================
// EVENTS
// ============================================

// NULL uuids never collide, so events without a correlation id are unconstrained
pub static EVENTS: TableSpec = TableSpec {
    name: "events",
    columns: &[
        col("id", Key),
        col("session_id", Key),
        col("event_type", Text),
        col("tool_name", Text),
        col("payload", Body),
        opt("uuid", LongKey),
        col("created_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[("uq_events_session_uuid", &["session_id", "uuid"])],
    indexes: &[("idx_events_session", &["session_id", "created_at", "id"])],
};

// ============================================
// PLAN DOCUMENTS
// ============================================

pub static PLAN_DOCUMENTS: TableSpec = TableSpec {
    name: "plan_documents",
    columns: &[
        col("id", Key),
        col("project_id", Key),
        col("description", Text),
        col("body", Body),
        col("status", Key),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[],
    indexes: &[
        ("idx_plan_documents_updated", &["updated_at", "id"]),
        ("idx_plan_documents_created", &["created_at", "id"]),
        ("idx_plan_documents_project", &["project_id", "updated_at", "id"]),
        ("idx_plan_documents_status", &["status"]),
    ],
};

pub static PLAN_DOCUMENT_EVENTS: TableSpec = TableSpec {
    name: "plan_document_events",
    columns: &[
        col("id", Key),
        col("plan_document_id", Key),
        col("event_type", Key),
        col("patch", Body),
        opt("session_id", Key),
        opt("user_id", Key),
        opt("message", Text),
        col("created_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[],
    indexes: &[
        ("idx_plan_document_events_plan", &["plan_document_id", "created_at", "id"]),
        ("idx_plan_document_events_user", &["user_id", "plan_document_id"]),
    ],
};

// ============================================
// USERS & CREDENTIALS
// ============================================

pub static USERS: TableSpec = TableSpec {
    name: "users",
    columns: &[
        col("id", Key),
        col("email", Key),
        col("display_name", Text),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[("uq_users_email", &["email"])],
    indexes: &[
        ("idx_users_updated", &["updated_at", "id"]),
        ("idx_users_created", &["created_at", "id"]),
    ],
};

pub static API_KEYS: TableSpec = TableSpec {
    name: "api_keys",
    columns: &[
        col("id", Key),
        col("user_id", Key),
        col("name", Text),
        col("key_hash", Key),
        col("key_prefix", Text),
        opt("last_used_at", Timestamp),
        col("created_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[("uq_api_keys_key_hash", &["key_hash"])],
    indexes: &[("idx_api_keys_user", &["user_id", "created_at", "id"])],
};

pub static WEB_SESSIONS: TableSpec = TableSpec {
    name: "web_sessions",
    columns: &[
        col("id", Key),
        col("user_id", Key),
        col("expires_at", Timestamp),
        col("created_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[],
    indexes: &[
        ("idx_web_sessions_user", &["user_id"]),
        ("idx_web_sessions_expires", &["expires_at"]),
    ],
};

pub static PASSWORD_CREDENTIALS: TableSpec = TableSpec {
    name: "password_credentials",
    columns: &[
        col("user_id", Key),
        col("password_hash", Text),
        col("created_at", Timestamp),
        col("updated_at", Timestamp),
    ],
    primary_key: "user_id",
    uniques: &[],
    indexes: &[],
};

pub static OAUTH_CONNECTIONS: TableSpec = TableSpec {
    name: "oauth_connections",
    columns: &[
        col("id", Key),
        col("user_id", Key),
        col("provider", Key),
        col("provider_user_id", Key),
        opt("email", Text),
        col("created_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[("uq_oauth_connections_identity", &["provider", "provider_user_id"])],
    indexes: &[("idx_oauth_connections_user", &["user_id", "created_at", "id"])],
};

pub static USER_FAVORITES: TableSpec = TableSpec {
    name: "user_favorites",
    columns: &[
        col("id", Key),
        col("user_id", Key),
        col("target_type", Key),
        col("target_id", Key),
        col("created_at", Timestamp),
    ],
    primary_key: "id",
    uniques: &[("uq_user_favorites_target", &["user_id", "target_type", "target_id"])],
    indexes: &[("idx_user_favorites_user", &["user_id", "created_at", "id"])],
};

pub static ALL_TABLES: [&TableSpec; 11] = [
    &PROJECTS,
    &SESSIONS,
    &EVENTS,
    &PLAN_DOCUMENTS,
    &PLAN_DOCUMENT_EVENTS,
    &USERS,
    &API_KEYS,
    &WEB_SESSIONS,
    &PASSWORD_CREDENTIALS,
    &OAUTH_CONNECTIONS,
    &USER_FAVORITES,
];

/// Single-column result shapes for aggregate and projection queries.
pub static COUNT_COLUMN: [ColumnSpec; 1] = [col("n", ColumnType::Integer)];
pub static PLAN_ID_COLUMN: [ColumnSpec; 1] = [col("plan_document_id", Key)];
