//! Statement execution for the relational backends
//!
//! SQLite runs on a single rusqlite connection on the blocking pool. Postgres
//! and MySQL share one sqlx `AnyPool` implementation.

use async_trait::async_trait;
use rusqlite::{ffi, params_from_iter, Connection};
use sqlx::any::{AnyArguments, AnyPoolOptions};
use sqlx::query::Query;
use sqlx::{Any, AnyPool, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

use super::dialect::{Dialect, SqlValue, Statement};
use super::entity::SqlRow;
use super::schema::ColumnSpec;
use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait SqlExecutor: Send + Sync + 'static {
    fn dialect(&self) -> Dialect;

    /// Run a statement, returning the affected row count.
    async fn execute(&self, statement: Statement) -> StoreResult<u64>;

    /// Run a query whose result columns are `columns`, in order.
    async fn query(
        &self,
        statement: Statement,
        columns: &'static [ColumnSpec],
    ) -> StoreResult<Vec<SqlRow>>;

    fn statement(&self) -> Statement {
        Statement::new(self.dialect())
    }
}

// ============================================
// SQLITE
// ============================================

pub struct SqliteExecutor {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteExecutor {
    pub fn open(path: &Path) -> StoreResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {}", parent.display(), e)))?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::configure(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> StoreResult<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("sqlite connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await?
    }
}

fn to_sqlite(value: SqlValue) -> rusqlite::types::Value {
    use rusqlite::types::Value;
    match value {
        SqlValue::Text(Some(text)) => Value::Text(text),
        SqlValue::Int(Some(n)) => Value::Integer(n),
        SqlValue::Text(None) | SqlValue::Int(None) => Value::Null,
    }
}

fn map_sqlite_error(err: rusqlite::Error) -> StoreError {
    if let rusqlite::Error::SqliteFailure(code, message) = &err {
        if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
            || code.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        {
            return StoreError::Duplicate(message.clone().unwrap_or_else(|| code.to_string()));
        }
    }
    StoreError::Sqlite(err)
}

#[async_trait]
impl SqlExecutor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute(&self, statement: Statement) -> StoreResult<u64> {
        let (sql, params) = statement.into_parts();
        self.with_conn(move |conn| {
            let changed = conn
                .execute(&sql, params_from_iter(params.into_iter().map(to_sqlite)))
                .map_err(map_sqlite_error)?;
            Ok(changed as u64)
        })
        .await
    }

    async fn query(
        &self,
        statement: Statement,
        columns: &'static [ColumnSpec],
    ) -> StoreResult<Vec<SqlRow>> {
        let (sql, params) = statement.into_parts();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let mut rows = stmt.query(params_from_iter(params.into_iter().map(to_sqlite)))?;
            let mut out = Vec::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(columns.len());
                for (i, column) in columns.iter().enumerate() {
                    values.push(if column.ty.is_integer() {
                        SqlValue::Int(row.get(i)?)
                    } else {
                        SqlValue::Text(row.get(i)?)
                    });
                }
                out.push(SqlRow::new(columns, values));
            }
            Ok(out)
        })
        .await
    }
}

// ============================================
// POSTGRES / MYSQL
// ============================================

pub struct AnyExecutor {
    pool: AnyPool,
    dialect: Dialect,
}

impl AnyExecutor {
    pub async fn connect(url: &str, max_connections: u32, dialect: Dialect) -> StoreResult<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self { pool, dialect })
    }

    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    params: Vec<SqlValue>,
) -> Query<'q, Any, AnyArguments<'q>> {
    for value in params {
        query = match value {
            SqlValue::Text(text) => query.bind(text),
            SqlValue::Int(n) => query.bind(n),
        };
    }
    query
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Duplicate(db.message().to_string())
        }
        _ => StoreError::Sql(err),
    }
}

#[async_trait]
impl SqlExecutor for AnyExecutor {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute(&self, statement: Statement) -> StoreResult<u64> {
        let (sql, params) = statement.into_parts();
        let result = bind_all(sqlx::query(&sql), params)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }

    async fn query(
        &self,
        statement: Statement,
        columns: &'static [ColumnSpec],
    ) -> StoreResult<Vec<SqlRow>> {
        let (sql, params) = statement.into_parts();
        let rows = bind_all(sqlx::query(&sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = Vec::with_capacity(columns.len());
            for (i, column) in columns.iter().enumerate() {
                values.push(if column.ty.is_integer() {
                    SqlValue::Int(row.try_get(i)?)
                } else {
                    SqlValue::Text(row.try_get(i)?)
                });
            }
            out.push(SqlRow::new(columns, values));
        }
        Ok(out)
    }
}
