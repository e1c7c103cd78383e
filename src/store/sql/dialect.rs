//! SQL dialects and the statement builder shared by the relational backends

use std::fmt::Write;

use crate::cursor::Cursor;
use crate::error::StoreResult;
use crate::model::to_nanos;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
    MySql,
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
            Dialect::MySql => "mysql",
        }
    }

    /// Clause turning an `INSERT` into an upsert on `key` that overwrites `columns`.
    pub fn upsert_clause(&self, key: &str, columns: &[&str]) -> String {
        match self {
            Dialect::Sqlite | Dialect::Postgres => {
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} = excluded.{}", c, c))
                    .collect();
                format!(" ON CONFLICT ({}) DO UPDATE SET {}", key, sets.join(", "))
            }
            Dialect::MySql => {
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} = VALUES({})", c, c))
                    .collect();
                format!(" ON DUPLICATE KEY UPDATE {}", sets.join(", "))
            }
        }
    }
}

/// A bound parameter or decoded column. The variant carries the SQL type so
/// NULLs stay typed on drivers that need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(Option<String>),
    Int(Option<i64>),
}

impl SqlValue {
    pub fn text(value: impl Into<String>) -> Self {
        SqlValue::Text(Some(value.into()))
    }

    pub fn int(value: i64) -> Self {
        SqlValue::Int(Some(value))
    }
}

/// One `WHERE` term.
#[derive(Debug, Clone)]
pub enum Condition {
    Eq(&'static str, SqlValue),
    Lt(&'static str, SqlValue),
    Le(&'static str, SqlValue),
    /// `column IN (..)`; an empty list matches nothing
    In(&'static str, Vec<SqlValue>),
    /// Case-insensitive substring match, wildcards in the needle are literal
    Contains(&'static str, String),
    /// Rows strictly after a cursor in `(column desc, id desc)` order
    After(&'static str, Cursor),
}

const LIKE_ESCAPE: char = '!';

/// Escape `%`, `_` and the escape character itself for a `LIKE .. ESCAPE '!'`.
pub fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    for c in needle.chars() {
        if c == '%' || c == '_' || c == LIKE_ESCAPE {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// SQL text plus its parameters, numbered for the target dialect.
#[derive(Debug, Clone)]
pub struct Statement {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }

    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub fn push_bind(&mut self, value: SqlValue) -> &mut Self {
        self.params.push(value);
        match self.dialect {
            Dialect::Postgres => {
                let _ = write!(self.sql, "${}", self.params.len());
            }
            Dialect::Sqlite | Dialect::MySql => self.sql.push('?'),
        }
        self
    }

    /// Comma separated placeholders for `values`.
    pub fn push_binds(&mut self, values: impl IntoIterator<Item = SqlValue>) -> &mut Self {
        for (i, value) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_bind(value);
        }
        self
    }

    /// Append ` WHERE a AND b ..`; nothing when `conditions` is empty.
    pub fn push_where(&mut self, conditions: &[Condition]) -> StoreResult<&mut Self> {
        for (i, condition) in conditions.iter().enumerate() {
            self.push(if i == 0 { " WHERE " } else { " AND " });
            self.push_condition(condition)?;
        }
        Ok(self)
    }

    fn push_condition(&mut self, condition: &Condition) -> StoreResult<()> {
        match condition {
            Condition::Eq(column, value) => {
                self.push(column).push(" = ").push_bind(value.clone());
            }
            Condition::Lt(column, value) => {
                self.push(column).push(" < ").push_bind(value.clone());
            }
            Condition::Le(column, value) => {
                self.push(column).push(" <= ").push_bind(value.clone());
            }
            Condition::In(_, values) if values.is_empty() => {
                self.push("1 = 0");
            }
            Condition::In(column, values) => {
                self.push(column).push(" IN (").push_binds(values.iter().cloned()).push(")");
            }
            Condition::Contains(column, needle) => {
                let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
                self.push("LOWER(")
                    .push(column)
                    .push(") LIKE ")
                    .push_bind(SqlValue::text(pattern))
                    .push(" ESCAPE '!'");
            }
            Condition::After(column, cursor) => {
                let sv = to_nanos(cursor.sort_value)?;
                self.push("(")
                    .push(column)
                    .push(" < ")
                    .push_bind(SqlValue::int(sv))
                    .push(" OR (")
                    .push(column)
                    .push(" = ")
                    .push_bind(SqlValue::int(sv))
                    .push(" AND id < ")
                    .push_bind(SqlValue::text(cursor.id.clone()))
                    .push("))");
            }
        }
        Ok(())
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_placeholders_per_dialect() {
        let conditions = [
            Condition::Eq("project_id", SqlValue::text("p")),
            Condition::In("status", vec![SqlValue::text("draft"), SqlValue::text("pending")]),
        ];

        let mut pg = Statement::new(Dialect::Postgres);
        pg.push("SELECT id FROM plan_documents").push_where(&conditions).unwrap();
        assert_eq!(
            pg.sql(),
            "SELECT id FROM plan_documents WHERE project_id = $1 AND status IN ($2, $3)"
        );

        let mut my = Statement::new(Dialect::MySql);
        my.push("SELECT id FROM plan_documents").push_where(&conditions).unwrap();
        assert_eq!(
            my.sql(),
            "SELECT id FROM plan_documents WHERE project_id = ? AND status IN (?, ?)"
        );
        assert_eq!(my.params().len(), 3);
    }

    #[test]
    fn test_upsert_clause() {
        assert_eq!(
            Dialect::Postgres.upsert_clause("user_id", &["password_hash", "updated_at"]),
            " ON CONFLICT (user_id) DO UPDATE SET password_hash = excluded.password_hash, updated_at = excluded.updated_at"
        );
        assert_eq!(
            Dialect::MySql.upsert_clause("user_id", &["password_hash"]),
            " ON DUPLICATE KEY UPDATE password_hash = VALUES(password_hash)"
        );
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let mut stmt = Statement::new(Dialect::Sqlite);
        stmt.push("SELECT id FROM t")
            .push_where(&[Condition::In("id", Vec::new())])
            .unwrap();
        assert_eq!(stmt.sql(), "SELECT id FROM t WHERE 1 = 0");
        assert!(stmt.params().is_empty());
    }

    #[test]
    fn test_keyset_predicate() {
        let cursor = Cursor {
            sort_value: Utc.timestamp_opt(1, 5).unwrap(),
            id: "m".to_string(),
        };
        let mut stmt = Statement::new(Dialect::Postgres);
        stmt.push_where(&[Condition::After("updated_at", cursor)]).unwrap();
        assert_eq!(
            stmt.sql(),
            " WHERE (updated_at < $1 OR (updated_at = $2 AND id < $3))"
        );
        assert_eq!(stmt.params()[0], SqlValue::int(1_000_000_005));
        assert_eq!(stmt.params()[2], SqlValue::text("m"));
    }

    #[test]
    fn test_like_escaping() {
        assert_eq!(escape_like("100%_done!"), "100!%!_done!!");

        let mut stmt = Statement::new(Dialect::Sqlite);
        stmt.push_where(&[Condition::Contains("description", "50% Off".to_string())])
            .unwrap();
        assert_eq!(stmt.sql(), " WHERE LOWER(description) LIKE ? ESCAPE '!'");
        assert_eq!(stmt.params()[0], SqlValue::text("%50!% off%"));
    }
}
