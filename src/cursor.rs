//! Opaque pagination cursor
//!
//! A cursor is the base64 encoding of `{"sv": <RFC3339 nanos>, "id": <id>}`:
//! the sort value and id of the last row of the previous page.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub sort_value: DateTime<Utc>,
    pub id: String,
}

#[derive(Serialize, Deserialize)]
struct Wire {
    sv: String,
    id: String,
}

pub fn encode(sort_value: DateTime<Utc>, id: &str) -> String {
    let wire = Wire {
        sv: sort_value.to_rfc3339_opts(SecondsFormat::Nanos, true),
        id: id.to_string(),
    };
    // Serializing two strings cannot fail
    let json = serde_json::to_vec(&wire).unwrap_or_default();
    STANDARD.encode(json)
}

/// Decode a cursor. Anything unreadable means "start from the beginning".
pub fn decode(token: &str) -> Option<Cursor> {
    if token.is_empty() {
        return None;
    }
    let bytes = STANDARD.decode(token).ok()?;
    let wire: Wire = serde_json::from_slice(&bytes).ok()?;
    let sort_value = DateTime::parse_from_rfc3339(&wire.sv).ok()?.with_timezone(&Utc);
    Some(Cursor {
        sort_value,
        id: wire.id,
    })
}

impl Cursor {
    /// Whether a row at `(sort_value, id)` sorts strictly after this cursor
    /// in descending order.
    pub fn admits(&self, sort_value: DateTime<Utc>, id: &str) -> bool {
        sort_value < self.sort_value || (sort_value == self.sort_value && id < self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_roundtrip_keeps_nanoseconds() {
        let ts = Utc.timestamp_opt(1_700_000_000, 5).unwrap();
        let token = encode(ts, "b7c1");
        let cursor = decode(&token).unwrap();
        assert_eq!(cursor.sort_value, ts);
        assert_eq!(cursor.id, "b7c1");
    }

    #[test]
    fn test_wire_format() {
        let ts = Utc.timestamp_opt(0, 0).unwrap();
        let token = encode(ts, "x");
        let json = String::from_utf8(STANDARD.decode(token).unwrap()).unwrap();
        assert_eq!(json, r#"{"sv":"1970-01-01T00:00:00.000000000Z","id":"x"}"#);
    }

    #[test]
    fn test_garbage_starts_from_beginning() {
        assert!(decode("").is_none());
        assert!(decode("not base64 !!").is_none());
        assert!(decode(&STANDARD.encode("plain text")).is_none());
        assert!(decode(&STANDARD.encode(r#"{"sv":"yesterday","id":"a"}"#)).is_none());
    }

    #[test]
    fn test_admits_is_strict() {
        let ts = Utc.timestamp_opt(100, 0).unwrap();
        let cursor = Cursor {
            sort_value: ts,
            id: "m".to_string(),
        };
        assert!(cursor.admits(ts, "a"));
        assert!(!cursor.admits(ts, "m"));
        assert!(!cursor.admits(ts, "z"));
        assert!(cursor.admits(Utc.timestamp_opt(99, 0).unwrap(), "z"));
        assert!(!cursor.admits(Utc.timestamp_opt(101, 0).unwrap(), "a"));
    }
}
