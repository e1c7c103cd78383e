use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::{composite_key, fill, Record, SortField};

/// Account owning sessions, keys and favorites. Unique on `email`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, display_name: impl Into<String>) -> Self {
        Self {
            email: normalize_email(email),
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    /// Name to show; falls back to the email when no name was given.
    pub fn display_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.email
        } else {
            &self.display_name
        }
    }
}

impl Record for User {
    const KIND: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        self.email = normalize_email(&self.email);
        fill(&mut self.created_at, now);
        let created = self.created_at;
        fill(&mut self.updated_at, created);
    }

    fn sort_value(&self, field: SortField) -> DateTime<Utc> {
        match field {
            SortField::UpdatedAt => self.updated_at,
            SortField::CreatedAt => self.created_at,
        }
    }
}

/// Emails compare case-insensitively and without surrounding whitespace.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hex SHA-256 digest of a secret; the only form in which secrets are stored.
pub fn hash_secret(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

fn random_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

const API_KEY_PREFIX_LEN: usize = 8;

/// API key record. The secret itself is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub key_hash: String,
    /// Leading characters of the secret, safe to display
    pub key_prefix: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ApiKey {
    /// Create a key for `user_id`, returning the record and the one-time secret.
    pub fn issue(user_id: impl Into<String>, name: impl Into<String>) -> (Self, String) {
        let secret = format!("al_{}", random_token());
        let key = Self {
            user_id: user_id.into(),
            name: name.into(),
            key_hash: hash_secret(&secret),
            key_prefix: secret[..API_KEY_PREFIX_LEN].to_string(),
            ..Default::default()
        };
        (key, secret)
    }
}

impl Record for ApiKey {
    const KIND: &'static str = "api key";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        fill(&mut self.created_at, now);
    }

    fn sort_key(_field: SortField) -> &'static str {
        "created_at"
    }

    fn sort_value(&self, _field: SortField) -> DateTime<Utc> {
        self.created_at
    }
}

/// Browser login session. The id is the bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WebSession {
    pub id: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl WebSession {
    pub fn issue(user_id: impl Into<String>, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            id: random_token(),
            user_id: user_id.into(),
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

impl Record for WebSession {
    const KIND: &'static str = "web session";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        fill(&mut self.created_at, now);
    }

    fn sort_key(_field: SortField) -> &'static str {
        "created_at"
    }

    fn sort_value(&self, _field: SortField) -> DateTime<Utc> {
        self.created_at
    }
}

/// Password hash of a user, one per user and keyed by `user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PasswordCredential {
    pub user_id: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PasswordCredential {
    pub fn new(user_id: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            password_hash: password_hash.into(),
            ..Default::default()
        }
    }
}

impl Record for PasswordCredential {
    const KIND: &'static str = "password credential";

    fn id(&self) -> &str {
        &self.user_id
    }

    fn set_id(&mut self, id: String) {
        self.user_id = id;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        fill(&mut self.created_at, now);
        fill(&mut self.updated_at, now);
    }

    fn sort_value(&self, field: SortField) -> DateTime<Utc> {
        match field {
            SortField::UpdatedAt => self.updated_at,
            SortField::CreatedAt => self.created_at,
        }
    }
}

/// Link between a user and an external identity provider account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OAuthConnection {
    pub id: String,
    pub user_id: String,
    pub provider: String,
    pub provider_user_id: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OAuthConnection {
    pub fn new(
        user_id: impl Into<String>,
        provider: impl Into<String>,
        provider_user_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            provider: provider.into(),
            provider_user_id: provider_user_id.into(),
            ..Default::default()
        }
    }

    /// Composite natural key over `(provider, provider_user_id)`.
    pub fn identity_key(&self) -> String {
        identity_key(&self.provider, &self.provider_user_id)
    }
}

pub(crate) fn identity_key(provider: &str, provider_user_id: &str) -> String {
    composite_key(&[provider, provider_user_id])
}

impl Record for OAuthConnection {
    const KIND: &'static str = "oauth connection";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn stamp(&mut self, now: DateTime<Utc>) {
        fill(&mut self.created_at, now);
    }

    fn sort_key(_field: SortField) -> &'static str {
        "created_at"
    }

    fn sort_value(&self, _field: SortField) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_to_email() {
        let user = User::new("  Ada@Example.COM ", "");
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.display_name(), "ada@example.com");

        let named = User::new("ada@example.com", "Ada");
        assert_eq!(named.display_name(), "Ada");
    }

    #[test]
    fn test_issue_api_key_stores_only_hash() {
        let (key, secret) = ApiKey::issue("u1", "laptop");
        assert!(secret.starts_with("al_"));
        assert_eq!(key.key_prefix, &secret[..8]);
        assert_eq!(key.key_hash, hash_secret(&secret));
        assert_ne!(key.key_hash, secret);
        assert_eq!(key.key_hash.len(), 64);
    }

    #[test]
    fn test_web_session_expiry() {
        let now = Utc::now();
        let session = WebSession::issue("u1", Duration::hours(1), now);
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + Duration::hours(1)));
        assert_eq!(session.id.len(), 64);
    }

    #[test]
    fn test_identity_key() {
        let conn = OAuthConnection::new("u1", "github", "42");
        assert_eq!(conn.identity_key(), "6:github2:42");
        assert_ne!(identity_key("gh#x", "1"), identity_key("gh", "x#1"));
    }
}
