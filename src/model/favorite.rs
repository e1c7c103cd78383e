use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{composite_key, fill, Record, SortField};
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteTargetType {
    #[default]
    Session,
    Plan,
}

impl FavoriteTargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FavoriteTargetType::Session => "session",
            FavoriteTargetType::Plan => "plan",
        }
    }
}

impl FromStr for FavoriteTargetType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "session" => Ok(FavoriteTargetType::Session),
            "plan" => Ok(FavoriteTargetType::Plan),
            other => Err(StoreError::Validation(format!("favorite target type: {}", other))),
        }
    }
}

impl fmt::Display for FavoriteTargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user's bookmark on a session or plan. Unique per (user, type, target).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserFavorite {
    pub id: String,
    pub user_id: String,
    pub target_type: FavoriteTargetType,
    pub target_id: String,
    pub created_at: DateTime<Utc>,
}

impl UserFavorite {
    pub fn new(
        user_id: impl Into<String>,
        target_type: FavoriteTargetType,
        target_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            target_type,
            target_id: target_id.into(),
            ..Default::default()
        }
    }

    /// Composite natural key over `(user, type, target)`.
    pub fn target_key(&self) -> String {
        target_key(&self.user_id, self.target_type, &self.target_id)
    }
}

pub(crate) fn target_key(user_id: &str, target_type: FavoriteTargetType, target_id: &str) -> String {
    composite_key(&[user_id, target_type.as_str(), target_id])
}

impl Record for UserFavorite {
    const KIND: &'static str = "favorite";

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
