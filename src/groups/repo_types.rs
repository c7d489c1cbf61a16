use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::repo_types::{User, UserRow};

/// What a group is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Group,
    Conference,
}

impl GroupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupKind::Group => "Group",
            GroupKind::Conference => "Conference",
        }
    }
}

impl fmt::Display for GroupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown group type {0:?}")]
pub struct UnknownGroupKind(pub String);

impl FromStr for GroupKind {
    type Err = UnknownGroupKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Group" => Ok(GroupKind::Group),
            "Conference" => Ok(GroupKind::Conference),
            other => Err(UnknownGroupKind(other.to_string())),
        }
    }
}

/// A live group with its admin and participants expanded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub admin_username: String,
    pub admin: User,
    #[serde(rename = "type")]
    pub kind: GroupKind,
    pub participants: Vec<User>, // join order, duplicates kept
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Group {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.iter().any(|p| p.id == user_id)
    }
}

#[derive(Debug, FromRow)]
pub struct GroupRow {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub admin_username: String,
    pub kind: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, FromRow)]
pub struct ParticipantRow {
    pub group_id: Uuid,
    #[sqlx(flatten)]
    pub user: UserRow,
}

#[derive(Debug, Clone)]
pub struct NewGroup {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub admin_username: String,
    pub kind: GroupKind,
}
