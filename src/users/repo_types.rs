use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Subscription tier. Seeded reference data, never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserType {
    pub id: i32,
    pub name: String,
}

impl UserType {
    /// Lowest tier; the only one whose quota is reset automatically.
    pub const FREE_ID: i32 = 1;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub remaining_time: i64, // milliseconds
    pub reached_time_limit: bool,
    #[serde(rename = "type")]
    pub user_type: UserType,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Flat row as selected from `users JOIN user_types`.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub remaining_time: i64,
    pub reached_time_limit: bool,
    pub type_id: i32,
    pub type_name: String,
    pub created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            username: r.username,
            email: r.email,
            password_hash: r.password_hash,
            remaining_time: r.remaining_time,
            reached_time_limit: r.reached_time_limit,
            user_type: UserType {
                id: r.type_id,
                name: r.type_name,
            },
            created_at: r.created_at,
        }
    }
}

/// Fields of a user about to be inserted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub remaining_time: i64,
    pub type_id: i32,
}

/// Full replacement of the mutable profile fields.
#[derive(Debug, Clone)]
pub struct UserUpdate {
    pub name: String,
    pub remaining_time: i64,
    pub reached_time_limit: bool,
    pub type_id: Option<i32>,
}
