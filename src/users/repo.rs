use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewUser, User, UserRow, UserType, UserUpdate};
use crate::store::StoreResult;

/// Persistence seam of the user directory.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_type(&self, id: i32) -> StoreResult<Option<UserType>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    /// Fails with a unique violation if email or username is taken.
    async fn insert(&self, user: NewUser) -> StoreResult<User>;
    async fn list(&self) -> StoreResult<Vec<User>>;
    async fn update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>>;
    async fn delete(&self, id: Uuid) -> StoreResult<bool>;
    /// Bulk quota reset for one tier; returns the number of users touched.
    async fn reset_quota_for_type(&self, type_id: i32, remaining_time: i64) -> StoreResult<u64>;
}

/// Column list matching [`UserRow`], for a source aliased `u` joined to `user_types t`.
pub(crate) const USER_COLUMNS: &str = r#"
    u.id, u.name, u.username, u.email, u.password_hash, u.remaining_time,
    u.reached_time_limit, u.type_id, t.name AS type_name, u.created_at
"#;

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_where(&self, predicate: &str, value: &str) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN user_types t ON t.id = u.type_id WHERE {predicate}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_type(&self, id: i32) -> StoreResult<Option<UserType>> {
        let row = sqlx::query_as::<_, (i32, String)>(
            r#"SELECT id, name FROM user_types WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(|(id, name)| UserType { id, name }))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN user_types t ON t.id = u.type_id WHERE u.id = $1"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        self.find_where("u.email = $1", email).await
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        self.find_where("u.username = $1", username).await
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let sql = format!(
            r#"
            WITH u AS (
                INSERT INTO users (id, name, username, email, password_hash, remaining_time, type_id)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING *
            )
            SELECT {USER_COLUMNS} FROM u JOIN user_types t ON t.id = u.type_id
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.remaining_time)
            .bind(user.type_id)
            .fetch_one(&self.db)
            .await?;
        Ok(row.into())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN user_types t ON t.id = u.type_id ORDER BY u.created_at, u.id"
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>> {
        let sql = format!(
            r#"
            WITH u AS (
                UPDATE users
                   SET name = $2,
                       remaining_time = $3,
                       reached_time_limit = $4,
                       type_id = COALESCE($5, type_id),
                       updated_at = now()
                 WHERE id = $1
                RETURNING *
            )
            SELECT {USER_COLUMNS} FROM u JOIN user_types t ON t.id = u.type_id
            "#
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(&update.name)
            .bind(update.remaining_time)
            .bind(update.reached_time_limit)
            .bind(update.type_id)
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(User::from))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let res = sqlx::query(r#"DELETE FROM users WHERE id = $1"#)
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn reset_quota_for_type(&self, type_id: i32, remaining_time: i64) -> StoreResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE users
               SET remaining_time = $2,
                   reached_time_limit = FALSE,
                   updated_at = now()
             WHERE type_id = $1
            "#,
        )
        .bind(type_id)
        .bind(remaining_time)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected())
    }
}
