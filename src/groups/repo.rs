use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{Group, GroupKind, GroupRow, NewGroup, ParticipantRow};
use crate::{
    store::{StoreError, StoreResult},
    users::{
        repo::USER_COLUMNS,
        repo_types::{User, UserRow},
    },
};

/// Persistence seam of the group lifecycle.
#[async_trait]
pub trait GroupRepo: Send + Sync {
    async fn list(&self) -> StoreResult<Vec<Group>>;
    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Group>>;
    async fn find_by_admin_id(&self, admin_id: Uuid) -> StoreResult<Option<Group>>;
    async fn find_by_admin_username(&self, admin_username: &str) -> StoreResult<Option<Group>>;
    /// Inserts the group and its admin as first participant, atomically.
    /// A second group for the same admin is a unique violation.
    async fn create(&self, group: NewGroup) -> StoreResult<Group>;
    /// Fails with a foreign key violation if the group is gone.
    async fn add_participant(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    /// Removes every membership row of the user in the group.
    async fn remove_participant(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<()>;
    /// In one transaction: settles the admin's quota, clears membership and
    /// deletes the group. Returns false if the group no longer exists.
    async fn terminate(
        &self,
        group_id: Uuid,
        admin_id: Uuid,
        remaining_time: i64,
    ) -> StoreResult<bool>;
}

const GROUP_COLUMNS: &str = "g.id, g.admin_id, g.admin_username, g.kind, g.created_at";

#[derive(Clone)]
pub struct PgGroupRepo {
    db: PgPool,
}

impl PgGroupRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Expands admin and participants for a batch of group rows.
    async fn hydrate(&self, rows: Vec<GroupRow>) -> StoreResult<Vec<Group>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let group_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let admin_ids: Vec<Uuid> = rows.iter().map(|r| r.admin_id).collect();

        let admins_sql = format!(
            "SELECT {USER_COLUMNS} FROM users u JOIN user_types t ON t.id = u.type_id WHERE u.id = ANY($1)"
        );
        let admins: HashMap<Uuid, User> = sqlx::query_as::<_, UserRow>(&admins_sql)
            .bind(&admin_ids)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(|r| (r.id, User::from(r)))
            .collect();

        let participants_sql = format!(
            r#"
            SELECT gp.group_id, {USER_COLUMNS}
              FROM group_participants gp
              JOIN users u ON u.id = gp.user_id
              JOIN user_types t ON t.id = u.type_id
             WHERE gp.group_id = ANY($1)
             ORDER BY gp.id
            "#
        );
        let mut participants: HashMap<Uuid, Vec<User>> = HashMap::new();
        for row in sqlx::query_as::<_, ParticipantRow>(&participants_sql)
            .bind(&group_ids)
            .fetch_all(&self.db)
            .await?
        {
            participants
                .entry(row.group_id)
                .or_default()
                .push(row.user.into());
        }

        rows.into_iter()
            .map(|row| -> StoreResult<Group> {
                let kind = row
                    .kind
                    .parse::<GroupKind>()
                    .map_err(|e| StoreError::Other(e.to_string()))?;
                let admin = admins
                    .get(&row.admin_id)
                    .cloned()
                    .ok_or_else(|| StoreError::Other(format!("group {} has no admin", row.id)))?;
                Ok(Group {
                    id: row.id,
                    admin_id: row.admin_id,
                    admin_username: row.admin_username,
                    admin,
                    kind,
                    participants: participants.remove(&row.id).unwrap_or_default(),
                    created_at: row.created_at,
                })
            })
            .collect()
    }

    async fn find_one(&self, predicate: &str, bind: FindBy<'_>) -> StoreResult<Option<Group>> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM groups g WHERE {predicate}");
        let query = sqlx::query_as::<_, GroupRow>(&sql);
        let row = match bind {
            FindBy::Id(id) => query.bind(id),
            FindBy::Text(text) => query.bind(text),
        }
        .fetch_optional(&self.db)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row]).await?.pop())
    }
}

enum FindBy<'a> {
    Id(Uuid),
    Text(&'a str),
}

#[async_trait]
impl GroupRepo for PgGroupRepo {
    async fn list(&self) -> StoreResult<Vec<Group>> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM groups g ORDER BY g.created_at, g.id");
        let rows = sqlx::query_as::<_, GroupRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        self.hydrate(rows).await
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Group>> {
        self.find_one("g.id = $1", FindBy::Id(id)).await
    }

    async fn find_by_admin_id(&self, admin_id: Uuid) -> StoreResult<Option<Group>> {
        self.find_one("g.admin_id = $1", FindBy::Id(admin_id)).await
    }

    async fn find_by_admin_username(&self, admin_username: &str) -> StoreResult<Option<Group>> {
        self.find_one("g.admin_username = $1", FindBy::Text(admin_username))
            .await
    }

    async fn create(&self, group: NewGroup) -> StoreResult<Group> {
        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO groups (id, admin_id, admin_username, kind)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(group.id)
        .bind(group.admin_id)
        .bind(&group.admin_username)
        .bind(group.kind.as_str())
        .execute(&mut *tx)
        .await?;
        sqlx::query(r#"INSERT INTO group_participants (group_id, user_id) VALUES ($1, $2)"#)
            .bind(group.id)
            .bind(group.admin_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.find_by_id(group.id)
            .await?
            .ok_or_else(|| StoreError::Other(format!("group {} vanished after insert", group.id)))
    }

    async fn add_participant(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        sqlx::query(r#"INSERT INTO group_participants (group_id, user_id) VALUES ($1, $2)"#)
            .bind(group_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn remove_participant(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        sqlx::query(r#"DELETE FROM group_participants WHERE group_id = $1 AND user_id = $2"#)
            .bind(group_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn terminate(
        &self,
        group_id: Uuid,
        admin_id: Uuid,
        remaining_time: i64,
    ) -> StoreResult<bool> {
        let mut tx = self.db.begin().await?;

        // Lock the group row so two admin departures cannot both settle quota.
        let locked = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM groups WHERE id = $1 AND admin_id = $2 FOR UPDATE"#,
        )
        .bind(group_id)
        .bind(admin_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Ok(false);
        }

        sqlx::query(
            r#"
            UPDATE users
               SET remaining_time = $2,
                   reached_time_limit = reached_time_limit OR $2 = 0,
                   updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(admin_id)
        .bind(remaining_time)
        .execute(&mut *tx)
        .await?;
        sqlx::query(r#"DELETE FROM group_participants WHERE group_id = $1"#)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(r#"DELETE FROM groups WHERE id = $1"#)
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
