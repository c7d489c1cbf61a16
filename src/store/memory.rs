use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{StoreError, StoreResult};
use crate::{
    groups::{
        repo::GroupRepo,
        repo_types::{Group, GroupKind, NewGroup},
    },
    users::{
        repo::UserRepo,
        repo_types::{NewUser, User, UserType, UserUpdate},
    },
};

struct GroupRecord {
    id: Uuid,
    admin_id: Uuid,
    admin_username: String,
    kind: GroupKind,
    created_at: OffsetDateTime,
}

struct Inner {
    types: Vec<UserType>,
    users: Vec<User>,
    groups: Vec<GroupRecord>,
    memberships: Vec<(Uuid, Uuid)>, // (group, user) in join order
}

impl Inner {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn expand(&self, record: &GroupRecord) -> StoreResult<Group> {
        let admin = self
            .user(record.admin_id)
            .cloned()
            .ok_or_else(|| StoreError::Other(format!("group {} has no admin", record.id)))?;
        let participants = self
            .memberships
            .iter()
            .filter(|(g, _)| *g == record.id)
            .filter_map(|(_, u)| self.user(*u).cloned())
            .collect();
        Ok(Group {
            id: record.id,
            admin_id: record.admin_id,
            admin_username: record.admin_username.clone(),
            admin,
            kind: record.kind,
            participants,
            created_at: record.created_at,
        })
    }

    fn find_group(&self, pred: impl Fn(&GroupRecord) -> bool) -> StoreResult<Option<Group>> {
        self.groups
            .iter()
            .find(|g| pred(g))
            .map(|g| self.expand(g))
            .transpose()
    }
}

/// Mutex-guarded store with the same constraints as the Postgres schema:
/// unique email, username and group admin, cascading user deletion.
pub struct MemoryStore {
    inner: Mutex<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        let types = [(1, "Free"), (2, "Premium"), (3, "Pro")]
            .into_iter()
            .map(|(id, name)| UserType {
                id,
                name: name.to_string(),
            })
            .collect();
        Arc::new(Self {
            inner: Mutex::new(Inner {
                types,
                users: Vec::new(),
                groups: Vec::new(),
                memberships: Vec::new(),
            }),
            offline: AtomicBool::new(false),
        })
    }

    /// While offline every call fails as an unreachable store would.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".into()));
        }
        Ok(self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn find_type(&self, id: i32) -> StoreResult<Option<UserType>> {
        Ok(self.lock()?.types.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock()?.user(id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.lock()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.lock()?;
        if inner.users.iter().any(|u| u.email == user.email) {
            return Err(StoreError::UniqueViolation {
                constraint: "users_email_key".into(),
            });
        }
        if inner.users.iter().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation {
                constraint: "users_username_key".into(),
            });
        }
        let user_type = inner
            .types
            .iter()
            .find(|t| t.id == user.type_id)
            .cloned()
            .ok_or(StoreError::ForeignKeyViolation)?;
        let stored = User {
            id: user.id,
            name: user.name,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            remaining_time: user.remaining_time,
            reached_time_limit: false,
            user_type,
            created_at: OffsetDateTime::now_utc(),
        };
        inner.users.push(stored.clone());
        Ok(stored)
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.lock()?.users.clone())
    }

    async fn update(&self, id: Uuid, update: UserUpdate) -> StoreResult<Option<User>> {
        let mut inner = self.lock()?;
        let new_type = match update.type_id {
            Some(type_id) => Some(
                inner
                    .types
                    .iter()
                    .find(|t| t.id == type_id)
                    .cloned()
                    .ok_or(StoreError::ForeignKeyViolation)?,
            ),
            None => None,
        };
        let Some(user) = inner.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        user.name = update.name;
        user.remaining_time = update.remaining_time;
        user.reached_time_limit = update.reached_time_limit;
        if let Some(t) = new_type {
            user.user_type = t;
        }
        Ok(Some(user.clone()))
    }

    async fn delete(&self, id: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        let before = inner.users.len();
        inner.users.retain(|u| u.id != id);
        if inner.users.len() == before {
            return Ok(false);
        }
        let owned: Vec<Uuid> = inner
            .groups
            .iter()
            .filter(|g| g.admin_id == id)
            .map(|g| g.id)
            .collect();
        inner.groups.retain(|g| g.admin_id != id);
        inner
            .memberships
            .retain(|(g, u)| *u != id && !owned.contains(g));
        Ok(true)
    }

    async fn reset_quota_for_type(&self, type_id: i32, remaining_time: i64) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let mut touched = 0;
        for user in inner.users.iter_mut().filter(|u| u.user_type.id == type_id) {
            user.remaining_time = remaining_time;
            user.reached_time_limit = false;
            touched += 1;
        }
        Ok(touched)
    }
}

#[async_trait]
impl GroupRepo for MemoryStore {
    async fn list(&self) -> StoreResult<Vec<Group>> {
        let inner = self.lock()?;
        inner.groups.iter().map(|g| inner.expand(g)).collect()
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Group>> {
        self.lock()?.find_group(|g| g.id == id)
    }

    async fn find_by_admin_id(&self, admin_id: Uuid) -> StoreResult<Option<Group>> {
        self.lock()?.find_group(|g| g.admin_id == admin_id)
    }

    async fn find_by_admin_username(&self, admin_username: &str) -> StoreResult<Option<Group>> {
        self.lock()?.find_group(|g| g.admin_username == admin_username)
    }

    async fn create(&self, group: NewGroup) -> StoreResult<Group> {
        let mut inner = self.lock()?;
        if inner.groups.iter().any(|g| g.admin_id == group.admin_id) {
            return Err(StoreError::UniqueViolation {
                constraint: "groups_admin_id_key".into(),
            });
        }
        if inner.user(group.admin_id).is_none() {
            return Err(StoreError::ForeignKeyViolation);
        }
        inner.groups.push(GroupRecord {
            id: group.id,
            admin_id: group.admin_id,
            admin_username: group.admin_username,
            kind: group.kind,
            created_at: OffsetDateTime::now_utc(),
        });
        inner.memberships.push((group.id, group.admin_id));
        inner
            .find_group(|g| g.id == group.id)?
            .ok_or_else(|| StoreError::Other("group vanished after insert".into()))
    }

    async fn add_participant(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        let mut inner = self.lock()?;
        if !inner.groups.iter().any(|g| g.id == group_id) || inner.user(user_id).is_none() {
            return Err(StoreError::ForeignKeyViolation);
        }
        inner.memberships.push((group_id, user_id));
        Ok(())
    }

    async fn remove_participant(&self, group_id: Uuid, user_id: Uuid) -> StoreResult<()> {
        self.lock()?
            .memberships
            .retain(|(g, u)| !(*g == group_id && *u == user_id));
        Ok(())
    }

    async fn terminate(
        &self,
        group_id: Uuid,
        admin_id: Uuid,
        remaining_time: i64,
    ) -> StoreResult<bool> {
        let mut inner = self.lock()?;
        if !inner
            .groups
            .iter()
            .any(|g| g.id == group_id && g.admin_id == admin_id)
        {
            return Ok(false);
        }
        if let Some(admin) = inner.users.iter_mut().find(|u| u.id == admin_id) {
            admin.remaining_time = remaining_time;
            admin.reached_time_limit |= remaining_time == 0;
        }
        inner.memberships.retain(|(g, _)| *g != group_id);
        inner.groups.retain(|g| g.id != group_id);
        Ok(true)
    }
}
