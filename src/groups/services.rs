use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    repo::GroupRepo,
    repo_types::{Group, GroupKind, NewGroup},
};
use crate::{
    error::{AppError, AppResult},
    store::StoreError,
    users::repo_types::User,
};

/// Result of [`GroupLifecycle::leave`].
#[derive(Debug)]
pub enum LeaveOutcome {
    /// A participant left; the group is still live.
    Left(Group),
    /// The admin left; this is the group as it was when it was deleted.
    Terminated(Group),
}

fn group_not_found() -> AppError {
    AppError::NotFound("Group not found.".into())
}

/// Creation, membership and termination of groups and conferences.
#[derive(Clone)]
pub struct GroupLifecycle {
    repo: Arc<dyn GroupRepo>,
}

impl GroupLifecycle {
    pub fn new(repo: Arc<dyn GroupRepo>) -> Self {
        Self { repo }
    }

    pub async fn list_all(&self) -> AppResult<Vec<Group>> {
        Ok(self.repo.list().await?)
    }

    /// Admission order: existing group, then quota, then the requested type.
    #[instrument(skip(self, caller), fields(admin = %caller.username))]
    pub async fn create(&self, caller: &User, requested_type: &str) -> AppResult<Group> {
        if self.repo.find_by_admin_id(caller.id).await?.is_some() {
            warn!("admin already owns a group");
            return Err(AppError::Conflict(
                "You already have a group chat or conference.".into(),
            ));
        }

        if caller.reached_time_limit {
            warn!("admin reached time limit");
            return Err(AppError::QuotaExceeded(
                "This user already reached time limit this month.".into(),
            ));
        }

        let kind: GroupKind = requested_type.parse().map_err(|_| {
            AppError::InvalidArgument("Group type must be either Group or Conference.".into())
        })?;

        let group = self
            .repo
            .create(NewGroup {
                id: Uuid::new_v4(),
                admin_id: caller.id,
                admin_username: caller.username.clone(),
                kind,
            })
            .await?;

        info!(group_id = %group.id, kind = %group.kind, "group created");
        Ok(group)
    }

    /// Appends the caller to the group; repeated joins add repeated entries.
    #[instrument(skip(self, caller), fields(user = %caller.username))]
    pub async fn join(&self, caller: &User, admin_username: &str) -> AppResult<Group> {
        let group = self
            .repo
            .find_by_admin_username(admin_username)
            .await?
            .ok_or_else(group_not_found)?;

        match self.repo.add_participant(group.id, caller.id).await {
            Ok(()) => {}
            // terminated between lookup and insert
            Err(StoreError::ForeignKeyViolation) => return Err(group_not_found()),
            Err(e) => return Err(e.into()),
        }

        let group = self
            .repo
            .find_by_id(group.id)
            .await?
            .ok_or_else(group_not_found)?;
        info!(group_id = %group.id, participants = group.participants.len(), "user joined group");
        Ok(group)
    }

    /// Admin departure terminates the group and settles the admin's quota.
    /// A participant's departure only removes its membership.
    #[instrument(skip(self, caller), fields(user = %caller.username))]
    pub async fn leave(
        &self,
        caller: &User,
        admin_username: &str,
        remaining_time: i64,
    ) -> AppResult<LeaveOutcome> {
        if remaining_time < 0 {
            return Err(AppError::InvalidArgument(
                "Remaining time must not be negative.".into(),
            ));
        }

        let mut group = self
            .repo
            .find_by_admin_username(admin_username)
            .await?
            .ok_or_else(group_not_found)?;

        if group.admin_id == caller.id {
            if !self
                .repo
                .terminate(group.id, caller.id, remaining_time)
                .await?
            {
                return Err(group_not_found());
            }

            group.admin.remaining_time = remaining_time;
            if remaining_time == 0 {
                group.admin.reached_time_limit = true;
            }
            group.participants.clear();
            info!(
                group_id = %group.id,
                remaining_time,
                reached_time_limit = group.admin.reached_time_limit,
                "group terminated by admin"
            );
            return Ok(LeaveOutcome::Terminated(group));
        }

        if !group.has_participant(caller.id) {
            debug!(group_id = %group.id, "caller was not a participant");
        }
        self.repo.remove_participant(group.id, caller.id).await?;
        let group = self
            .repo
            .find_by_id(group.id)
            .await?
            .ok_or_else(group_not_found)?;
        info!(group_id = %group.id, "participant left group");
        Ok(LeaveOutcome::Left(group))
    }
}
