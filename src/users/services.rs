use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    repo::UserRepo,
    repo_types::{NewUser, User, UserType, UserUpdate},
};
use crate::{
    auth::{
        jwt::Credentials,
        password::{hash_password, verify_password},
    },
    config::QuotaConfig,
    error::{AppError, AppResult},
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Input of [`UserDirectory::register`].
#[derive(Debug)]
pub struct Registration {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub type_id: Option<i32>,
}

/// Owns user records, their tier and their time quota.
#[derive(Clone)]
pub struct UserDirectory {
    repo: Arc<dyn UserRepo>,
    quota: QuotaConfig,
}

impl UserDirectory {
    pub fn new(repo: Arc<dyn UserRepo>, quota: QuotaConfig) -> Self {
        Self { repo, quota }
    }

    async fn require_type(&self, type_id: i32) -> AppResult<UserType> {
        self.repo
            .find_type(type_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User type with ID {type_id} not found.")))
    }

    #[instrument(skip(self, reg), fields(username = %reg.username))]
    pub async fn register(&self, reg: Registration) -> AppResult<User> {
        let email = normalize_email(&reg.email);
        let name = reg.name.trim().to_string();
        let username = reg.username.trim().to_string();

        if name.is_empty() || username.is_empty() {
            return Err(AppError::InvalidArgument(
                "Name and username are required.".into(),
            ));
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AppError::InvalidArgument("Invalid email.".into()));
        }
        if reg.password.len() < MIN_PASSWORD_LEN {
            return Err(AppError::InvalidArgument("Password too short.".into()));
        }

        if self.repo.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AppError::Conflict(
                "User with this email already exists.".into(),
            ));
        }
        if self.repo.find_by_username(&username).await?.is_some() {
            warn!("username already registered");
            return Err(AppError::Conflict(
                "User with this username already exists.".into(),
            ));
        }

        let user_type = self
            .require_type(reg.type_id.unwrap_or(UserType::FREE_ID))
            .await?;

        let password = reg.password;
        let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
            .await
            .map_err(anyhow::Error::from)??;

        // A concurrent registration that slipped past the checks above is
        // stopped by the unique constraints and surfaces as Conflict.
        let user = self
            .repo
            .insert(NewUser {
                id: Uuid::new_v4(),
                name,
                username,
                email,
                password_hash,
                remaining_time: self.quota.default_remaining_ms,
                type_id: user_type.id,
            })
            .await?;

        info!(user_id = %user.id, user_type = %user.user_type.name, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> AppResult<User> {
        let email = normalize_email(email);
        let user = self
            .repo
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::NotFound("User with this email not found.".into()))?;

        let plain = password.to_string();
        let stored = user.password_hash.clone();
        let ok = tokio::task::spawn_blocking(move || verify_password(&plain, &stored))
            .await
            .map_err(anyhow::Error::from)??;

        if !ok {
            warn!(user_id = %user.id, "login invalid password");
            return Err(AppError::Unauthorized("Password incorrect.".into()));
        }
        Ok(user)
    }

    /// Maps verified token credentials to the stored user.
    pub async fn resolve(&self, creds: &Credentials) -> AppResult<User> {
        self.repo
            .find_by_email(&creds.email)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User for this token no longer exists.".into()))
    }

    pub async fn list_all(&self) -> AppResult<Vec<User>> {
        Ok(self.repo.list().await?)
    }

    #[instrument(skip(self, update))]
    pub async fn update(&self, id: Uuid, update: UserUpdate) -> AppResult<User> {
        if update.remaining_time < 0 {
            return Err(AppError::InvalidArgument(
                "Remaining time must not be negative.".into(),
            ));
        }
        if let Some(type_id) = update.type_id {
            self.require_type(type_id).await?;
        }

        let user = self
            .repo
            .update(id, update)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with ID {id} not found.")))?;

        info!(user_id = %user.id, remaining_time = user.remaining_time, "user updated");
        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound(format!("User with ID {id} not found.")));
        }
        info!(user_id = %id, "user deleted");
        Ok(())
    }

    /// Restores the default quota of every free-tier user.
    #[instrument(skip(self))]
    pub async fn reset_all_free_tier_quota(&self) -> AppResult<()> {
        let touched = self
            .repo
            .reset_quota_for_type(UserType::FREE_ID, self.quota.default_remaining_ms)
            .await?;
        info!(users = touched, "free tier quota reset");
        Ok(())
    }
}
