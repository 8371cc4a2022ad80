use chrono::Utc;
use uuid::Uuid;

use super::{ensure_pending_identity_free, ensure_user_identity_free, require};
use crate::{
    auth::{hash_password, verify_password},
    config::BootstrapAdmin,
    error::{AppError, AppResult},
    models::{CreateUserRequest, PendingDeletion, Role, UpdateUserRequest, User, UserStatus},
    repository::Repository,
    storage::Collection,
};

/// LoginOutcome
///
/// Result of checking credentials. The failure variants are only distinguished in
/// the audit log; clients always see the same `Unauthorized` message.
#[derive(Debug)]
pub enum LoginOutcome {
    Success(User),
    UnknownUser,
    Inactive(UserStatus),
    BadPassword,
}

impl LoginOutcome {
    pub fn failure_reason(&self) -> &'static str {
        match self {
            LoginOutcome::Success(_) => "",
            LoginOutcome::UnknownUser => "User not found",
            LoginOutcome::Inactive(_) => "Account not active",
            LoginOutcome::BadPassword => "Invalid password",
        }
    }
}

pub async fn authenticate(repo: &Repository, username: &str, password: &str) -> AppResult<LoginOutcome> {
    let user = repo
        .all::<User>()
        .await?
        .into_iter()
        .find(|user| user.username == username);

    let Some(user) = user else {
        return Ok(LoginOutcome::UnknownUser);
    };
    if user.status != UserStatus::Active {
        return Ok(LoginOutcome::Inactive(user.status));
    }
    if !verify_password(password, &user.password_hash).await? {
        return Ok(LoginOutcome::BadPassword);
    }
    Ok(LoginOutcome::Success(user))
}

pub async fn list_users(repo: &Repository) -> AppResult<Vec<User>> {
    repo.all::<User>().await
}

pub async fn get_user(repo: &Repository, id: Uuid) -> AppResult<User> {
    repo.find::<User>(&id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

/// create_user
///
/// Direct account creation by an admin, bypassing the registration queue. The
/// account is active unless a status is given.
pub async fn create_user(repo: &Repository, req: CreateUserRequest, bcrypt_cost: u32) -> AppResult<User> {
    require("username", &req.username)?;
    require("email", &req.email)?;
    require("password", &req.password)?;

    let user = User {
        id: Uuid::new_v4(),
        username: req.username.trim().to_string(),
        email: req.email.trim().to_string(),
        password_hash: hash_password(&req.password, bcrypt_cost).await?,
        full_name: req.full_name,
        role: req.role,
        status: req.status.unwrap_or(UserStatus::Active),
        created_at: Utc::now(),
        approved_by: None,
        approved_at: None,
    };

    repo.transaction(&[Collection::Users, Collection::PendingUsers], |tx| {
        ensure_user_identity_free(tx, &user.username, &user.email, None)?;
        ensure_pending_identity_free(tx, &user.username, &user.email, None)?;
        tx.insert(&user)
    })
    .await?;

    Ok(user)
}

/// update_user
///
/// Applies the present fields. A new password is re-hashed; a new username or email
/// must still be unique.
pub async fn update_user(
    repo: &Repository,
    id: Uuid,
    req: UpdateUserRequest,
    bcrypt_cost: u32,
) -> AppResult<User> {
    let password_hash = match req.password.as_deref() {
        Some(password) => {
            require("password", password)?;
            Some(hash_password(password, bcrypt_cost).await?)
        }
        None => None,
    };

    let key = id.to_string();
    repo.transaction(&[Collection::Users, Collection::PendingUsers], |tx| {
        let mut user = tx.get::<User>(&key)?.ok_or_else(|| AppError::not_found("User"))?;

        if let Some(username) = req.username {
            require("username", &username)?;
            user.username = username.trim().to_string();
        }
        if let Some(email) = req.email {
            require("email", &email)?;
            user.email = email.trim().to_string();
        }
        if let Some(hash) = password_hash {
            user.password_hash = hash;
        }
        if let Some(full_name) = req.full_name {
            user.full_name = Some(full_name);
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(status) = req.status {
            user.status = status;
        }

        ensure_user_identity_free(tx, &user.username, &user.email, Some(user.id))?;
        ensure_pending_identity_free(tx, &user.username, &user.email, None)?;

        tx.replace(&key, &user)?;
        Ok(user)
    })
    .await
}

/// delete_user
///
/// Removes the account together with any deletion requests still pending for it.
pub async fn delete_user(repo: &Repository, id: Uuid) -> AppResult<User> {
    let key = id.to_string();
    repo.transaction(&[Collection::Users, Collection::PendingDeletions], |tx| {
        let user = tx
            .remove::<User>(&key)?
            .ok_or_else(|| AppError::not_found("User"))?;

        let requests = tx.list::<PendingDeletion>()?;
        if requests.iter().any(|r| r.user_id == id) {
            let remaining: Vec<PendingDeletion> = requests.into_iter().filter(|r| r.user_id != id).collect();
            tx.replace_all(&remaining)?;
        }
        Ok(user)
    })
    .await
}

/// bootstrap_admin
///
/// Creates the first admin when the user collection is empty. Returns `None` when
/// users already exist.
pub async fn bootstrap_admin(repo: &Repository, admin: &BootstrapAdmin, bcrypt_cost: u32) -> AppResult<Option<User>> {
    if !repo.all::<User>().await?.is_empty() {
        return Ok(None);
    }

    let user = User {
        id: Uuid::new_v4(),
        username: admin.username.clone(),
        email: admin.email.clone(),
        password_hash: hash_password(&admin.password, bcrypt_cost).await?,
        full_name: None,
        role: Role::Admin,
        status: UserStatus::Active,
        created_at: Utc::now(),
        approved_by: None,
        approved_at: None,
    };

    let created = repo
        .transaction(&[Collection::Users], |tx| {
            // Re-checked under the write lock.
            if !tx.list::<User>()?.is_empty() {
                return Ok(false);
            }
            tx.insert(&user)?;
            Ok(true)
        })
        .await?;

    Ok(created.then_some(user))
}
