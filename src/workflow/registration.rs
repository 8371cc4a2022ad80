use chrono::Utc;
use uuid::Uuid;

use super::{ensure_pending_identity_free, ensure_user_identity_free, require, same_email};
use crate::{
    auth::{AuthUser, hash_password},
    error::{AppError, AppResult},
    models::{PendingUser, RegisterRequest, Role, User, UserStatus},
    repository::Repository,
    storage::Collection,
};

/// register
///
/// Self-registration: files a `PendingUser` for an admin to decide on. Only
/// `author` and `editor` may be requested. The username and email must be free
/// among both users and pending registrations.
pub async fn register(repo: &Repository, req: RegisterRequest, bcrypt_cost: u32) -> AppResult<PendingUser> {
    require("username", &req.username)?;
    require("email", &req.email)?;
    require("password", &req.password)?;

    let role = req.role.unwrap_or(Role::Author);
    if !matches!(role, Role::Author | Role::Editor) {
        return Err(AppError::Validation("role must be author or editor".to_string()));
    }

    let password_hash = hash_password(&req.password, bcrypt_cost).await?;
    let pending = PendingUser {
        id: Uuid::new_v4(),
        username: req.username.trim().to_string(),
        email: req.email.trim().to_string(),
        password_hash,
        full_name: req.full_name.filter(|name| !name.trim().is_empty()),
        role,
        submitted_by: req.submitted_by,
        created_at: Utc::now(),
        document: req.document,
    };

    repo.transaction(&[Collection::Users, Collection::PendingUsers], |tx| {
        ensure_user_identity_free(tx, &pending.username, &pending.email, None)?;
        ensure_pending_identity_free(tx, &pending.username, &pending.email, None)?;
        tx.insert(&pending)
    })
    .await?;

    Ok(pending)
}

/// approve
///
/// Turns a pending registration into an active user. Fails with `Conflict`, leaving
/// the registration in place, when its username or email has meanwhile been taken
/// by a user. The user insert and the registration removal commit together.
pub async fn approve(repo: &Repository, pending_id: Uuid, approver: &AuthUser) -> AppResult<User> {
    let key = pending_id.to_string();
    repo.transaction(&[Collection::Users, Collection::PendingUsers], |tx| {
        let pending = tx
            .get::<PendingUser>(&key)?
            .ok_or_else(|| AppError::not_found("Pending user"))?;

        ensure_user_identity_free(tx, &pending.username, &pending.email, None)?;

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: pending.username,
            email: pending.email,
            password_hash: pending.password_hash,
            full_name: pending.full_name,
            role: pending.role,
            status: UserStatus::Active,
            created_at: now,
            approved_by: Some(approver.username.clone()),
            approved_at: Some(now),
        };

        tx.insert(&user)?;
        tx.remove::<PendingUser>(&key)?;
        Ok(user)
    })
    .await
}

/// Rejects a registration outright.
pub async fn discard(repo: &Repository, pending_id: Uuid) -> AppResult<PendingUser> {
    let key = pending_id.to_string();
    repo.transaction(&[Collection::PendingUsers], |tx| {
        tx.remove::<PendingUser>(&key)?
            .ok_or_else(|| AppError::not_found("Pending user"))
    })
    .await
}

pub async fn username_available(repo: &Repository, username: &str) -> AppResult<bool> {
    let username = username.trim();
    let in_users = repo.all::<User>().await?.iter().any(|u| u.username == username);
    let in_pending = repo
        .all::<PendingUser>()
        .await?
        .iter()
        .any(|p| p.username == username);
    Ok(!in_users && !in_pending)
}

pub async fn email_available(repo: &Repository, email: &str) -> AppResult<bool> {
    let in_users = repo.all::<User>().await?.iter().any(|u| same_email(&u.email, email));
    let in_pending = repo
        .all::<PendingUser>()
        .await?
        .iter()
        .any(|p| same_email(&p.email, email));
    Ok(!in_users && !in_pending)
}
