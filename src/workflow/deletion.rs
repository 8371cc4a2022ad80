use chrono::Utc;
use uuid::Uuid;

use super::require;
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{CreateDeletionRequest, DeletionStatus, PendingDeletion, Role, User},
    repository::Repository,
    storage::Collection,
};

/// request
///
/// Files a deletion request against an existing user, snapshotting the target's
/// identity. At most one request per user may be pending.
pub async fn request(repo: &Repository, requester: &AuthUser, req: CreateDeletionRequest) -> AppResult<PendingDeletion> {
    require("reason", &req.reason)?;

    repo.transaction(&[Collection::Users, Collection::PendingDeletions], |tx| {
        let target = tx
            .get::<User>(&req.user_id.to_string())?
            .ok_or_else(|| AppError::not_found("User"))?;

        if tx.list::<PendingDeletion>()?.iter().any(|r| r.user_id == target.id) {
            return Err(AppError::Conflict(
                "A deletion request for this user is already pending".to_string(),
            ));
        }

        let request = PendingDeletion {
            id: Uuid::new_v4(),
            user_id: target.id,
            reason: req.reason.trim().to_string(),
            target_username: target.username,
            target_email: target.email,
            target_role: target.role,
            target_full_name: target.full_name,
            requested_by: requester.username.clone(),
            requested_by_id: requester.id,
            created_at: Utc::now(),
            status: DeletionStatus::Pending,
        };
        tx.insert(&request)?;
        Ok(request)
    })
    .await
}

pub async fn list(repo: &Repository) -> AppResult<Vec<PendingDeletion>> {
    repo.all::<PendingDeletion>().await
}

/// approve
///
/// Deletes the target user and the request in one commit. If either is gone the
/// call fails with `NotFound` and nothing is written, so of two concurrent
/// approvals exactly one succeeds.
pub async fn approve(repo: &Repository, request_id: Uuid) -> AppResult<(PendingDeletion, User)> {
    let key = request_id.to_string();
    repo.transaction(&[Collection::Users, Collection::PendingDeletions], |tx| {
        let request = tx
            .get::<PendingDeletion>(&key)?
            .ok_or_else(|| AppError::not_found("Request"))?;

        let user = tx
            .remove::<User>(&request.user_id.to_string())?
            .ok_or_else(|| AppError::not_found("User"))?;

        tx.remove::<PendingDeletion>(&key)?;
        Ok((request, user))
    })
    .await
}

pub async fn reject(repo: &Repository, request_id: Uuid) -> AppResult<PendingDeletion> {
    let key = request_id.to_string();
    repo.transaction(&[Collection::PendingDeletions], |tx| {
        tx.remove::<PendingDeletion>(&key)?
            .ok_or_else(|| AppError::not_found("Request"))
    })
    .await
}

/// cancel
///
/// Withdraws a request. Only its original requester or an admin may do so; anyone
/// else gets `Forbidden` and the request stays.
pub async fn cancel(repo: &Repository, request_id: Uuid, caller: &AuthUser) -> AppResult<PendingDeletion> {
    let key = request_id.to_string();
    repo.transaction(&[Collection::PendingDeletions], |tx| {
        let request = tx
            .get::<PendingDeletion>(&key)?
            .ok_or_else(|| AppError::not_found("Request"))?;

        if request.requested_by_id != caller.id && caller.role != Role::Admin {
            return Err(AppError::Forbidden(
                "Only the requester or an admin may cancel this request".to_string(),
            ));
        }

        tx.remove::<PendingDeletion>(&key)?;
        Ok(request)
    })
    .await
}
