use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;
use uuid::Uuid;

use super::{ApiJson, ApiPath, accept, audit_failure, gate};
use crate::{
    AppState,
    audit::action,
    auth::{Capability, RequestContext},
    error::{AppError, AppResult, ErrorBody},
    models::{
        ApproveUserRequest, CreateDeletionRequest, MessageResponse, PendingDeletion, PendingUser,
        PendingUserView, RegisterRequest, UserView,
    },
    workflow::{deletion, registration},
};

// --- Pending Users ---

/// register
///
/// [Public Route] Self-registration. Files a request an admin must approve before
/// the account exists.
#[utoipa::path(
    post,
    path = "/pendingUsers",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Pending request submitted", body = PendingUserView),
        (status = 400, description = "Missing fields", body = ErrorBody),
        (status = 409, description = "Username or email taken", body = ErrorBody)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<RegisterRequest>>,
) -> AppResult<(StatusCode, Json<PendingUserView>)> {
    let ApiJson(payload) = accept(&state, &ctx, payload, action::PENDING_USER_CREATE_FAILED).await?;
    let target = payload.email.clone();
    let result = registration::register(&state.repo, payload, state.config.bcrypt_cost).await;
    let pending = audit_failure(&state, &ctx, result, action::PENDING_USER_CREATE_FAILED, &target).await?;

    state
        .audit
        .record(
            &ctx,
            action::PENDING_USER_CREATED,
            pending.email.as_str(),
            json!({ "username": pending.username, "role": pending.role, "submittedBy": pending.submitted_by }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(PendingUserView::from(&pending))))
}

#[utoipa::path(
    get,
    path = "/pendingUsers",
    responses(
        (status = 200, description = "Pending registrations", body = [PendingUserView]),
        (status = 403, description = "Admins only", body = ErrorBody)
    )
)]
pub async fn list_pending_users(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<PendingUserView>>> {
    gate(&state, &ctx, Capability::ManageUsers).await?;
    let pending = state.repo.all::<PendingUser>().await?;
    Ok(Json(pending.iter().map(PendingUserView::from).collect()))
}

#[utoipa::path(
    get,
    path = "/pendingUsers/{id}",
    params(("id" = Uuid, Path, description = "Pending user id")),
    responses(
        (status = 200, description = "Pending registration", body = PendingUserView),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_pending_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<PendingUserView>> {
    gate(&state, &ctx, Capability::ManageUsers).await?;
    let pending = state
        .repo
        .find::<PendingUser>(&id.to_string())
        .await?
        .ok_or_else(|| AppError::not_found("Pending user"))?;
    Ok(Json(PendingUserView::from(&pending)))
}

/// discard_pending_user
///
/// [Admin Route] Rejects a registration.
#[utoipa::path(
    delete,
    path = "/pendingUsers/{id}",
    params(("id" = Uuid, Path, description = "Pending user id")),
    responses(
        (status = 200, description = "Pending request removed", body = PendingUserView),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn discard_pending_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
) -> AppResult<Json<PendingUserView>> {
    gate(&state, &ctx, Capability::ManageUsers).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::PENDING_USER_DELETE_FAILED).await?;

    let result = registration::discard(&state.repo, id).await;
    let removed = audit_failure(
        &state,
        &ctx,
        result,
        action::PENDING_USER_DELETE_FAILED,
        &id.to_string(),
    )
    .await?;

    state
        .audit
        .record(&ctx, action::PENDING_USER_DELETED, removed.email.as_str(), json!({ "reason": "Admin action" }))
        .await;
    Ok(Json(PendingUserView::from(&removed)))
}

/// Shared body of both approval entry points. `pending_id` is whatever the
/// route managed to extract; a rejected id is audited as a failed approval.
async fn approve_pending(
    state: &AppState,
    ctx: &RequestContext,
    pending_id: AppResult<Uuid>,
) -> AppResult<Json<UserView>> {
    let approver = gate(state, ctx, Capability::ManageUsers).await?;
    let pending_id = accept(state, ctx, pending_id, action::USER_APPROVE_FAILED).await?;

    let result = registration::approve(&state.repo, pending_id, &approver).await;
    let user = audit_failure(state, ctx, result, action::USER_APPROVE_FAILED, &pending_id.to_string()).await?;

    state
        .audit
        .record(ctx, action::USER_APPROVED, user.username.as_str(), json!({ "role": user.role }))
        .await;
    Ok(Json(UserView::from(&user)))
}

/// approve_user
///
/// [Admin Route] Approves the registration named in the body.
#[utoipa::path(
    post,
    path = "/approve-user",
    request_body = ApproveUserRequest,
    responses(
        (status = 200, description = "User approved", body = UserView),
        (status = 404, description = "Pending user not found", body = ErrorBody),
        (status = 409, description = "User already exists", body = ErrorBody)
    )
)]
pub async fn approve_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<ApproveUserRequest>>,
) -> AppResult<Json<UserView>> {
    let pending_id = payload.map(|ApiJson(req)| req.pending_user_id);
    approve_pending(&state, &ctx, pending_id).await
}

/// approve_pending_user
///
/// [Admin Route] Same operation as `/approve-user`, addressed by path.
#[utoipa::path(
    post,
    path = "/pendingUsers/{id}/approve",
    params(("id" = Uuid, Path, description = "Pending user id")),
    responses(
        (status = 200, description = "User approved", body = UserView),
        (status = 404, description = "Pending user not found", body = ErrorBody),
        (status = 409, description = "User already exists", body = ErrorBody)
    )
)]
pub async fn approve_pending_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
) -> AppResult<Json<UserView>> {
    approve_pending(&state, &ctx, id.map(|ApiPath(id)| id)).await
}

// --- Pending Deletions ---

/// request_deletion
///
/// [Authenticated Route] An editor or admin asks for a user to be removed.
#[utoipa::path(
    post,
    path = "/pendingDeletions",
    request_body = CreateDeletionRequest,
    responses(
        (status = 201, description = "Delete request submitted", body = PendingDeletion),
        (status = 404, description = "User not found", body = ErrorBody),
        (status = 409, description = "Request already pending", body = ErrorBody)
    )
)]
pub async fn request_deletion(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<CreateDeletionRequest>>,
) -> AppResult<(StatusCode, Json<PendingDeletion>)> {
    let requester = gate(&state, &ctx, Capability::RequestDeletion).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::USER_DELETE_REQUEST_FAILED).await?;

    let target = payload.user_id.to_string();
    let result = deletion::request(&state.repo, &requester, payload).await;
    let request = audit_failure(&state, &ctx, result, action::USER_DELETE_REQUEST_FAILED, &target).await?;

    state
        .audit
        .record(
            &ctx,
            action::USER_DELETE_REQUESTED,
            request.user_id.to_string(),
            json!({
                "reason": request.reason,
                "targetUsername": request.target_username,
                "targetEmail": request.target_email,
                "targetRole": request.target_role,
            }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/pendingDeletions",
    responses(
        (status = 200, description = "Pending deletion requests", body = [PendingDeletion]),
        (status = 403, description = "Forbidden", body = ErrorBody)
    )
)]
pub async fn list_deletions(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<PendingDeletion>>> {
    gate(&state, &ctx, Capability::ViewDeletions).await?;
    Ok(Json(deletion::list(&state.repo).await?))
}

/// approve_deletion
///
/// [Admin Route] Deletes the user and the request together.
#[utoipa::path(
    post,
    path = "/pendingDeletions/{id}/approve",
    params(("id" = Uuid, Path, description = "Deletion request id")),
    responses(
        (status = 200, description = "User deleted", body = UserView),
        (status = 404, description = "Request or user not found", body = ErrorBody)
    )
)]
pub async fn approve_deletion(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
) -> AppResult<Json<UserView>> {
    gate(&state, &ctx, Capability::ReviewDeletion).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::USER_DELETE_APPROVE_FAILED).await?;

    let result = deletion::approve(&state.repo, id).await;
    let (request, user) =
        audit_failure(&state, &ctx, result, action::USER_DELETE_APPROVE_FAILED, &id.to_string()).await?;

    state.sessions.revoke_user(user.id).await;
    state
        .audit
        .record(
            &ctx,
            action::USER_DELETE_APPROVED,
            user.username.as_str(),
            json!({ "requestedBy": request.requested_by, "deletedUserId": user.id }),
        )
        .await;
    Ok(Json(UserView::from(&user)))
}

#[utoipa::path(
    post,
    path = "/pendingDeletions/{id}/reject",
    params(("id" = Uuid, Path, description = "Deletion request id")),
    responses(
        (status = 200, description = "Deletion request rejected", body = MessageResponse),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
pub async fn reject_deletion(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
) -> AppResult<Json<MessageResponse>> {
    gate(&state, &ctx, Capability::ReviewDeletion).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::USER_DELETE_REJECT_FAILED).await?;

    let result = deletion::reject(&state.repo, id).await;
    let request = audit_failure(&state, &ctx, result, action::USER_DELETE_REJECT_FAILED, &id.to_string()).await?;

    state
        .audit
        .record(
            &ctx,
            action::USER_DELETE_REJECTED,
            request.user_id.to_string(),
            json!({ "requestedBy": request.requested_by }),
        )
        .await;
    Ok(Json(MessageResponse::new("Deletion request rejected")))
}

/// cancel_deletion
///
/// [Authenticated Route] Withdraws a request. Allowed for its requester and for admins.
#[utoipa::path(
    delete,
    path = "/pendingDeletions/{id}",
    params(("id" = Uuid, Path, description = "Deletion request id")),
    responses(
        (status = 200, description = "Request cancelled", body = MessageResponse),
        (status = 403, description = "Not the requester", body = ErrorBody),
        (status = 404, description = "Request not found", body = ErrorBody)
    )
)]
pub async fn cancel_deletion(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
) -> AppResult<Json<MessageResponse>> {
    let caller = gate(&state, &ctx, Capability::ViewDeletions).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::USER_DELETE_CANCEL_FAILED).await?;

    let result = deletion::cancel(&state.repo, id, &caller).await;
    let request = audit_failure(&state, &ctx, result, action::USER_DELETE_CANCEL_FAILED, &id.to_string()).await?;

    state
        .audit
        .record(
            &ctx,
            action::USER_DELETE_CANCELLED,
            request.target_username.as_str(),
            json!({ "userId": request.user_id, "requestedBy": request.requested_by }),
        )
        .await;
    Ok(Json(MessageResponse::new("Request cancelled")))
}
