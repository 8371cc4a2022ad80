use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;
use uuid::Uuid;

use super::{ApiJson, ApiPath, accept, audit_failure, changed_fields, gate};
use crate::{
    AppState,
    audit::action,
    auth::{Capability, RequestContext},
    error::{AppResult, ErrorBody},
    models::{CreateUserRequest, UpdateUserRequest, UserView},
    workflow::accounts,
};

/// list_users
///
/// [Authenticated Route] All accounts, without credential hashes (admins and editors).
#[utoipa::path(
    get,
    path = "/users",
    responses(
        (status = 200, description = "Users", body = [UserView]),
        (status = 403, description = "Forbidden", body = ErrorBody)
    )
)]
pub async fn list_users(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<UserView>>> {
    gate(&state, &ctx, Capability::ViewUsers).await?;
    let users = accounts::list_users(&state.repo).await?;
    Ok(Json(users.iter().map(UserView::from).collect()))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserView),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<UserView>> {
    gate(&state, &ctx, Capability::ViewUsers).await?;
    let user = accounts::get_user(&state.repo, id).await?;
    Ok(Json(UserView::from(&user)))
}

/// create_user
///
/// [Admin Route] Creates an account directly, skipping the registration queue.
#[utoipa::path(
    post,
    path = "/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserView),
        (status = 409, description = "Username or email taken", body = ErrorBody)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<CreateUserRequest>>,
) -> AppResult<(StatusCode, Json<UserView>)> {
    gate(&state, &ctx, Capability::ManageUsers).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::USER_CREATE_FAILED).await?;

    let target = payload.username.clone();
    let result = accounts::create_user(&state.repo, payload, state.config.bcrypt_cost).await;
    let user = audit_failure(&state, &ctx, result, action::USER_CREATE_FAILED, &target).await?;

    state
        .audit
        .record(&ctx, action::USER_CREATED, user.username.as_str(), json!({ "role": user.role }))
        .await;
    Ok((StatusCode::CREATED, Json(UserView::from(&user))))
}

/// update_user
///
/// [Admin Route] Partial update. Changing role or status ends the user's open
/// sessions so the new privileges apply from their next login.
#[utoipa::path(
    put,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserView),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Username or email taken", body = ErrorBody)
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
    payload: AppResult<ApiJson<UpdateUserRequest>>,
) -> AppResult<Json<UserView>> {
    gate(&state, &ctx, Capability::ManageUsers).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::USER_UPDATE_FAILED).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::USER_UPDATE_FAILED).await?;

    let fields = changed_fields(&payload);
    let privileges_changed = payload.role.is_some() || payload.status.is_some();
    let result = accounts::update_user(&state.repo, id, payload, state.config.bcrypt_cost).await;
    let user = audit_failure(&state, &ctx, result, action::USER_UPDATE_FAILED, &id.to_string()).await?;

    if privileges_changed {
        state.sessions.revoke_user(user.id).await;
    }
    state
        .audit
        .record(&ctx, action::USER_UPDATED, user.username.as_str(), json!({ "changes": fields }))
        .await;
    Ok(Json(UserView::from(&user)))
}

#[utoipa::path(
    delete,
    path = "/users/{id}",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User deleted", body = UserView),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
) -> AppResult<Json<UserView>> {
    gate(&state, &ctx, Capability::ManageUsers).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::USER_DELETE_FAILED).await?;

    let result = accounts::delete_user(&state.repo, id).await;
    let user = audit_failure(&state, &ctx, result, action::USER_DELETE_FAILED, &id.to_string()).await?;

    state.sessions.revoke_user(user.id).await;
    state
        .audit
        .record(&ctx, action::USER_DELETED, user.username.as_str(), json!({ "role": user.role }))
        .await;
    Ok(Json(UserView::from(&user)))
}
