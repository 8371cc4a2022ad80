use axum::{Json, extract::State};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde_json::json;

use super::{ApiJson, accept};
use crate::{
    AppState,
    audit::action,
    auth::{AuthUser, RequestContext, SESSION_COOKIE},
    error::{AppError, AppResult, ErrorBody},
    models::{LoginRequest, MessageResponse},
    workflow::accounts::{self, LoginOutcome},
};

/// login
///
/// [Public Route] Verifies credentials and opens a server-side session, returned as
/// the http-only `wrytix_sid` cookie. Only `active` accounts may log in.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthUser),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
    payload: AppResult<ApiJson<LoginRequest>>,
) -> AppResult<(CookieJar, Json<AuthUser>)> {
    let ApiJson(payload) = accept(&state, &ctx, payload, action::LOGIN_FAILED).await?;
    let outcome = accounts::authenticate(&state.repo, payload.username.trim(), &payload.password).await?;

    let user = match outcome {
        LoginOutcome::Success(user) => user,
        failed => {
            state
                .audit
                .record(
                    &ctx,
                    action::LOGIN_FAILED,
                    payload.username.trim(),
                    json!({ "reason": failed.failure_reason() }),
                )
                .await;
            return Err(AppError::Unauthorized("Invalid username or password".to_string()));
        }
    };

    let identity = AuthUser {
        id: user.id,
        username: user.username,
        role: user.role,
    };
    let token = state.sessions.create(identity.clone()).await;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.session_cookie_secure);

    let ctx = RequestContext {
        user: Some(identity.clone()),
        ..ctx
    };
    state
        .audit
        .record(&ctx, action::LOGIN_SUCCESS, identity.username.as_str(), json!({ "role": identity.role }))
        .await;
    tracing::info!(user = %identity.username, "login succeeded");

    Ok((jar.add(cookie), Json(identity)))
}

/// logout
///
/// [Public Route] Ends the caller's session, if any, and clears the cookie.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 200, description = "Logged out", body = MessageResponse))
)]
pub async fn logout(
    State(state): State<AppState>,
    ctx: RequestContext,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(cookie.value()).await;
    }
    if let Some(user) = &ctx.user {
        state
            .audit
            .record(&ctx, action::LOGOUT, user.username.as_str(), json!({}))
            .await;
    }

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, Json(MessageResponse::new("Logged out")))
}

/// verify_session
///
/// [Public Route] Returns the identity bound to the session cookie.
#[utoipa::path(
    get,
    path = "/verify-session",
    responses(
        (status = 200, description = "Session is valid", body = AuthUser),
        (status = 401, description = "No valid session", body = ErrorBody)
    )
)]
pub async fn verify_session(ctx: RequestContext) -> AppResult<Json<AuthUser>> {
    ctx.user
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("Not logged in".to_string()))
}
