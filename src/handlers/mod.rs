//! HTTP handlers, grouped by resource. Each handler resolves the caller through
//! `RequestContext`, passes the authorization gate for its capability, delegates to
//! the domain module and records the outcome in the audit log.

pub mod ads;
pub mod auth;
pub mod comments;
pub mod logs;
pub mod moderation;
pub mod posts;
pub mod site;
pub mod submissions;
pub mod users;

use axum::{
    extract::{FromRequest, FromRequestParts},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::{
    AppState,
    audit::action,
    auth::{AuthUser, Capability, RequestContext},
    error::{AppError, AppResult},
    models::Role,
};

/// ApiJson
///
/// `axum::Json` whose rejection is an `AppError`, so malformed bodies answer with
/// the usual `{"error": ...}` shape and a 400.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// ApiPath
///
/// `axum::extract::Path` with an `AppError` rejection (malformed ids become 400s).
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// gate
///
/// Runs the authorization gate for `capability` and audit-logs a refusal as
/// `login-required` (no session) or `access-denied` (wrong role).
pub(crate) async fn gate(state: &AppState, ctx: &RequestContext, capability: Capability) -> AppResult<AuthUser> {
    match ctx.authorize(capability) {
        Ok(user) => Ok(user.clone()),
        Err(err) => {
            let denied = match err {
                AppError::Unauthorized(_) => action::LOGIN_REQUIRED,
                _ => action::ACCESS_DENIED,
            };
            let allowed: Vec<&str> = capability.allowed_roles().iter().map(Role::as_str).collect();
            state
                .audit
                .record(ctx, denied, capability.name(), json!({ "allowedRoles": allowed }))
                .await;
            Err(err)
        }
    }
}

/// Records `failure` with the error message when `result` is an error, then hands
/// the result back unchanged.
pub(crate) async fn audit_failure<T>(
    state: &AppState,
    ctx: &RequestContext,
    result: AppResult<T>,
    failure: &str,
    target: &str,
) -> AppResult<T> {
    if let Err(err) = &result {
        state
            .audit
            .record(ctx, failure, target, json!({ "reason": err.to_string() }))
            .await;
    }
    result
}

/// accept
///
/// Unwraps a path or body extractor. A rejected input is audited as `failure`
/// against the request path before the 400 goes out.
pub(crate) async fn accept<T>(
    state: &AppState,
    ctx: &RequestContext,
    extracted: AppResult<T>,
    failure: &str,
) -> AppResult<T> {
    audit_failure(state, ctx, extracted, failure, &ctx.path).await
}

/// Names of the fields present in a partial-update payload, for audit details.
pub(crate) fn changed_fields<T: Serialize>(payload: &T) -> Vec<String> {
    match serde_json::to_value(payload) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}
