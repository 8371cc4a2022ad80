use axum::{Json, extract::State};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use super::{ApiJson, ApiQuery, accept, gate};
use crate::{
    AppState,
    audit::action,
    auth::{Capability, RequestContext},
    error::{AppResult, ErrorBody},
    models::{AvailabilityResponse, Headline, MessageResponse},
    workflow::registration,
};

/// get_headline
///
/// [Public Route] The current site headline.
#[utoipa::path(
    get,
    path = "/headline",
    responses((status = 200, description = "Current headline", body = Headline))
)]
pub async fn get_headline(State(state): State<AppState>) -> Json<Headline> {
    Json(Headline {
        text: state.headline.get(),
    })
}

/// update_headline
///
/// [Authenticated Route] Replaces the headline (admins and editors).
#[utoipa::path(
    put,
    path = "/headline",
    request_body = Headline,
    responses(
        (status = 200, description = "Headline updated", body = Headline),
        (status = 400, description = "Blank headline", body = ErrorBody),
        (status = 403, description = "Forbidden", body = ErrorBody)
    )
)]
pub async fn update_headline(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<Headline>>,
) -> AppResult<Json<Headline>> {
    gate(&state, &ctx, Capability::EditHeadline).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::HEADLINE_UPDATE_FAILED).await?;

    match state.headline.set(&payload.text) {
        Ok(text) => {
            state
                .audit
                .record(&ctx, action::HEADLINE_UPDATED, text.as_str(), json!({}))
                .await;
            Ok(Json(Headline { text }))
        }
        Err(err) => {
            state
                .audit
                .record(&ctx, action::HEADLINE_UPDATE_FAILED, "invalid input", json!({}))
                .await;
            Err(err)
        }
    }
}

/// ping
///
/// [Public Route] Liveness check. Each call is recorded in the audit log.
#[utoipa::path(
    get,
    path = "/ping",
    responses((status = 200, description = "Server is up", body = MessageResponse))
)]
pub async fn ping(State(state): State<AppState>, ctx: RequestContext) -> Json<MessageResponse> {
    state.audit.record(&ctx, action::PING, "server", json!({})).await;
    Json(MessageResponse::new("pong"))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct UsernameQuery {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmailQuery {
    #[serde(default)]
    pub email: String,
}

/// check_username
///
/// [Public Route] Whether a username is free among users and pending registrations.
#[utoipa::path(
    get,
    path = "/check-username",
    params(UsernameQuery),
    responses((status = 200, description = "Availability", body = AvailabilityResponse))
)]
pub async fn check_username(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UsernameQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    crate::workflow::require("username", &query.username)?;
    let available = registration::username_available(&state.repo, &query.username).await?;
    Ok(Json(AvailabilityResponse { available }))
}

/// check_email
///
/// [Public Route] Whether an email is free (case-insensitive) among users and
/// pending registrations.
#[utoipa::path(
    get,
    path = "/check-email",
    params(EmailQuery),
    responses((status = 200, description = "Availability", body = AvailabilityResponse))
)]
pub async fn check_email(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<EmailQuery>,
) -> AppResult<Json<AvailabilityResponse>> {
    crate::workflow::require("email", &query.email)?;
    let available = registration::email_available(&state.repo, &query.email).await?;
    Ok(Json(AvailabilityResponse { available }))
}
