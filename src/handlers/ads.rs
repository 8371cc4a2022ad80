use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;
use uuid::Uuid;

use super::{ApiJson, ApiPath, accept, audit_failure, changed_fields, gate};
use crate::{
    AppState, ads,
    audit::action,
    auth::{Capability, RequestContext},
    error::{AppResult, ErrorBody},
    models::{Ad, CreateAdRequest, UpdateAdRequest},
};

/// list_ads
///
/// [Public Route] All ads. Ads past their `endDate` come back (and are stored) with
/// `active=false`.
#[utoipa::path(
    get,
    path = "/ads",
    responses((status = 200, description = "Ads", body = [Ad]))
)]
pub async fn list_ads(State(state): State<AppState>) -> AppResult<Json<Vec<Ad>>> {
    Ok(Json(ads::list_ads(&state.repo).await?))
}

#[utoipa::path(
    get,
    path = "/ads/{id}",
    params(("id" = Uuid, Path, description = "Ad id")),
    responses(
        (status = 200, description = "Ad", body = Ad),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_ad(State(state): State<AppState>, ApiPath(id): ApiPath<Uuid>) -> AppResult<Json<Ad>> {
    Ok(Json(ads::get_ad(&state.repo, id).await?))
}

/// create_ad
///
/// [Admin Route] Creates an ad. `startDate` must not be after `endDate`.
#[utoipa::path(
    post,
    path = "/ads",
    request_body = CreateAdRequest,
    responses(
        (status = 201, description = "Ad created", body = Ad),
        (status = 400, description = "Invalid window", body = ErrorBody)
    )
)]
pub async fn create_ad(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<CreateAdRequest>>,
) -> AppResult<(StatusCode, Json<Ad>)> {
    gate(&state, &ctx, Capability::ManageAds).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::AD_CREATE_FAILED).await?;

    let result = ads::create_ad(&state.repo, payload).await;
    let ad = audit_failure(&state, &ctx, result, action::AD_CREATE_FAILED, "ads").await?;

    state
        .audit
        .record(
            &ctx,
            action::AD_CREATED,
            ad.id.to_string(),
            json!({ "type": ad.kind, "company": ad.company }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(ad)))
}

#[utoipa::path(
    put,
    path = "/ads/{id}",
    params(("id" = Uuid, Path, description = "Ad id")),
    request_body = UpdateAdRequest,
    responses(
        (status = 200, description = "Ad updated", body = Ad),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_ad(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
    payload: AppResult<ApiJson<UpdateAdRequest>>,
) -> AppResult<Json<Ad>> {
    gate(&state, &ctx, Capability::ManageAds).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::AD_UPDATE_FAILED).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::AD_UPDATE_FAILED).await?;

    let fields = changed_fields(&payload);
    let result = ads::update_ad(&state.repo, id, payload).await;
    let ad = audit_failure(&state, &ctx, result, action::AD_UPDATE_FAILED, &id.to_string()).await?;

    state
        .audit
        .record(&ctx, action::AD_UPDATED, ad.id.to_string(), json!({ "changes": fields }))
        .await;
    Ok(Json(ad))
}

#[utoipa::path(
    delete,
    path = "/ads/{id}",
    params(("id" = Uuid, Path, description = "Ad id")),
    responses(
        (status = 200, description = "Deleted", body = Ad),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_ad(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
) -> AppResult<Json<Ad>> {
    gate(&state, &ctx, Capability::ManageAds).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::AD_DELETE_FAILED).await?;

    let result = ads::delete_ad(&state.repo, id).await;
    let ad = audit_failure(&state, &ctx, result, action::AD_DELETE_FAILED, &id.to_string()).await?;

    state
        .audit
        .record(
            &ctx,
            action::AD_DELETED,
            ad.id.to_string(),
            json!({ "type": ad.kind, "company": ad.company }),
        )
        .await;
    Ok(Json(ad))
}
