use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;

use super::{ApiJson, ApiPath, accept, audit_failure, changed_fields, gate};
use crate::{
    AppState,
    audit::action,
    auth::{Capability, RequestContext},
    error::{AppResult, ErrorBody},
    models::{CreatePostRequest, Post, UpdatePostRequest},
    posts,
};

/// list_posts
///
/// [Public Route] Published posts, newest first. Scheduled posts stay hidden until
/// their time comes.
#[utoipa::path(
    get,
    path = "/posts",
    responses((status = 200, description = "Published posts", body = [Post]))
)]
pub async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(posts::list_published(&state.repo).await?))
}

/// list_all_posts
///
/// [Authenticated Route] Every post including scheduled ones (editors and admins).
#[utoipa::path(
    get,
    path = "/posts/all",
    responses(
        (status = 200, description = "All posts", body = [Post]),
        (status = 403, description = "Forbidden", body = ErrorBody)
    )
)]
pub async fn list_all_posts(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<Vec<Post>>> {
    gate(&state, &ctx, Capability::ManagePosts).await?;
    Ok(Json(posts::list_all(&state.repo).await?))
}

/// get_post
///
/// [Public Route] A single post by slug, with `isPublished` recomputed.
#[utoipa::path(
    get,
    path = "/posts/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Post", body = Post),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_post(State(state): State<AppState>, ApiPath(slug): ApiPath<String>) -> AppResult<Json<Post>> {
    Ok(Json(posts::get_post(&state.repo, &slug).await?))
}

/// view_post
///
/// [Public Route] Counts a page view.
#[utoipa::path(
    post,
    path = "/posts/{slug}/view",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "View recorded", body = Post),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn view_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    slug: AppResult<ApiPath<String>>,
) -> AppResult<Json<Post>> {
    let ApiPath(slug) = accept(&state, &ctx, slug, action::POST_VIEW_FAILED).await?;
    let result = posts::record_view(&state.repo, &slug).await;
    let post = audit_failure(&state, &ctx, result, action::POST_VIEW_FAILED, &slug).await?;

    state
        .audit
        .record(&ctx, action::POST_VIEWED, post.slug.as_str(), json!({ "views": post.views }))
        .await;
    Ok(Json(post))
}

/// create_post
///
/// [Authenticated Route] Publishes (or schedules) a post directly.
#[utoipa::path(
    post,
    path = "/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = Post),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 409, description = "Slug already exists", body = ErrorBody)
    )
)]
pub async fn create_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<CreatePostRequest>>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let user = gate(&state, &ctx, Capability::ManagePosts).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::POST_CREATE_FAILED).await?;

    let target = payload.slug.clone();
    let result = posts::create_post(&state.repo, &user, payload).await;
    let post = audit_failure(&state, &ctx, result, action::POST_CREATE_FAILED, &target).await?;

    state
        .audit
        .record(
            &ctx,
            action::POST_CREATED,
            post.slug.as_str(),
            json!({ "title": post.title, "scheduled": post.schedule }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(post)))
}

/// update_post
///
/// [Authenticated Route] Partial update; the slug itself may be renamed.
#[utoipa::path(
    put,
    path = "/posts/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    request_body = UpdatePostRequest,
    responses(
        (status = 200, description = "Post updated", body = Post),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Slug already exists", body = ErrorBody)
    )
)]
pub async fn update_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    slug: AppResult<ApiPath<String>>,
    payload: AppResult<ApiJson<UpdatePostRequest>>,
) -> AppResult<Json<Post>> {
    gate(&state, &ctx, Capability::ManagePosts).await?;
    let ApiPath(slug) = accept(&state, &ctx, slug, action::POST_UPDATE_FAILED).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::POST_UPDATE_FAILED).await?;

    let fields = changed_fields(&payload);
    let result = posts::update_post(&state.repo, &slug, payload).await;
    let post = audit_failure(&state, &ctx, result, action::POST_UPDATE_FAILED, &slug).await?;

    state
        .audit
        .record(&ctx, action::POST_UPDATED, post.slug.as_str(), json!({ "changes": fields }))
        .await;
    Ok(Json(post))
}

/// delete_post
///
/// [Authenticated Route] Removes a post. Returns the deleted record.
#[utoipa::path(
    delete,
    path = "/posts/{slug}",
    params(("slug" = String, Path, description = "Post slug")),
    responses(
        (status = 200, description = "Deleted", body = Post),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_post(
    State(state): State<AppState>,
    ctx: RequestContext,
    slug: AppResult<ApiPath<String>>,
) -> AppResult<Json<Post>> {
    gate(&state, &ctx, Capability::ManagePosts).await?;
    let ApiPath(slug) = accept(&state, &ctx, slug, action::POST_DELETE_FAILED).await?;

    let result = posts::delete_post(&state.repo, &slug).await;
    let post = audit_failure(&state, &ctx, result, action::POST_DELETE_FAILED, &slug).await?;

    state
        .audit
        .record(&ctx, action::POST_DELETED, post.slug.as_str(), json!({ "title": post.title }))
        .await;
    Ok(Json(post))
}
