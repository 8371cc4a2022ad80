use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::json;
use utoipa::IntoParams;

use super::{ApiJson, ApiQuery, accept, audit_failure};
use crate::{
    AppState,
    audit::action,
    auth::RequestContext,
    comments,
    error::{AppError, AppResult, ErrorBody},
    models::{CommentEntry, CreateCommentRequest},
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct CommentQuery {
    /// Slug of the post whose thread to return.
    pub slug: Option<String>,
}

/// list_comments
///
/// [Public Route] The comment thread of one post.
#[utoipa::path(
    get,
    path = "/comments",
    params(CommentQuery),
    responses(
        (status = 200, description = "Comments, oldest first", body = [CommentEntry]),
        (status = 400, description = "Missing slug", body = ErrorBody)
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CommentQuery>,
) -> AppResult<Json<Vec<CommentEntry>>> {
    let slug = query
        .slug
        .filter(|slug| !slug.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Missing slug".to_string()))?;
    Ok(Json(comments::list(&state.repo, slug.trim()).await?))
}

/// add_comment
///
/// [Public Route] Appends a comment to a post's thread.
#[utoipa::path(
    post,
    path = "/comments",
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment saved", body = CommentEntry),
        (status = 400, description = "Missing fields", body = ErrorBody)
    )
)]
pub async fn add_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<CreateCommentRequest>>,
) -> AppResult<(StatusCode, Json<CommentEntry>)> {
    let ApiJson(payload) = accept(&state, &ctx, payload, action::COMMENT_CREATE_FAILED).await?;
    let slug = payload.slug.trim().to_string();
    let result = comments::add(&state.repo, payload).await;
    let entry = audit_failure(&state, &ctx, result, action::COMMENT_CREATE_FAILED, &slug).await?;

    state
        .audit
        .record(
            &ctx,
            action::COMMENT_CREATED,
            slug,
            json!({ "username": entry.username, "commentLength": entry.comment.chars().count() }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(entry)))
}
