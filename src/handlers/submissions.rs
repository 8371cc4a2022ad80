use axum::{Json, extract::State, http::StatusCode};
use serde_json::json;
use uuid::Uuid;

use super::{ApiJson, ApiPath, accept, audit_failure, changed_fields, gate};
use crate::{
    AppState,
    audit::action,
    auth::{Capability, RequestContext},
    error::{AppResult, ErrorBody},
    models::{
        CreateSubmissionRequest, MessageResponse, PostSubmission, SubmissionUpdateResponse,
        UpdateSubmissionRequest,
    },
    workflow::submission::{self, SubmissionOutcome},
};

/// create_submission
///
/// [Authenticated Route] An author files a post for editorial review.
#[utoipa::path(
    post,
    path = "/postSubmissions",
    request_body = CreateSubmissionRequest,
    responses(
        (status = 201, description = "Submitted for approval", body = PostSubmission),
        (status = 403, description = "Authors only", body = ErrorBody)
    )
)]
pub async fn create_submission(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: AppResult<ApiJson<CreateSubmissionRequest>>,
) -> AppResult<(StatusCode, Json<PostSubmission>)> {
    let author = gate(&state, &ctx, Capability::SubmitPost).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::POST_SUBMIT_FAILED).await?;

    let target = payload.title.clone();
    let result = submission::submit(&state.repo, &author, payload).await;
    let created = audit_failure(&state, &ctx, result, action::POST_SUBMIT_FAILED, &target).await?;

    state
        .audit
        .record(
            &ctx,
            action::POST_SUBMITTED,
            created.title.as_str(),
            json!({ "id": created.id, "slug": created.slug }),
        )
        .await;
    Ok((StatusCode::CREATED, Json(created)))
}

/// list_submissions
///
/// [Authenticated Route] The review queue. Authors only see their own entries.
#[utoipa::path(
    get,
    path = "/postSubmissions",
    responses((status = 200, description = "Submissions", body = [PostSubmission]))
)]
pub async fn list_submissions(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> AppResult<Json<Vec<PostSubmission>>> {
    let viewer = gate(&state, &ctx, Capability::ViewSubmissions).await?;
    Ok(Json(submission::list(&state.repo, &viewer).await?))
}

#[utoipa::path(
    get,
    path = "/postSubmissions/{id}",
    params(("id" = Uuid, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Submission", body = PostSubmission),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_submission(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Json<PostSubmission>> {
    let viewer = gate(&state, &ctx, Capability::ViewSubmissions).await?;
    Ok(Json(submission::get(&state.repo, id, &viewer).await?))
}

/// update_submission
///
/// [Authenticated Route] Edits a submission or records an editorial decision.
/// Setting `status` to `approved` publishes the post and removes the submission;
/// `rejected` keeps it with the reviewer's comments.
#[utoipa::path(
    put,
    path = "/postSubmissions/{id}",
    params(("id" = Uuid, Path, description = "Submission id")),
    request_body = UpdateSubmissionRequest,
    responses(
        (status = 200, description = "Submission updated", body = SubmissionUpdateResponse),
        (status = 403, description = "Not allowed to review", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody),
        (status = 409, description = "Already rejected, or slug taken", body = ErrorBody)
    )
)]
pub async fn update_submission(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
    payload: AppResult<ApiJson<UpdateSubmissionRequest>>,
) -> AppResult<Json<SubmissionUpdateResponse>> {
    let caller = gate(&state, &ctx, Capability::EditSubmission).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::SUBMISSION_UPDATE_FAILED).await?;
    let ApiJson(payload) = accept(&state, &ctx, payload, action::SUBMISSION_UPDATE_FAILED).await?;

    let fields = changed_fields(&payload);
    let result = submission::update(&state.repo, id, &caller, payload).await;
    let outcome = audit_failure(
        &state,
        &ctx,
        result,
        action::SUBMISSION_UPDATE_FAILED,
        &id.to_string(),
    )
    .await?;

    let logged = match &outcome {
        SubmissionOutcome::Approved { .. } => action::POST_APPROVED,
        SubmissionOutcome::Rejected(_) => action::POST_REJECTED,
        SubmissionOutcome::Updated(_) => action::SUBMISSION_UPDATED,
    };
    let title = outcome.submission().title.clone();
    state
        .audit
        .record(&ctx, logged, title, json!({ "id": id, "changes": fields }))
        .await;

    let response = match outcome {
        SubmissionOutcome::Approved { post, .. } => SubmissionUpdateResponse {
            message: "Submission approved and published".to_string(),
            submission: None,
            post: Some(post),
        },
        SubmissionOutcome::Rejected(submission) => SubmissionUpdateResponse {
            message: "Submission rejected".to_string(),
            submission: Some(submission),
            post: None,
        },
        SubmissionOutcome::Updated(submission) => SubmissionUpdateResponse {
            message: "Submission updated".to_string(),
            submission: Some(submission),
            post: None,
        },
    };
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/postSubmissions/{id}",
    params(("id" = Uuid, Path, description = "Submission id")),
    responses(
        (status = 200, description = "Submission deleted", body = MessageResponse),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_submission(
    State(state): State<AppState>,
    ctx: RequestContext,
    id: AppResult<ApiPath<Uuid>>,
) -> AppResult<Json<MessageResponse>> {
    let caller = gate(&state, &ctx, Capability::DeleteSubmission).await?;
    let ApiPath(id) = accept(&state, &ctx, id, action::SUBMISSION_DELETE_FAILED).await?;

    let result = submission::delete(&state.repo, id, &caller).await;
    let removed = audit_failure(
        &state,
        &ctx,
        result,
        action::SUBMISSION_DELETE_FAILED,
        &id.to_string(),
    )
    .await?;

    state
        .audit
        .record(&ctx, action::SUBMISSION_DELETED, removed.title.as_str(), json!({ "id": id }))
        .await;
    Ok(Json(MessageResponse::new("Submission deleted")))
}
