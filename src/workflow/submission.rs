use chrono::Utc;
use uuid::Uuid;

use super::require;
use crate::{
    auth::{AuthUser, Capability},
    error::{AppError, AppResult},
    models::{CreateSubmissionRequest, Post, PostSubmission, Role, SubmissionStatus, UpdateSubmissionRequest},
    repository::Repository,
    storage::Collection,
};

/// SubmissionOutcome
///
/// What an update did to a submission.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// Still pending, fields changed.
    Updated(PostSubmission),
    /// Converted into a post and removed from the queue.
    Approved { submission: PostSubmission, post: Post },
    /// Marked rejected and kept for the author to read.
    Rejected(PostSubmission),
}

impl SubmissionOutcome {
    pub fn submission(&self) -> &PostSubmission {
        match self {
            SubmissionOutcome::Updated(s) | SubmissionOutcome::Rejected(s) => s,
            SubmissionOutcome::Approved { submission, .. } => submission,
        }
    }
}

fn is_reviewer(user: &AuthUser) -> bool {
    Capability::ReviewSubmission.permits(user.role)
}

fn visible_to(submission: &PostSubmission, viewer: &AuthUser) -> bool {
    viewer.role != Role::Author || submission.submitted_by == viewer.username
}

pub async fn submit(repo: &Repository, author: &AuthUser, req: CreateSubmissionRequest) -> AppResult<PostSubmission> {
    require("slug", &req.slug)?;
    require("title", &req.title)?;
    require("content", &req.content)?;

    let submission = PostSubmission {
        id: Uuid::new_v4(),
        slug: req.slug.trim().to_string(),
        title: req.title.trim().to_string(),
        content: req.content,
        category: req.category,
        thumbnail: req.thumbnail,
        schedule: req.schedule,
        status: SubmissionStatus::Pending,
        submitted_by: author.username.clone(),
        editor_comments: String::new(),
        created_at: Utc::now(),
        reviewed_by: None,
        reviewed_at: None,
    };

    repo.transaction(&[Collection::PostSubmissions], |tx| tx.insert(&submission))
        .await?;
    Ok(submission)
}

/// Authors see their own submissions; editors and admins see the whole queue.
pub async fn list(repo: &Repository, viewer: &AuthUser) -> AppResult<Vec<PostSubmission>> {
    Ok(repo
        .all::<PostSubmission>()
        .await?
        .into_iter()
        .filter(|submission| visible_to(submission, viewer))
        .collect())
}

pub async fn get(repo: &Repository, id: Uuid, viewer: &AuthUser) -> AppResult<PostSubmission> {
    repo.find::<PostSubmission>(&id.to_string())
        .await?
        .filter(|submission| visible_to(submission, viewer))
        .ok_or_else(|| AppError::not_found("Submission"))
}

/// update
///
/// Edits a submission and, when a reviewer sets `status`, moves it through the
/// review states. Rejected is terminal: further updates fail with `Conflict`.
/// Approval publishes the post and removes the submission in one commit; the post's
/// slug must not already be taken.
pub async fn update(
    repo: &Repository,
    id: Uuid,
    caller: &AuthUser,
    req: UpdateSubmissionRequest,
) -> AppResult<SubmissionOutcome> {
    let key = id.to_string();
    repo.transaction(&[Collection::Posts, Collection::PostSubmissions], |tx| {
        let mut submission = tx
            .get::<PostSubmission>(&key)?
            .filter(|submission| visible_to(submission, caller))
            .ok_or_else(|| AppError::not_found("Submission"))?;

        if submission.status == SubmissionStatus::Rejected {
            return Err(AppError::Conflict("Submission has already been rejected".to_string()));
        }

        let reviewer = is_reviewer(caller);
        if !reviewer && (req.status.is_some() || req.editor_comments.is_some()) {
            return Err(AppError::Forbidden(
                "Only editors and admins may review submissions".to_string(),
            ));
        }

        if let Some(slug) = req.slug {
            require("slug", &slug)?;
            submission.slug = slug.trim().to_string();
        }
        if let Some(title) = req.title {
            require("title", &title)?;
            submission.title = title.trim().to_string();
        }
        if let Some(content) = req.content {
            submission.content = content;
        }
        if let Some(category) = req.category {
            submission.category = category;
        }
        if req.thumbnail.is_some() {
            submission.thumbnail = req.thumbnail;
        }
        if req.schedule.is_some() {
            submission.schedule = req.schedule;
        }
        if let Some(comments) = req.editor_comments {
            submission.editor_comments = comments;
        }

        let now = Utc::now();
        match req.status {
            Some(SubmissionStatus::Approved) => {
                if tx.contains::<Post>(&submission.slug)? {
                    return Err(AppError::Conflict(format!(
                        "A post with slug '{}' already exists",
                        submission.slug
                    )));
                }
                submission.status = SubmissionStatus::Approved;
                submission.reviewed_by = Some(caller.username.clone());
                submission.reviewed_at = Some(now);

                let post = submission.to_post(now);
                tx.insert(&post)?;
                tx.remove::<PostSubmission>(&key)?;
                Ok(SubmissionOutcome::Approved { submission, post })
            }
            Some(SubmissionStatus::Rejected) => {
                submission.status = SubmissionStatus::Rejected;
                submission.reviewed_by = Some(caller.username.clone());
                submission.reviewed_at = Some(now);
                tx.replace(&key, &submission)?;
                Ok(SubmissionOutcome::Rejected(submission))
            }
            Some(SubmissionStatus::Pending) | None => {
                tx.replace(&key, &submission)?;
                Ok(SubmissionOutcome::Updated(submission))
            }
        }
    })
    .await
}

/// delete
///
/// Reviewers may withdraw any submission; authors only their own, and only while
/// it is still pending.
pub async fn delete(repo: &Repository, id: Uuid, caller: &AuthUser) -> AppResult<PostSubmission> {
    let key = id.to_string();
    repo.transaction(&[Collection::PostSubmissions], |tx| {
        let submission = tx
            .get::<PostSubmission>(&key)?
            .filter(|submission| visible_to(submission, caller))
            .ok_or_else(|| AppError::not_found("Submission"))?;

        if !is_reviewer(caller) && submission.status != SubmissionStatus::Pending {
            return Err(AppError::Forbidden(
                "Reviewed submissions can no longer be withdrawn".to_string(),
            ));
        }

        tx.remove::<PostSubmission>(&key)?;
        Ok(submission)
    })
    .await
}
