use chrono::Utc;

use crate::{
    error::AppResult,
    models::{CommentEntry, CommentThread, CreateCommentRequest},
    repository::Repository,
    storage::Collection,
    workflow::require,
};

/// The comments of one post, oldest first. Unknown slugs have no comments.
pub async fn list(repo: &Repository, slug: &str) -> AppResult<Vec<CommentEntry>> {
    Ok(repo
        .find::<CommentThread>(slug)
        .await?
        .map(|thread| thread.comments)
        .unwrap_or_default())
}

/// Appends a comment to its post's thread, opening the thread on first use.
pub async fn add(repo: &Repository, req: CreateCommentRequest) -> AppResult<CommentEntry> {
    require("slug", &req.slug)?;
    require("username", &req.username)?;
    require("comment", &req.comment)?;

    let slug = req.slug.trim().to_string();
    let entry = CommentEntry {
        username: req.username.trim().to_string(),
        comment: req.comment,
        timestamp: req.timestamp.unwrap_or_else(Utc::now),
    };

    repo.transaction(&[Collection::Comments], |tx| match tx.get::<CommentThread>(&slug)? {
        Some(mut thread) => {
            thread.comments.push(entry.clone());
            tx.replace(&slug, &thread).map(|_| ())
        }
        None => tx.insert(&CommentThread {
            slug: slug.clone(),
            comments: vec![entry.clone()],
        }),
    })
    .await?;

    Ok(entry)
}
