use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    models::{CreatePostRequest, Post, UpdatePostRequest},
    repository::Repository,
    storage::Collection,
    workflow::require,
};

fn refreshed(mut posts: Vec<Post>, now: DateTime<Utc>) -> Vec<Post> {
    for post in &mut posts {
        post.refresh_publication(now);
    }
    posts
}

fn slug_taken(slug: &str) -> AppError {
    AppError::Conflict(format!("A post with slug '{slug}' already exists"))
}

/// Published posts only, newest schedule first.
pub async fn list_published(repo: &Repository) -> AppResult<Vec<Post>> {
    let mut posts: Vec<Post> = refreshed(repo.all::<Post>().await?, Utc::now())
        .into_iter()
        .filter(|post| post.is_published)
        .collect();
    posts.sort_by(|a, b| b.schedule.cmp(&a.schedule));
    Ok(posts)
}

/// Every post, scheduled ones included, in stored order.
pub async fn list_all(repo: &Repository) -> AppResult<Vec<Post>> {
    Ok(refreshed(repo.all::<Post>().await?, Utc::now()))
}

pub async fn get_post(repo: &Repository, slug: &str) -> AppResult<Post> {
    let mut post = repo
        .find::<Post>(slug)
        .await?
        .ok_or_else(|| AppError::not_found("Post"))?;
    post.refresh_publication(Utc::now());
    Ok(post)
}

pub async fn record_view(repo: &Repository, slug: &str) -> AppResult<Post> {
    repo.transaction(&[Collection::Posts], |tx| {
        let mut post = tx.get::<Post>(slug)?.ok_or_else(|| AppError::not_found("Post"))?;
        let now = Utc::now();
        post.views += 1;
        post.last_viewed = Some(now);
        post.refresh_publication(now);
        tx.replace(slug, &post)?;
        Ok(post)
    })
    .await
}

/// create_post
///
/// Direct publication. `author` defaults to the caller and `schedule` to now.
pub async fn create_post(repo: &Repository, caller: &AuthUser, req: CreatePostRequest) -> AppResult<Post> {
    require("slug", &req.slug)?;
    require("title", &req.title)?;

    let now = Utc::now();
    let schedule = req.schedule.unwrap_or(now);
    let post = Post {
        id: Uuid::new_v4(),
        slug: req.slug.trim().to_string(),
        title: req.title.trim().to_string(),
        author: req
            .author
            .filter(|author| !author.trim().is_empty())
            .unwrap_or_else(|| caller.username.clone()),
        category: req.category,
        content: req.content,
        thumbnail: req.thumbnail,
        source: req.source,
        featured: req.featured,
        schedule,
        created_at: now,
        updated_at: None,
        is_published: schedule <= now,
        views: 0,
        last_viewed: None,
    };

    repo.transaction(&[Collection::Posts], |tx| {
        if tx.contains::<Post>(&post.slug)? {
            return Err(slug_taken(&post.slug));
        }
        tx.insert(&post)
    })
    .await?;

    Ok(post)
}

/// update_post
///
/// Applies the present fields. Renaming the slug requires the new one to be free.
pub async fn update_post(repo: &Repository, slug: &str, req: UpdatePostRequest) -> AppResult<Post> {
    repo.transaction(&[Collection::Posts], |tx| {
        let mut post = tx.get::<Post>(slug)?.ok_or_else(|| AppError::not_found("Post"))?;

        if let Some(new_slug) = req.slug {
            require("slug", &new_slug)?;
            let new_slug = new_slug.trim().to_string();
            if new_slug != slug && tx.contains::<Post>(&new_slug)? {
                return Err(slug_taken(&new_slug));
            }
            post.slug = new_slug;
        }
        if let Some(title) = req.title {
            require("title", &title)?;
            post.title = title.trim().to_string();
        }
        if let Some(author) = req.author {
            post.author = author;
        }
        if let Some(category) = req.category {
            post.category = category;
        }
        if let Some(content) = req.content {
            post.content = content;
        }
        if req.thumbnail.is_some() {
            post.thumbnail = req.thumbnail;
        }
        if req.source.is_some() {
            post.source = req.source;
        }
        if let Some(featured) = req.featured {
            post.featured = featured;
        }
        if let Some(schedule) = req.schedule {
            post.schedule = schedule;
        }

        let now = Utc::now();
        post.updated_at = Some(now);
        post.refresh_publication(now);

        tx.replace(slug, &post)?;
        Ok(post)
    })
    .await
}

pub async fn delete_post(repo: &Repository, slug: &str) -> AppResult<Post> {
    repo.transaction(&[Collection::Posts], |tx| {
        tx.remove::<Post>(slug)?.ok_or_else(|| AppError::not_found("Post"))
    })
    .await
}
