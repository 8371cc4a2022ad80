use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Panel endpoints shared by authors, editors and admins. Every route here requires
/// a live session (see `auth_middleware`); each handler then checks the capability
/// its operation needs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // PUT /headline (admins, editors)
        .route("/headline", put(handlers::site::update_headline))
        // --- Posts (editors, admins) ---
        // GET /posts/all includes scheduled posts.
        .route("/posts/all", get(handlers::posts::list_all_posts))
        .route("/posts", post(handlers::posts::create_post))
        .route(
            "/posts/{slug}",
            put(handlers::posts::update_post).delete(handlers::posts::delete_post),
        )
        // --- Submission Review ---
        // Authors submit and see their own entries; editors and admins review.
        .route(
            "/postSubmissions",
            get(handlers::submissions::list_submissions).post(handlers::submissions::create_submission),
        )
        .route(
            "/postSubmissions/{id}",
            get(handlers::submissions::get_submission)
                .put(handlers::submissions::update_submission)
                .delete(handlers::submissions::delete_submission),
        )
        // --- Users (read access for editors) ---
        .route("/users", get(handlers::users::list_users))
        .route("/users/{id}", get(handlers::users::get_user))
        // --- Deletion Requests ---
        // Editors and admins file, list and cancel; approval is in the admin router.
        .route(
            "/pendingDeletions",
            get(handlers::moderation::list_deletions).post(handlers::moderation::request_deletion),
        )
        .route("/pendingDeletions/{id}", axum::routing::delete(handlers::moderation::cancel_deletion))
}
