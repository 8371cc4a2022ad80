use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session: the blog frontend's reads, comments,
/// self-registration and the login flow itself.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /ping
        // Liveness check; also leaves a `ping` entry in the audit log.
        .route("/ping", get(handlers::site::ping))
        // --- Session ---
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        // GET /verify-session
        // Answers 401 itself when there is no live session.
        .route("/verify-session", get(handlers::auth::verify_session))
        // --- Site ---
        .route("/headline", get(handlers::site::get_headline))
        .route("/check-username", get(handlers::site::check_username))
        .route("/check-email", get(handlers::site::check_email))
        // GET /ads, GET /ads/{id}
        // Reads apply the expiry policy before answering.
        .route("/ads", get(handlers::ads::list_ads))
        .route("/ads/{id}", get(handlers::ads::get_ad))
        // --- Posts ---
        // GET /posts lists published posts only; GET /posts/{slug} returns any post.
        .route("/posts", get(handlers::posts::list_posts))
        .route("/posts/{slug}", get(handlers::posts::get_post))
        .route("/posts/{slug}/view", post(handlers::posts::view_post))
        // --- Comments ---
        .route(
            "/comments",
            get(handlers::comments::list_comments).post(handlers::comments::add_comment),
        )
        // POST /pendingUsers
        // Self-registration; the account only exists once an admin approves it.
        .route("/pendingUsers", post(handlers::moderation::register))
}
