use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Admin Router Module
///
/// Operations only admins hold the capability for: account management, registration
/// and deletion decisions, ads and the audit log.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // --- Accounts ---
        .route("/users", post(handlers::users::create_user))
        .route(
            "/users/{id}",
            put(handlers::users::update_user).delete(handlers::users::delete_user),
        )
        // --- Registration Queue ---
        .route("/pendingUsers", get(handlers::moderation::list_pending_users))
        .route(
            "/pendingUsers/{id}",
            get(handlers::moderation::get_pending_user).delete(handlers::moderation::discard_pending_user),
        )
        // Two entry points, one operation.
        .route("/pendingUsers/{id}/approve", post(handlers::moderation::approve_pending_user))
        .route("/approve-user", post(handlers::moderation::approve_user))
        // --- Deletion Decisions ---
        .route("/pendingDeletions/{id}/approve", post(handlers::moderation::approve_deletion))
        .route("/pendingDeletions/{id}/reject", post(handlers::moderation::reject_deletion))
        // --- Ads ---
        .route("/ads", post(handlers::ads::create_ad))
        .route(
            "/ads/{id}",
            put(handlers::ads::update_ad).delete(handlers::ads::delete_ad),
        )
        // --- Audit Log ---
        .route(
            "/logs",
            get(handlers::logs::get_logs).delete(handlers::logs::clear_logs),
        )
}
