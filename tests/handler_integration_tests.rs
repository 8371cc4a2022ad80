use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::test;
use uuid::Uuid;
use wrytix::{
    AppError, AppState,
    audit::{LogQuery, action},
    auth::{AuthUser, RequestContext},
    config::AppConfig,
    error::ErrorBody,
    handlers::{self, ApiJson, ApiPath, ApiQuery, comments::CommentQuery},
    models::{
        ApproveUserRequest, CreateDeletionRequest, CreatePostRequest, CreateUserRequest, Headline, LogEntry,
        RegisterRequest, Role, UpdateUserRequest, User,
    },
    storage::{MemoryStore, StoreState},
    workflow::accounts,
};

// --- TEST UTILITIES ---

// Creates an AppState over an empty in-memory store
fn create_test_state() -> AppState {
    AppState::new(Arc::new(MemoryStore::new()) as StoreState, AppConfig::default())
}

fn failing_state() -> AppState {
    AppState::new(Arc::new(MemoryStore::new_failing()) as StoreState, AppConfig::default())
}

fn as_role(username: &str, role: Role) -> RequestContext {
    RequestContext::for_user(AuthUser {
        id: Uuid::new_v4(),
        username: username.to_string(),
        role,
    })
}

fn admin() -> RequestContext {
    as_role("root", Role::Admin)
}

fn editor() -> RequestContext {
    as_role("ed", Role::Editor)
}

async fn logs_with_action(state: &AppState, wanted: &str) -> Vec<LogEntry> {
    state
        .audit
        .query(&LogQuery::default())
        .await
        .unwrap()
        .into_iter()
        .filter(|entry| entry.action == wanted)
        .collect()
}

async fn seed_user(state: &AppState, username: &str, role: Role) -> User {
    accounts::create_user(
        &state.repo,
        CreateUserRequest {
            username: username.to_string(),
            email: format!("{username}@wrytix.test"),
            password: "secret-password".to_string(),
            role,
            ..CreateUserRequest::default()
        },
        state.config.bcrypt_cost,
    )
    .await
    .unwrap()
}

// --- AUTHORIZATION GATE ---

#[test]
async fn test_gate_denial_is_audited_with_allowed_roles() {
    let state = create_test_state();

    let result = handlers::users::list_users(State(state.clone()), as_role("vic", Role::Viewer)).await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    let denied = logs_with_action(&state, action::ACCESS_DENIED).await;
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].actor, "vic");
    assert_eq!(denied[0].details["allowedRoles"], serde_json::json!(["admin", "editor"]));
}

#[test]
async fn test_anonymous_caller_is_unauthorized() {
    let state = create_test_state();

    let result = handlers::site::update_headline(
        State(state.clone()),
        RequestContext::default(),
        Ok(ApiJson(Headline {
            text: "Hijacked".to_string(),
        })),
    )
    .await;

    assert!(matches!(result, Err(AppError::Unauthorized(_))));
    assert_eq!(state.headline.get(), "Welcome to Wrytix");
    assert_eq!(logs_with_action(&state, action::LOGIN_REQUIRED).await.len(), 1);
}

#[test]
async fn test_admin_cannot_submit_posts() {
    let state = create_test_state();

    let result = handlers::submissions::create_submission(
        State(state),
        admin(),
        Ok(ApiJson(Default::default())),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
}

// --- HEADLINE ---

#[test]
async fn test_update_headline_success() {
    let state = create_test_state();

    let Json(updated) = handlers::site::update_headline(
        State(state.clone()),
        editor(),
        Ok(ApiJson(Headline {
            text: "  Election night  ".to_string(),
        })),
    )
    .await
    .unwrap();

    assert_eq!(updated.text, "Election night");
    let Json(current) = handlers::site::get_headline(State(state.clone())).await;
    assert_eq!(current.text, "Election night");
    assert_eq!(logs_with_action(&state, action::HEADLINE_UPDATED).await.len(), 1);
}

#[test]
async fn test_blank_headline_is_rejected_and_logged() {
    let state = create_test_state();

    let result = handlers::site::update_headline(
        State(state.clone()),
        editor(),
        Ok(ApiJson(Headline { text: "   ".to_string() })),
    )
    .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(logs_with_action(&state, action::HEADLINE_UPDATE_FAILED).await.len(), 1);
}

// --- REGISTRATION ---

#[test]
async fn test_approve_user_records_one_entry() {
    let state = create_test_state();
    let (status, Json(pending)) = handlers::moderation::register(
        State(state.clone()),
        RequestContext::default(),
        Ok(ApiJson(RegisterRequest {
            username: "alice".to_string(),
            email: "alice@wrytix.test".to_string(),
            password: "secret-password".to_string(),
            ..RegisterRequest::default()
        })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(pending.role, Role::Author);

    let Json(user) = handlers::moderation::approve_user(
        State(state.clone()),
        admin(),
        Ok(ApiJson(ApproveUserRequest {
            pending_user_id: pending.id,
        })),
    )
    .await
    .unwrap();

    assert_eq!(user.username, "alice");
    let approvals = logs_with_action(&state, action::USER_APPROVED).await;
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0].target, "alice");

    // Approving the same request again fails: it no longer exists.
    let again = handlers::moderation::approve_pending_user(State(state.clone()), admin(), Ok(ApiPath(pending.id))).await;
    assert!(matches!(again, Err(AppError::NotFound(_))));
    assert_eq!(logs_with_action(&state, action::USER_APPROVE_FAILED).await.len(), 1);
}

// --- USERS & SESSIONS ---

#[test]
async fn test_role_change_revokes_sessions() {
    let state = create_test_state();
    let user = seed_user(&state, "bob", Role::Author).await;
    let token = state
        .sessions
        .create(AuthUser {
            id: user.id,
            username: user.username.clone(),
            role: user.role,
        })
        .await;

    let Json(updated) = handlers::users::update_user(
        State(state.clone()),
        admin(),
        Ok(ApiPath(user.id)),
        Ok(ApiJson(UpdateUserRequest {
            role: Some(Role::Editor),
            ..UpdateUserRequest::default()
        })),
    )
    .await
    .unwrap();

    assert_eq!(updated.role, Role::Editor);
    assert!(state.sessions.resolve(&token).await.is_none());
}

#[test]
async fn test_deletion_approval_removes_user_and_sessions() {
    let state = create_test_state();
    let target = seed_user(&state, "carl", Role::Author).await;
    let token = state
        .sessions
        .create(AuthUser {
            id: target.id,
            username: target.username.clone(),
            role: target.role,
        })
        .await;

    let (_, Json(request)) = handlers::moderation::request_deletion(
        State(state.clone()),
        editor(),
        Ok(ApiJson(CreateDeletionRequest {
            user_id: target.id,
            reason: "Spam account".to_string(),
        })),
    )
    .await
    .unwrap();

    // Editors may file requests but not decide them.
    let denied = handlers::moderation::approve_deletion(State(state.clone()), editor(), Ok(ApiPath(request.id))).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let Json(deleted) = handlers::moderation::approve_deletion(State(state.clone()), admin(), Ok(ApiPath(request.id)))
        .await
        .unwrap();

    assert_eq!(deleted.id, target.id);
    assert!(state.sessions.resolve(&token).await.is_none());
    let Json(remaining) = handlers::moderation::list_deletions(State(state.clone()), admin())
        .await
        .unwrap();
    assert!(remaining.is_empty());
}

#[test]
async fn test_concurrent_deletion_approvals_resolve_once() {
    let state = create_test_state();
    let target = seed_user(&state, "erin", Role::Author).await;
    let (_, Json(request)) = handlers::moderation::request_deletion(
        State(state.clone()),
        editor(),
        Ok(ApiJson(CreateDeletionRequest {
            user_id: target.id,
            reason: "Requested by owner".to_string(),
        })),
    )
    .await
    .unwrap();

    let (first, second) = tokio::join!(
        handlers::moderation::approve_deletion(State(state.clone()), admin(), Ok(ApiPath(request.id))),
        handlers::moderation::approve_deletion(State(state.clone()), admin(), Ok(ApiPath(request.id))),
    );

    let failures: Vec<AppError> = [first, second].into_iter().filter_map(Result::err).collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(failures[0], AppError::NotFound(_)));
    assert_eq!(logs_with_action(&state, action::USER_DELETE_APPROVED).await.len(), 1);
    assert_eq!(logs_with_action(&state, action::USER_DELETE_APPROVE_FAILED).await.len(), 1);
}

#[test]
async fn test_cancel_by_other_editor_is_forbidden() {
    let state = create_test_state();
    let target = seed_user(&state, "dina", Role::Author).await;
    let requester = editor();
    let (_, Json(request)) = handlers::moderation::request_deletion(
        State(state.clone()),
        requester.clone(),
        Ok(ApiJson(CreateDeletionRequest {
            user_id: target.id,
            reason: "Duplicate".to_string(),
        })),
    )
    .await
    .unwrap();

    let result = handlers::moderation::cancel_deletion(
        State(state.clone()),
        as_role("other-editor", Role::Editor),
        Ok(ApiPath(request.id)),
    )
    .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    assert_eq!(logs_with_action(&state, action::USER_DELETE_CANCEL_FAILED).await.len(), 1);

    let Json(message) = handlers::moderation::cancel_deletion(State(state.clone()), requester, Ok(ApiPath(request.id)))
        .await
        .unwrap();
    assert_eq!(message.message, "Request cancelled");
}

// --- POSTS & COMMENTS ---

#[test]
async fn test_scheduled_posts_are_hidden_from_public_list() {
    let state = create_test_state();
    for (slug, schedule) in [
        ("live", Some(Utc::now() - Duration::hours(1))),
        ("future", Some(Utc::now() + Duration::days(1))),
    ] {
        handlers::posts::create_post(
            State(state.clone()),
            editor(),
            Ok(ApiJson(CreatePostRequest {
                slug: slug.to_string(),
                title: slug.to_string(),
                content: "Body".to_string(),
                category: "news".to_string(),
                schedule,
                ..CreatePostRequest::default()
            })),
        )
        .await
        .unwrap();
    }

    let Json(public) = handlers::posts::list_posts(State(state.clone())).await.unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].slug, "live");
    assert_eq!(public[0].author, "ed");

    let Json(all) = handlers::posts::list_all_posts(State(state.clone()), editor()).await.unwrap();
    assert_eq!(all.len(), 2);

    let Json(viewed) = handlers::posts::view_post(State(state.clone()), RequestContext::default(), Ok(ApiPath("live".to_string())))
        .await
        .unwrap();
    assert_eq!(viewed.views, 1);
    assert!(viewed.last_viewed.is_some());
}

#[test]
async fn test_comments_require_slug() {
    let state = create_test_state();

    let result = handlers::comments::list_comments(State(state), ApiQuery(CommentQuery { slug: None })).await;

    let err = result.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// --- LOGS ---

#[test]
async fn test_clear_logs_leaves_marker_entry() {
    let state = create_test_state();
    handlers::site::ping(State(state.clone()), RequestContext::default()).await;
    handlers::site::ping(State(state.clone()), RequestContext::default()).await;

    let Json(message) = handlers::logs::clear_logs(State(state.clone()), admin()).await.unwrap();
    assert_eq!(message.message, "Cleared 2 log entries");

    let Json(entries) = handlers::logs::get_logs(State(state.clone()), admin(), ApiQuery(LogQuery::default()))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, action::LOGS_CLEARED);
    assert_eq!(entries[0].actor, "root");
}

#[test]
async fn test_logs_are_newest_first_and_filterable() {
    let state = create_test_state();
    handlers::site::ping(State(state.clone()), RequestContext::default()).await;
    let _ = handlers::logs::get_logs(State(state.clone()), editor(), ApiQuery(LogQuery::default())).await;

    let Json(entries) = handlers::logs::get_logs(
        State(state.clone()),
        admin(),
        ApiQuery(LogQuery {
            action: Some("ACCESS".to_string()),
            ..LogQuery::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor, "ed");

    let Json(all) = handlers::logs::get_logs(State(state), admin(), ApiQuery(LogQuery::default()))
        .await
        .unwrap();
    assert_eq!(all[0].action, action::ACCESS_DENIED);
    assert_eq!(all[1].action, action::PING);
}

// --- STORE FAILURES ---

#[test]
async fn test_store_failure_is_a_generic_500() {
    let state = failing_state();

    let err = handlers::posts::list_posts(State(state)).await.unwrap_err();
    let response = err.into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.error, "Internal server error");
}
