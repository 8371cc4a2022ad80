use axum::{
    Router,
    body::Body,
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, header, request::Parts},
    response::Response,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;
use wrytix::{
    AppError, AppState, create_router,
    audit::{LogQuery, action},
    auth::{AuthUser, SESSION_COOKIE},
    config::AppConfig,
    models::{CreateUserRequest, Role},
    storage::{MemoryStore, StoreState},
    workflow::accounts,
};

// --- Helper Functions ---

fn create_app_state() -> AppState {
    AppState::new(Arc::new(MemoryStore::new()) as StoreState, AppConfig::default())
}

async fn seed_user(state: &AppState, username: &str, password: &str, role: Role) {
    accounts::create_user(
        &state.repo,
        CreateUserRequest {
            username: username.to_string(),
            email: format!("{username}@wrytix.test"),
            password: password.to_string(),
            role,
            ..CreateUserRequest::default()
        },
        state.config.bcrypt_cost,
    )
    .await
    .unwrap();
}

/// Opens a session directly in the session table and returns the Cookie header value.
async fn session_cookie(state: &AppState, username: &str, role: Role) -> String {
    let token = state
        .sessions
        .create(AuthUser {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role,
        })
        .await;
    format!("{SESSION_COOKIE}={token}")
}

fn request(method: Method, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> Response {
    app.clone().oneshot(req).await.unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(cookie: Option<&str>) -> Parts {
    let (parts, _) = request(Method::GET, "/", cookie, None).into_parts();
    parts
}

// --- Extractor Tests ---

#[tokio::test]
async fn test_auth_success_with_valid_session() {
    let app_state = create_app_state();
    let cookie = session_cookie(&app_state, "alice", Role::Author).await;

    let mut parts = get_request_parts(Some(&cookie));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    let user = auth_user.unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.role, Role::Author);
}

#[tokio::test]
async fn test_auth_failure_with_missing_cookie() {
    let app_state = create_app_state();

    let mut parts = get_request_parts(None);
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn test_auth_failure_with_unknown_session() {
    let app_state = create_app_state();
    let forged = format!("{SESSION_COOKIE}=not-a-real-session");

    let mut parts = get_request_parts(Some(&forged));
    let auth_user = AuthUser::from_request_parts(&mut parts, &app_state).await;

    assert!(matches!(auth_user, Err(AppError::Unauthorized(_))));
}

// --- Router Tests ---

#[tokio::test]
async fn test_protected_route_without_session_is_401() {
    let state = create_app_state();
    let app = create_router(state.clone());

    let response = send(&app, request(Method::GET, "/users", None, None)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["error"], "Login required");

    let logged = state
        .audit
        .query(&LogQuery {
            action: Some(action::LOGIN_REQUIRED.to_string()),
            ..LogQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].actor, "anonymous");
    assert_eq!(logged[0].target, "/users");
}

#[tokio::test]
async fn test_public_routes_need_no_session() {
    let app = create_router(create_app_state());

    let response = send(&app, request(Method::GET, "/headline", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["text"], "Welcome to Wrytix");

    let response = send(&app, request(Method::GET, "/posts", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([]));
}

#[tokio::test]
async fn test_wrong_role_is_403() {
    let state = create_app_state();
    let app = create_router(state.clone());
    let cookie = session_cookie(&state, "anna", Role::Author).await;

    let response = send(&app, request(Method::GET, "/logs", Some(&cookie), None)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_login_sets_http_only_cookie_and_session_resolves() {
    let state = create_app_state();
    seed_user(&state, "ed", "correct horse", Role::Editor).await;
    let app = create_router(state.clone());

    let response = send(
        &app,
        request(
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "ed", "password": "correct horse" })),
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with(&format!("{SESSION_COOKIE}=")));
    assert!(set_cookie.contains("HttpOnly"));
    assert_eq!(json_body(response).await["role"], "editor");

    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let response = send(&app, request(Method::GET, "/verify-session", Some(&cookie), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["username"], "ed");

    // Logging out ends the session server-side.
    let response = send(&app, request(Method::POST, "/logout", Some(&cookie), None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let response = send(&app, request(Method::GET, "/verify-session", Some(&cookie), None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_failed_login_is_generic_and_audited() {
    let state = create_app_state();
    seed_user(&state, "ed", "correct horse", Role::Editor).await;
    let app = create_router(state.clone());

    for (username, password) in [("ed", "wrong"), ("ghost", "whatever")] {
        let response = send(
            &app,
            request(
                Method::POST,
                "/login",
                None,
                Some(json!({ "username": username, "password": password })),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["error"], "Invalid username or password");
    }

    let failures = state
        .audit
        .query(&LogQuery {
            action: Some(action::LOGIN_FAILED.to_string()),
            ..LogQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].details["reason"], "User not found");
    assert_eq!(failures[1].details["reason"], "Invalid password");
}

#[tokio::test]
async fn test_malformed_input_is_400() {
    let state = create_app_state();
    let app = create_router(state.clone());
    let cookie = session_cookie(&state, "root", Role::Admin).await;

    let response = send(&app, request(Method::GET, "/users/not-a-uuid", Some(&cookie), None)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(response).await["error"].is_string());

    let bad_json = Request::builder()
        .method(Method::POST)
        .uri("/comments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ nope"))
        .unwrap();
    let response = send(&app, bad_json).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rejected_inputs_are_audited() {
    let state = create_app_state();
    let app = create_router(state.clone());
    let cookie = session_cookie(&state, "root", Role::Admin).await;

    let response = send(&app, request(Method::POST, "/approve-user", Some(&cookie), Some(json!({})))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        request(Method::POST, "/pendingUsers/not-a-uuid/approve", Some(&cookie), None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let failures = state
        .audit
        .query(&LogQuery {
            action: Some(action::USER_APPROVE_FAILED.to_string()),
            ..LogQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].target, "/pendingUsers/not-a-uuid/approve");
    assert_eq!(failures[1].target, "/approve-user");
    assert_eq!(failures[1].actor, "root");
    assert!(failures[1].details["reason"].is_string());
}

#[tokio::test]
async fn test_invalid_schedule_is_audited_as_failed_create() {
    let state = create_app_state();
    let app = create_router(state.clone());
    let cookie = session_cookie(&state, "ed", Role::Editor).await;

    let response = send(
        &app,
        request(
            Method::POST,
            "/posts",
            Some(&cookie),
            Some(json!({ "slug": "bad-date", "title": "Soon", "schedule": "next tuesday" })),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let failures = state
        .audit
        .query(&LogQuery {
            action: Some(action::POST_CREATE_FAILED.to_string()),
            ..LogQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].target, "/posts");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let app = create_router(create_app_state());

    let response = send(&app, request(Method::GET, "/ping", None, None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
