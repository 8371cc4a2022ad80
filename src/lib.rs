use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use serde_json::json;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod ads;
pub mod audit;
pub mod auth;
pub mod comments;
pub mod config;
pub mod error;
pub mod handlers;
pub mod headline;
pub mod jobs;
pub mod models;
pub mod posts;
pub mod repository;
pub mod storage;
pub mod workflow;

// Module for routing segregation (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use audit::AuditLog;
pub use auth::SessionStore;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use headline::HeadlineState;
pub use repository::Repository;
pub use storage::{DocumentStore, JsonFileStore, MemoryStore, StoreState};

/// ApiDoc
///
/// Auto-generated OpenAPI document, served at `/api-docs/openapi.json` and browsable
/// through Swagger UI at `/swagger-ui`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::login, handlers::auth::logout, handlers::auth::verify_session,
        handlers::site::get_headline, handlers::site::update_headline, handlers::site::ping,
        handlers::site::check_username, handlers::site::check_email,
        handlers::posts::list_posts, handlers::posts::list_all_posts, handlers::posts::get_post,
        handlers::posts::view_post, handlers::posts::create_post, handlers::posts::update_post,
        handlers::posts::delete_post,
        handlers::submissions::create_submission, handlers::submissions::list_submissions,
        handlers::submissions::get_submission, handlers::submissions::update_submission,
        handlers::submissions::delete_submission,
        handlers::ads::list_ads, handlers::ads::get_ad, handlers::ads::create_ad,
        handlers::ads::update_ad, handlers::ads::delete_ad,
        handlers::comments::list_comments, handlers::comments::add_comment,
        handlers::users::list_users, handlers::users::get_user, handlers::users::create_user,
        handlers::users::update_user, handlers::users::delete_user,
        handlers::moderation::register, handlers::moderation::list_pending_users,
        handlers::moderation::get_pending_user, handlers::moderation::discard_pending_user,
        handlers::moderation::approve_user, handlers::moderation::approve_pending_user,
        handlers::moderation::request_deletion, handlers::moderation::list_deletions,
        handlers::moderation::approve_deletion, handlers::moderation::reject_deletion,
        handlers::moderation::cancel_deletion,
        handlers::logs::get_logs, handlers::logs::clear_logs
    ),
    components(
        schemas(
            models::Role, models::UserStatus, models::UserView, models::PendingUserView,
            models::DocumentRef, models::PendingDeletion, models::DeletionStatus, models::Post,
            models::SubmissionStatus, models::PostSubmission, models::AdKind, models::Ad,
            models::CommentEntry, models::CommentThread, models::LogEntry,
            models::LoginRequest, models::RegisterRequest, models::ApproveUserRequest,
            models::CreateUserRequest, models::UpdateUserRequest, models::CreateDeletionRequest,
            models::CreatePostRequest, models::UpdatePostRequest, models::CreateSubmissionRequest,
            models::UpdateSubmissionRequest, models::CreateAdRequest, models::UpdateAdRequest,
            models::CreateCommentRequest, models::Headline, models::MessageResponse,
            models::AvailabilityResponse, models::SubmissionUpdateResponse,
            auth::AuthUser, error::ErrorBody,
        )
    ),
    tags(
        (name = "wrytix", description = "Wrytix CMS API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// The single container of shared services handed to every handler. Cloning is
/// cheap: every field is a handle onto shared state.
#[derive(Clone)]
pub struct AppState {
    /// Typed access to the document store.
    pub repo: Repository,
    pub audit: AuditLog,
    /// Server-side session table behind the `wrytix_sid` cookie.
    pub sessions: SessionStore,
    pub headline: HeadlineState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Wires every service around one store.
    pub fn new(store: StoreState, config: AppConfig) -> Self {
        let repo = Repository::new(store);
        Self {
            audit: AuditLog::new(repo.clone(), config.log_retention),
            sessions: SessionStore::new(config.session_ttl),
            headline: HeadlineState::new(config.headline.clone()),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for Repository {
    fn from_ref(app_state: &AppState) -> Repository {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AuditLog {
    fn from_ref(app_state: &AppState) -> AuditLog {
        app_state.audit.clone()
    }
}

impl FromRef<AppState> for SessionStore {
    fn from_ref(app_state: &AppState) -> SessionStore {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for HeadlineState {
    fn from_ref(app_state: &AppState) -> HeadlineState {
        app_state.headline.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated and admin routers: a request without a live session is
/// answered with 401 (and a `login-required` audit entry) before reaching a handler.
async fn auth_middleware(
    State(state): State<AppState>,
    ctx: auth::RequestContext,
    request: Request,
    next: Next,
) -> Response {
    if ctx.user.is_none() {
        state
            .audit
            .record(&ctx, audit::action::LOGIN_REQUIRED, request.uri().path(), json!({}))
            .await;
        return AppError::Unauthorized("Login required".to_string()).into_response();
    }
    next.run(request).await
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    // Credentialed requests cannot use a wildcard origin, so `*` mirrors the caller.
    match &config.allowed_origins {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect();
            base.allow_origin(origins).allow_credentials(true)
        }
        None => base.allow_origin(AllowOrigin::mirror_request()).allow_credentials(true),
    }
}

/// create_router
///
/// Assembles the routing tree, applies the scoped auth middleware and the global
/// observability stack, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Builds the per-request span so every log line of one request carries its
/// `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
