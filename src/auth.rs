use axum::{
    extract::{ConnectInfo, FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::RwLock;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::Role,
};

/// Name of the http-only cookie carrying the opaque session id.
pub const SESSION_COOKIE: &str = "wrytix_sid";

/// AuthUser
///
/// The resolved identity of an authenticated request, as stored in the session
/// table at login time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

// --- Capabilities ---

/// Capability
///
/// A named class of operations together with the exact set of roles allowed to
/// perform it. Roles are not ordered: an admin passes only where `Admin` is listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    ManageUsers,
    ViewUsers,
    RequestDeletion,
    ViewDeletions,
    ReviewDeletion,
    SubmitPost,
    ViewSubmissions,
    EditSubmission,
    DeleteSubmission,
    ReviewSubmission,
    ManagePosts,
    ManageAds,
    EditHeadline,
    ReadLogs,
    ClearLogs,
}

impl Capability {
    pub fn allowed_roles(self) -> &'static [Role] {
        use Capability::*;
        match self {
            ManageUsers | ReviewDeletion | ManageAds | ReadLogs | ClearLogs => &[Role::Admin],
            ViewUsers | RequestDeletion | ViewDeletions | EditHeadline => &[Role::Admin, Role::Editor],
            SubmitPost => &[Role::Author],
            ViewSubmissions | EditSubmission | DeleteSubmission => {
                &[Role::Author, Role::Editor, Role::Admin]
            }
            ReviewSubmission | ManagePosts => &[Role::Editor, Role::Admin],
        }
    }

    pub fn permits(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }

    pub fn name(self) -> &'static str {
        use Capability::*;
        match self {
            ManageUsers => "manage-users",
            ViewUsers => "view-users",
            RequestDeletion => "request-deletion",
            ViewDeletions => "view-deletions",
            ReviewDeletion => "review-deletion",
            SubmitPost => "submit-post",
            ViewSubmissions => "view-submissions",
            EditSubmission => "edit-submission",
            DeleteSubmission => "delete-submission",
            ReviewSubmission => "review-submission",
            ManagePosts => "manage-posts",
            ManageAds => "manage-ads",
            EditHeadline => "edit-headline",
            ReadLogs => "read-logs",
            ClearLogs => "clear-logs",
        }
    }
}

/// authorize
///
/// The authorization gate: `Unauthorized` without an identity, `Forbidden` when the
/// identity's role is outside the capability's allowed set.
pub fn authorize(user: Option<&AuthUser>, capability: Capability) -> AppResult<&AuthUser> {
    let user = user.ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;
    if capability.permits(user.role) {
        Ok(user)
    } else {
        Err(AppError::Forbidden(format!(
            "Role '{}' may not {}",
            user.role.as_str(),
            capability.name().replace('-', " ")
        )))
    }
}

// --- Session Table ---

#[derive(Debug, Clone)]
struct SessionRecord {
    user: AuthUser,
    expires_at: DateTime<Utc>,
}

/// SessionStore
///
/// Server-side session table keyed by a random opaque id. Sessions live in process
/// memory only, so a restart logs everyone out.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionRecord>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opens a session for `user` and returns its id.
    pub async fn create(&self, user: AuthUser) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::days(1));
        let now = Utc::now();
        let record = SessionRecord {
            user,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        self.sessions.write().await.insert(token.clone(), record);
        token
    }

    /// Looks up a live session. An expired one is dropped on the spot.
    pub async fn resolve(&self, token: &str) -> Option<AuthUser> {
        let now = Utc::now();
        {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(record) if record.expires_at > now => return Some(record.user.clone()),
                Some(_) => {}
                None => return None,
            }
        }
        self.sessions.write().await.remove(token);
        None
    }

    pub async fn destroy(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drops every session belonging to `user_id`, e.g. after the account is deleted.
    pub async fn revoke_user(&self, user_id: Uuid) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.user.id != user_id);
        before - sessions.len()
    }

    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| record.expires_at > now);
        before - sessions.len()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

// --- Extractors ---

/// RequestContext
///
/// Everything the audit log and the authorization gate need to know about the
/// caller: the session identity (if any), client ip, user agent and the request
/// path. Never rejects; anonymous requests simply carry `user: None`.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<AuthUser>,
    pub ip: String,
    pub user_agent: String,
    pub path: String,
}

impl RequestContext {
    pub fn authorize(&self, capability: Capability) -> AppResult<&AuthUser> {
        authorize(self.user.as_ref(), capability)
    }

    /// Username used as the audit `actor`.
    pub fn actor(&self) -> &str {
        self.user
            .as_ref()
            .map(|user| user.username.as_str())
            .unwrap_or("anonymous")
    }

    pub fn for_user(user: AuthUser) -> Self {
        Self {
            user: Some(user),
            ..Self::default()
        }
    }
}

fn client_ip(parts: &Parts) -> String {
    let forwarded = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty());

    forwarded
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = SessionStore::from_ref(state);
        let Ok(jar) = CookieJar::from_request_parts(parts, state).await;

        let user = match jar.get(SESSION_COOKIE) {
            Some(cookie) => sessions.resolve(cookie.value()).await,
            None => None,
        };

        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(RequestContext {
            user,
            ip: client_ip(parts),
            user_agent,
            path: parts.uri.path().to_string(),
        })
    }
}

/// AuthUser Extractor Implementation
///
/// Resolves the `wrytix_sid` cookie against the session table.
///
/// Rejection: `AppError::Unauthorized` when the cookie is missing, unknown or expired.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    SessionStore: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = SessionStore::from_ref(state);
        let Ok(jar) = CookieJar::from_request_parts(parts, state).await;

        let token = jar
            .get(SESSION_COOKIE)
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;

        sessions
            .resolve(token.value())
            .await
            .ok_or_else(|| AppError::Unauthorized("Session expired".to_string()))
    }
}

// --- Passwords ---

/// Hashes on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password(password: &str, cost: u32) -> AppResult<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// A malformed stored hash counts as a mismatch.
pub async fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let password = password.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash).unwrap_or(false))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
}
