use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Roles & Statuses ---

/// Role
///
/// The fixed privilege levels. No hierarchy is implied between them: every
/// operation names its own allowed set (see `auth::Capability`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    Editor,
    Author,
    #[default]
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Editor => "editor",
            Role::Author => "author",
            Role::Viewer => "viewer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum UserStatus {
    Active,
    #[default]
    Pending,
    Inactive,
    Suspended,
}

// --- Users & Registration ---

/// User
///
/// The authoritative account record stored in `users.json`. The password hash
/// never leaves the server: API responses use `UserView`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

/// UserView
///
/// Public projection of a `User`, without the credential hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub status: UserStatus,
    pub created_at: DateTime<Utc>,
    pub approved_by: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        UserView {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            role: user.role,
            status: user.status,
            created_at: user.created_at,
            approved_by: user.approved_by.clone(),
            approved_at: user.approved_at,
        }
    }
}

/// DocumentRef
///
/// Reference to a supporting document uploaded out of band with a registration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DocumentRef {
    pub filename: String,
    pub original_name: String,
}

/// PendingUser
///
/// A self-registered account awaiting an admin decision (`pendingUsers.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PendingUserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: Option<String>,
    pub role: Role,
    pub submitted_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub document: Option<DocumentRef>,
}

impl From<&PendingUser> for PendingUserView {
    fn from(pending: &PendingUser) -> Self {
        PendingUserView {
            id: pending.id,
            username: pending.username.clone(),
            email: pending.email.clone(),
            full_name: pending.full_name.clone(),
            role: pending.role,
            submitted_by: pending.submitted_by.clone(),
            created_at: pending.created_at,
            document: pending.document.clone(),
        }
    }
}

/// PendingDeletion
///
/// A request to remove a user. The `target*` fields are a snapshot of the user's
/// identity taken when the request was filed, so reviewers can still read who it
/// was about after the account has changed or disappeared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PendingDeletion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reason: String,
    pub target_username: String,
    pub target_email: String,
    pub target_role: Role,
    #[serde(default)]
    pub target_full_name: Option<String>,
    pub requested_by: String,
    /// Identity checked on cancel; `requested_by` is kept for display.
    #[serde(default)]
    pub requested_by_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: DeletionStatus,
}

/// Only `pending` is ever stored: decided requests are removed from the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum DeletionStatus {
    #[default]
    Pending,
}

// --- Posts & Submissions ---

/// Post
///
/// Published or scheduled content, keyed by its unique `slug` (`posts.json`).
/// `isPublished` is derived from `schedule <= now` and refreshed on every read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Post {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub content: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub featured: bool,
    pub schedule: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_published: bool,
    #[serde(default)]
    pub views: u64,
    #[serde(default)]
    pub last_viewed: Option<DateTime<Utc>>,
}

impl Post {
    pub fn refresh_publication(&mut self, now: DateTime<Utc>) {
        self.is_published = self.schedule <= now;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum SubmissionStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// PostSubmission
///
/// An author's draft awaiting editorial review (`postSubmissions.json`).
/// Approved submissions are converted into a `Post` and removed; rejected ones
/// stay so the author can see the verdict and the editor's comments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PostSubmission {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub schedule: Option<DateTime<Utc>>,
    pub status: SubmissionStatus,
    pub submitted_by: String,
    #[serde(default)]
    pub editor_comments: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl PostSubmission {
    /// Builds the post an approval publishes. An unscheduled submission goes live
    /// immediately.
    pub fn to_post(&self, now: DateTime<Utc>) -> Post {
        let schedule = self.schedule.unwrap_or(now);
        Post {
            id: Uuid::new_v4(),
            slug: self.slug.clone(),
            title: self.title.clone(),
            author: self.submitted_by.clone(),
            category: self.category.clone(),
            content: self.content.clone(),
            thumbnail: self.thumbnail.clone(),
            source: None,
            featured: false,
            schedule,
            created_at: now,
            updated_at: None,
            is_published: schedule <= now,
            views: 0,
            last_viewed: None,
        }
    }
}

// --- Ads ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum AdKind {
    #[default]
    Image,
    Video,
    Embed,
    Text,
    Html,
}

/// Ad
///
/// An advertisement with an optional `[startDate, endDate]` window (`ads.json`).
/// `active` is set by clients and only ever switched off by the server, once
/// `endDate` has passed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Ad {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: AdKind,
    pub category: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub text: String,
    /// Data URL or external reference to the creative.
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

// --- Comments ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentEntry {
    pub username: String,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

/// CommentThread
///
/// All comments of one post, keyed by the post's slug. Entries are only appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CommentThread {
    pub slug: String,
    pub comments: Vec<CommentEntry>,
}

// --- Audit Log ---

/// LogEntry
///
/// One immutable audit record (`logs.json`, newest first).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LogEntry {
    pub id: Uuid,
    pub actor: String,
    pub action: String,
    pub target: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    #[ts(type = "Record<string, unknown>")]
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
}

// --- Request Payloads (Input Schemas) ---

/// Lenient date parsing for request payloads. The admin panels send RFC 3339
/// timestamps, `datetime-local` values (`2024-05-01T09:30`) and plain dates; the
/// latter two are read as UTC. Blank strings mean "not set".
pub mod flexible_date {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, de};

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => parse(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid date format: {raw:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// RegisterRequest
///
/// Self-registration payload (POST /pendingUsers).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub submitted_by: Option<String>,
    #[serde(default)]
    pub document: Option<DocumentRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ApproveUserRequest {
    pub pending_user_id: Uuid,
}

/// CreateUserRequest
///
/// Direct account creation by an admin (POST /users).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub status: Option<UserStatus>,
}

/// UpdateUserRequest
///
/// Partial update payload (PUT /users/{id}). Absent fields are left unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateUserRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<UserStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateDeletionRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub reason: String,
}

/// CreatePostRequest
///
/// Direct publication by an editor or admin (POST /posts). `author` defaults to
/// the caller and `schedule` to now.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreatePostRequest {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub schedule: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdatePostRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_date::deserialize"
    )]
    pub schedule: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateSubmissionRequest {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub schedule: Option<DateTime<Utc>>,
}

/// UpdateSubmissionRequest
///
/// Partial update of a submission (PUT /postSubmissions/{id}). Content fields may be
/// edited by the owning author while pending; `status` and `editorComments` are
/// reviewer-only.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateSubmissionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_date::deserialize"
    )]
    pub schedule: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SubmissionStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub editor_comments: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateAdRequest {
    #[serde(rename = "type")]
    pub kind: AdKind,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub html: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub file: String,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateAdRequest {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<AdKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_date::deserialize"
    )]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "flexible_date::deserialize"
    )]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateCommentRequest {
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default, deserialize_with = "flexible_date::deserialize")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Headline {
    pub text: String,
}

// --- Output Schemas ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AvailabilityResponse {
    pub available: bool,
}

/// SubmissionUpdateResponse
///
/// Result of PUT /postSubmissions/{id}: `post` is set when the update approved the
/// submission, `submission` otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SubmissionUpdateResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<PostSubmission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
}
