use chrono::Utc;
use serde::Deserialize;
use serde_json::{Map, Value};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::RequestContext,
    error::AppResult,
    models::LogEntry,
    repository::Repository,
    storage::Collection,
};

/// Audit action names, as they appear in the `action` field of a log entry.
pub mod action {
    pub const LOGIN_SUCCESS: &str = "login-success";
    pub const LOGIN_FAILED: &str = "login-failed";
    pub const LOGOUT: &str = "logout";
    pub const LOGIN_REQUIRED: &str = "login-required";
    pub const ACCESS_DENIED: &str = "access-denied";

    pub const HEADLINE_UPDATED: &str = "update-headline";
    pub const HEADLINE_UPDATE_FAILED: &str = "update-headline-failed";

    pub const AD_CREATED: &str = "ad-created";
    pub const AD_CREATE_FAILED: &str = "ad-create-failed";
    pub const AD_UPDATED: &str = "ad-updated";
    pub const AD_UPDATE_FAILED: &str = "ad-update-failed";
    pub const AD_DELETED: &str = "ad-deleted";
    pub const AD_DELETE_FAILED: &str = "ad-delete-failed";
    pub const ADS_EXPIRED: &str = "ads-expired";

    pub const POST_CREATED: &str = "post-created";
    pub const POST_CREATE_FAILED: &str = "post-create-failed";
    pub const POST_UPDATED: &str = "post-updated";
    pub const POST_UPDATE_FAILED: &str = "post-update-failed";
    pub const POST_DELETED: &str = "post-deleted";
    pub const POST_DELETE_FAILED: &str = "post-delete-failed";
    pub const POST_VIEWED: &str = "post-viewed";
    pub const POST_VIEW_FAILED: &str = "post-view-failed";

    pub const POST_SUBMITTED: &str = "post-submitted";
    pub const POST_SUBMIT_FAILED: &str = "post-submit-failed";
    pub const POST_APPROVED: &str = "post-approved";
    pub const POST_REJECTED: &str = "post-rejected";
    pub const SUBMISSION_UPDATED: &str = "submission-updated";
    pub const SUBMISSION_UPDATE_FAILED: &str = "submission-update-failed";
    pub const SUBMISSION_DELETED: &str = "submission-deleted";
    pub const SUBMISSION_DELETE_FAILED: &str = "submission-delete-failed";

    pub const COMMENT_CREATED: &str = "comment-created";
    pub const COMMENT_CREATE_FAILED: &str = "comment-create-failed";

    pub const USER_CREATED: &str = "user-created";
    pub const USER_CREATE_FAILED: &str = "user-create-failed";
    pub const USER_UPDATED: &str = "user-updated";
    pub const USER_UPDATE_FAILED: &str = "user-update-failed";
    pub const USER_DELETED: &str = "user-deleted";
    pub const USER_DELETE_FAILED: &str = "user-delete-failed";

    pub const PENDING_USER_CREATED: &str = "pending-user-created";
    pub const PENDING_USER_CREATE_FAILED: &str = "pending-user-create-failed";
    pub const PENDING_USER_DELETED: &str = "pending-user-deleted";
    pub const PENDING_USER_DELETE_FAILED: &str = "pending-user-delete-failed";
    pub const USER_APPROVED: &str = "user-approved";
    pub const USER_APPROVE_FAILED: &str = "user-approve-failed";

    pub const USER_DELETE_REQUESTED: &str = "user-delete-requested";
    pub const USER_DELETE_REQUEST_FAILED: &str = "user-delete-request-failed";
    pub const USER_DELETE_APPROVED: &str = "user-delete-approved";
    pub const USER_DELETE_APPROVE_FAILED: &str = "user-delete-approve-failed";
    pub const USER_DELETE_REJECTED: &str = "user-delete-rejected";
    pub const USER_DELETE_REJECT_FAILED: &str = "user-delete-reject-failed";
    pub const USER_DELETE_CANCELLED: &str = "user-delete-cancelled";
    pub const USER_DELETE_CANCEL_FAILED: &str = "user-delete-cancel-failed";

    pub const LOGS_CLEARED: &str = "logs-cleared";
    pub const PING: &str = "ping";
    pub const SERVER_STARTED: &str = "server-started";
    pub const ADMIN_BOOTSTRAPPED: &str = "admin-bootstrapped";
}

/// Actor recorded for entries written by the server itself.
pub const SYSTEM_ACTOR: &str = "system";

/// LogQuery
///
/// Query parameters for GET /logs. Filters are case-insensitive substring matches.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct LogQuery {
    pub action: Option<String>,
    pub actor: Option<String>,
    /// Maximum number of entries to return, newest first.
    pub limit: Option<usize>,
}

fn into_details(details: Value) -> Map<String, Value> {
    match details {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// AuditLog
///
/// Append-only record of who did what to what. Writing an entry never fails the
/// operation being recorded: store errors are reported through `tracing` and dropped.
///
/// Only the newest `retention` entries are kept.
#[derive(Clone)]
pub struct AuditLog {
    repo: Repository,
    retention: usize,
}

impl AuditLog {
    pub fn new(repo: Repository, retention: usize) -> Self {
        Self { repo, retention }
    }

    /// Records an action performed on behalf of the request's caller.
    ///
    /// Each entry is its own store commit: the whole `logs.json` is rewritten
    /// and fsynced under the store-wide write lock, so the cost of a record grows
    /// with the retention cap and every logged request briefly serializes writers.
    pub async fn record(&self, ctx: &RequestContext, action: &str, target: impl Into<String>, details: Value) {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            actor: ctx.actor().to_string(),
            action: action.to_string(),
            target: target.into(),
            timestamp: Utc::now(),
            ip: ctx.ip.clone(),
            user_agent: ctx.user_agent.clone(),
            details: into_details(details),
        };
        self.append(entry).await;
    }

    /// Records an action performed by the server itself (jobs, startup).
    pub async fn record_system(&self, action: &str, target: impl Into<String>, details: Value) {
        let entry = LogEntry {
            id: Uuid::new_v4(),
            actor: SYSTEM_ACTOR.to_string(),
            action: action.to_string(),
            target: target.into(),
            timestamp: Utc::now(),
            ip: String::new(),
            user_agent: String::new(),
            details: into_details(details),
        };
        self.append(entry).await;
    }

    async fn append(&self, entry: LogEntry) {
        let action = entry.action.clone();
        let written = self
            .repo
            .transaction(&[Collection::Logs], |tx| {
                tx.prepend(&entry)?;
                tx.truncate::<LogEntry>(self.retention)
            })
            .await;

        match written {
            Ok(0) => {}
            Ok(dropped) => tracing::debug!(dropped, "audit log trimmed to retention cap"),
            Err(e) => tracing::warn!(error = %e, action = %action, "failed to write audit entry"),
        }
    }

    /// query
    ///
    /// Returns entries newest first, filtered by `action`/`actor` substrings and
    /// truncated to `limit`.
    pub async fn query(&self, query: &LogQuery) -> AppResult<Vec<LogEntry>> {
        let entries = self.repo.all::<LogEntry>().await?;
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(entries
            .into_iter()
            .filter(|entry| {
                query
                    .action
                    .as_deref()
                    .is_none_or(|needle| contains_ci(&entry.action, needle))
            })
            .filter(|entry| {
                query
                    .actor
                    .as_deref()
                    .is_none_or(|needle| contains_ci(&entry.actor, needle))
            })
            .take(limit)
            .collect())
    }

    /// clear
    ///
    /// Deletes every entry, then records the clearing itself as the first entry of
    /// the fresh log. Unlike `record`, failures here are returned to the caller.
    pub async fn clear(&self, ctx: &RequestContext) -> AppResult<usize> {
        let actor = ctx.actor().to_string();
        let marker = LogEntry {
            id: Uuid::new_v4(),
            actor: actor.clone(),
            action: action::LOGS_CLEARED.to_string(),
            target: "logs".to_string(),
            timestamp: Utc::now(),
            ip: ctx.ip.clone(),
            user_agent: ctx.user_agent.clone(),
            details: Map::new(),
        };

        let removed = self
            .repo
            .transaction(&[Collection::Logs], |tx| {
                let removed = tx.clear::<LogEntry>()?;
                tx.prepend(&marker)?;
                Ok(removed)
            })
            .await?;

        tracing::info!(actor = %actor, removed, "audit log cleared");
        Ok(removed)
    }
}
