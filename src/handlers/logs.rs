use axum::{Json, extract::State};

use super::{ApiQuery, gate};
use crate::{
    AppState,
    audit::LogQuery,
    auth::{Capability, RequestContext},
    error::{AppResult, ErrorBody},
    models::{LogEntry, MessageResponse},
};

/// get_logs
///
/// [Admin Route] Audit entries, newest first, optionally filtered.
#[utoipa::path(
    get,
    path = "/logs",
    params(LogQuery),
    responses(
        (status = 200, description = "Audit entries", body = [LogEntry]),
        (status = 403, description = "Admins only", body = ErrorBody)
    )
)]
pub async fn get_logs(
    State(state): State<AppState>,
    ctx: RequestContext,
    ApiQuery(query): ApiQuery<LogQuery>,
) -> AppResult<Json<Vec<LogEntry>>> {
    gate(&state, &ctx, Capability::ReadLogs).await?;
    Ok(Json(state.audit.query(&query).await?))
}

/// clear_logs
///
/// [Admin Route] Empties the audit log. The clearing itself is the first entry of
/// the new log.
#[utoipa::path(
    delete,
    path = "/logs",
    responses(
        (status = 200, description = "Logs cleared", body = MessageResponse),
        (status = 403, description = "Admins only", body = ErrorBody)
    )
)]
pub async fn clear_logs(State(state): State<AppState>, ctx: RequestContext) -> AppResult<Json<MessageResponse>> {
    gate(&state, &ctx, Capability::ClearLogs).await?;
    let removed = state.audit.clear(&ctx).await?;
    Ok(Json(MessageResponse::new(format!("Cleared {removed} log entries"))))
}
