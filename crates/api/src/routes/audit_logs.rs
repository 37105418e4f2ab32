//! Audit log routes.

use axum::{
    extract::{Query, State},
    Json,
};
use domain::models::audit_log::ListAuditLogsQuery;
use domain::models::{AuditLogEntry, Page, PageRequest};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::AdminAuth;

/// GET /admin/audit-logs?target_type&target_id&action&limit&cursor
///
/// Newest first, keyset paginated.
pub async fn list_audit_logs(
    State(state): State<AppState>,
    _admin: AdminAuth,
    Query(query): Query<ListAuditLogsQuery>,
) -> Result<Json<Page<AuditLogEntry>>, ApiError> {
    let page = PageRequest::from_query(query.limit, query.cursor.as_deref())?;
    let entries = state.services.audit.list(&query.filter(), &page).await?;
    Ok(Json(entries))
}
