use shared::{
    domain::{now_millis, AuditLog, AuditLogId, User, UserId},
    error::ApiError,
};

use crate::{internal, ApiContext};

pub const DEFAULT_AUDIT_LIMIT: u32 = 200;
pub const MAX_AUDIT_LIMIT: u32 = 1000;

pub async fn record(
    ctx: &ApiContext,
    actor: Option<&User>,
    action: &str,
    details: impl Into<String>,
) -> Result<(), ApiError> {
    let (user_id, user_name) = match actor {
        Some(user) => (user.id.clone(), user.name.clone()),
        None => (UserId::from("system"), "System".to_string()),
    };
    let log = AuditLog {
        id: AuditLogId::generate(),
        timestamp: now_millis(),
        action: action.to_string(),
        user_id,
        user_name,
        details: details.into(),
    };
    ctx.storage.insert_audit_log(&log).await.map_err(internal)
}

pub async fn list(ctx: &ApiContext, limit: Option<u32>) -> Result<Vec<AuditLog>, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, MAX_AUDIT_LIMIT);
    ctx.storage.list_audit_logs(limit).await.map_err(internal)
}
