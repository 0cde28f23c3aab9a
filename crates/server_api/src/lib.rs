use serde::Serialize;
use serde_json::Value;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{Ack, ActionRequest, CandidateSaved, KNOWN_ACTIONS},
};
use storage::Storage;
use tracing::debug;

pub mod audit;
pub mod auth;
pub mod batches;
pub mod candidates;
pub mod dashboard;
pub mod session;
pub mod users;

use session::SessionConfig;

#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Course fee every candidate's ledger is reconciled against.
    pub total_fees: i64,
    pub require_session: bool,
    pub bcrypt_cost: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            total_fees: 100_000,
            require_session: true,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub settings: ApiSettings,
    pub sessions: SessionConfig,
}

/// Decodes a raw action body, telling unknown actions apart from malformed payloads.
pub fn parse_request(body: Value) -> Result<ActionRequest, ApiError> {
    let action = match body.get("action") {
        Some(Value::String(action)) => action.clone(),
        _ => return Err(ApiError::validation("missing action")),
    };
    if !KNOWN_ACTIONS.contains(&action.as_str()) {
        return Err(ApiError::validation(format!("Unknown action: {action}")));
    }
    serde_json::from_value(body)
        .map_err(|e| ApiError::validation(format!("invalid {action} payload: {e}")))
}

pub async fn dispatch(ctx: &ApiContext, bearer: Option<&str>, request: ActionRequest) -> Result<Value, ApiError> {
    let access = auth::required_access(&request);
    let actor = match access {
        auth::Access::Public => None,
        _ => auth::resolve_actor(ctx, bearer).await?,
    };
    let actor = actor.as_ref();
    auth::authorize(actor, access)?;
    debug!(action = request.name(), actor = ?actor.map(|a| a.id.as_str()), "dispatch");

    match request {
        ActionRequest::Login { username, password } => to_value(auth::login(ctx, &username, &password).await?),
        ActionRequest::GetCandidates { .. } => {
            let query = request.candidate_query().unwrap_or_default();
            to_value(candidates::list_candidates(ctx, actor, &query).await?)
        }
        ActionRequest::GetCandidate { id } => to_value(candidates::get_candidate(ctx, actor, &id).await?),
        ActionRequest::SaveCandidate { candidate } => {
            let saved = candidates::save_candidate(ctx, actor, candidate).await?;
            to_value(CandidateSaved::new(saved))
        }
        ActionRequest::RecordPayment {
            candidate_id,
            amount,
            utr,
            screenshot,
        } => {
            let saved = candidates::record_payment(ctx, actor, &candidate_id, amount, &utr, screenshot).await?;
            to_value(CandidateSaved::new(saved))
        }
        ActionRequest::GetBatches => to_value(batches::list_batches(ctx).await?),
        ActionRequest::GetBatchOccupancy => to_value(batches::batch_occupancy(ctx).await?),
        ActionRequest::SaveBatch { batch } => {
            batches::save_batch(ctx, actor, batch).await?;
            to_value(Ack::success())
        }
        ActionRequest::DeleteBatch { id } => {
            batches::delete_batch(ctx, actor, &id).await?;
            to_value(Ack::success())
        }
        ActionRequest::GetUsers => to_value(users::list_users(ctx).await?),
        ActionRequest::SaveUser { user, password } => {
            users::save_user(ctx, actor, user, password.as_deref()).await?;
            to_value(Ack::success())
        }
        ActionRequest::DeleteUser { id } => {
            users::delete_user(ctx, actor, &id).await?;
            to_value(Ack::success())
        }
        ActionRequest::GetAuditLogs { limit } => to_value(audit::list(ctx, limit).await?),
        ActionRequest::GetDashboard { range, start, end } => to_value(
            dashboard::dashboard(ctx, actor, range, start.as_deref(), end.as_deref()).await?,
        ),
    }
}

fn to_value<T: Serialize>(value: T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|e| ApiError::new(ErrorCode::Internal, format!("encode failed: {e}")))
}

pub(crate) fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
