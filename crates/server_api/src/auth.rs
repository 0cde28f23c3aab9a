use shared::{
    domain::User,
    error::{ApiError, ErrorCode},
    protocol::{ActionRequest, LoginResponse},
};
use tracing::{info, warn};

use crate::{audit, internal, session, ApiContext};

/// Who may run an action once a session is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Reader,
    Editor,
    Admin,
}

pub fn required_access(request: &ActionRequest) -> Access {
    match request {
        ActionRequest::Login { .. } => Access::Public,
        ActionRequest::GetCandidates { .. }
        | ActionRequest::GetCandidate { .. }
        | ActionRequest::GetBatches
        | ActionRequest::GetBatchOccupancy
        | ActionRequest::GetDashboard { .. } => Access::Reader,
        ActionRequest::SaveCandidate { .. } | ActionRequest::RecordPayment { .. } => Access::Editor,
        ActionRequest::SaveBatch { .. }
        | ActionRequest::DeleteBatch { .. }
        | ActionRequest::GetUsers
        | ActionRequest::SaveUser { .. }
        | ActionRequest::DeleteUser { .. }
        | ActionRequest::GetAuditLogs { .. } => Access::Admin,
    }
}

/// `None` is only reachable with session checks disabled and lets everything through.
pub fn authorize(actor: Option<&User>, access: Access) -> Result<(), ApiError> {
    let Some(actor) = actor else {
        return Ok(());
    };
    let allowed = match access {
        Access::Public | Access::Reader => true,
        Access::Editor => actor.role.can_edit_candidates(),
        Access::Admin => actor.role.is_admin(),
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::forbidden(format!(
            "role {} is not allowed to perform this action",
            actor.role.as_str()
        )))
    }
}

/// Resolves the caller from a bearer token. The stored user is authoritative
/// so deactivation and role changes apply to live sessions.
pub async fn resolve_actor(ctx: &ApiContext, bearer: Option<&str>) -> Result<Option<User>, ApiError> {
    let token = bearer.map(str::trim).filter(|t| !t.is_empty());
    let Some(token) = token else {
        if ctx.settings.require_session {
            return Err(ApiError::new(ErrorCode::Unauthorized, "missing session token"));
        }
        return Ok(None);
    };

    let claims = session::verify_session(&ctx.sessions, token)
        .map_err(|_| ApiError::new(ErrorCode::Unauthorized, "invalid or expired session"))?;
    let user = ctx
        .storage
        .get_user(&claims.user_id())
        .await
        .map_err(internal)?
        .filter(|user| user.is_active)
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "session user is inactive or removed"))?;
    Ok(Some(user))
}

pub fn hash_password(password: &str, cost: u32) -> Result<String, ApiError> {
    bcrypt::hash(password, cost).map_err(|e| ApiError::new(ErrorCode::Internal, format!("password hashing failed: {e}")))
}

/// `hash_password` on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_password_async(password: &str, cost: u32) -> Result<String, ApiError> {
    let password = password.to_owned();
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("password hashing task failed: {e}")))?
}

async fn verify_password(password: &str, hash: &str) -> bool {
    let (password, hash) = (password.to_owned(), hash.to_owned());
    match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash)).await {
        Ok(Ok(matches)) => matches,
        Ok(Err(error)) => {
            warn!(%error, "stored password hash is unreadable");
            false
        }
        Err(error) => {
            warn!(%error, "password check task failed");
            false
        }
    }
}

pub async fn login(ctx: &ApiContext, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
    let credentials = ctx
        .storage
        .find_credentials(username.trim())
        .await
        .map_err(internal)?
        .filter(|creds| creds.user.is_active);
    let credentials = match credentials {
        Some(creds) => verify_password(password, &creds.password_hash).await.then_some(creds),
        None => None,
    };

    let Some(credentials) = credentials else {
        warn!(username, "rejected login");
        return Err(ApiError::new(ErrorCode::Unauthorized, "Invalid credentials"));
    };

    let user = credentials.user;
    let token = session::mint_session(&ctx.sessions, &user)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("session mint failed: {e}")))?;
    audit::record(ctx, Some(&user), "login", format!("{} signed in", user.username)).await?;
    info!(user_id = %user.id, role = user.role.as_str(), "login");

    Ok(LoginResponse {
        status: "success".into(),
        user,
        token: Some(token),
    })
}
