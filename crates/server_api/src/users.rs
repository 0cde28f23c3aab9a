use shared::{
    domain::{User, UserId},
    error::{ApiError, ErrorCode},
};
use tracing::info;

use crate::{audit, auth::hash_password_async, internal, ApiContext};

pub async fn list_users(ctx: &ApiContext) -> Result<Vec<User>, ApiError> {
    ctx.storage.list_users().await.map_err(internal)
}

/// With a password the whole account is written (create or reset); without
/// one only name, role and the active flag change.
pub async fn save_user(
    ctx: &ApiContext,
    actor: Option<&User>,
    mut user: User,
    password: Option<&str>,
) -> Result<User, ApiError> {
    user.username = user.username.trim().to_string();
    user.name = user.name.trim().to_string();
    if user.username.is_empty() || user.name.is_empty() {
        return Err(ApiError::validation("name and username are required"));
    }
    if user.id.is_blank() {
        user.id = UserId::generate();
    }

    match password.filter(|p| !p.is_empty()) {
        Some(password) => {
            let taken = ctx
                .storage
                .username_taken(&user.username, &user.id)
                .await
                .map_err(internal)?;
            if taken {
                return Err(ApiError::new(
                    ErrorCode::Conflict,
                    format!("username {} is already in use", user.username),
                ));
            }
            let hash = hash_password_async(password, ctx.settings.bcrypt_cost).await?;
            ctx.storage.upsert_user(&user, &hash).await.map_err(internal)?;
        }
        None => {
            let updated = ctx.storage.update_user_profile(&user).await.map_err(internal)?;
            if !updated {
                return Err(ApiError::not_found(
                    "user not found; a password is required for new accounts",
                ));
            }
        }
    }

    audit::record(
        ctx,
        actor,
        "save_user",
        format!(
            "saved user {} ({}, {}, active={})",
            user.id,
            user.username,
            user.role.as_str(),
            user.is_active
        ),
    )
    .await?;
    info!(user_id = %user.id, "user saved");
    Ok(user)
}

pub async fn delete_user(ctx: &ApiContext, actor: Option<&User>, user_id: &UserId) -> Result<(), ApiError> {
    if actor.is_some_and(|a| &a.id == user_id) {
        return Err(ApiError::validation("you cannot delete your own account"));
    }
    let deleted = ctx.storage.delete_user(user_id).await.map_err(internal)?;
    if !deleted {
        return Err(ApiError::not_found(format!("user {user_id} not found")));
    }
    audit::record(ctx, actor, "delete_user", format!("deleted user {user_id}")).await?;
    Ok(())
}
