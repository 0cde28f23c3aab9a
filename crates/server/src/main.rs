use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use server_api::{dispatch, parse_request, session::SessionConfig, ApiContext, ApiSettings};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::ApiStatus,
};
use storage::Storage;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod app_state;
mod config;

use app_state::AppState;
use config::{load_settings, prepare_database_url};

/// Candidate screenshots travel inline as base64.
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    if storage.count_users().await? == 0 {
        warn!("no users exist yet; bootstrap one with `tools create-user`");
    }

    let secret = if settings.session_secret.trim().is_empty() {
        warn!("session_secret is not configured; sessions will not survive a restart");
        uuid::Uuid::new_v4().to_string()
    } else {
        settings.session_secret.clone()
    };
    if !settings.require_session {
        warn!("require_session is disabled; every action runs without authentication");
    }

    let api = ApiContext {
        storage,
        settings: ApiSettings {
            total_fees: settings.total_fees,
            require_session: settings.require_session,
            ..ApiSettings::default()
        },
        sessions: SessionConfig {
            secret,
            ttl_seconds: settings.session_ttl_seconds,
        },
    };

    let app = build_router(Arc::new(AppState { api }), settings.static_root());

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, total_fees = settings.total_fees, "admissions server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, static_root: Option<PathBuf>) -> Router {
    let router = Router::new()
        .route("/healthz", get(healthz))
        .route("/api-status", get(api_status))
        .route("/api-v1", post(handle_action))
        .route("/admission-api", post(handle_action))
        .with_state(state);

    let router = match static_root.filter(|root| root.is_dir()) {
        Some(root) => {
            let index = root.join("index.html");
            router.fallback_service(ServeDir::new(root).fallback(ServeFile::new(index)))
        }
        None => router.fallback(build_not_found),
    };

    router
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str {
    "ok"
}

async fn build_not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Build not found")
}

async fn api_status(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ApiStatus>) {
    let storage = &state.api.storage;
    if let Err(error) = storage.health_check().await {
        error!(%error, "database health check failed");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiStatus {
                status: "error".into(),
                database: "disconnected".into(),
                schema: None,
                time: None,
                error: Some(error.to_string()),
            }),
        );
    }

    let schema = match storage.schema_ready().await {
        Ok(true) => "ready",
        Ok(false) => "missing_tables",
        Err(error) => {
            warn!(%error, "schema check failed");
            "missing_tables"
        }
    };
    (
        StatusCode::OK,
        Json(ApiStatus {
            status: "active".into(),
            database: "connected".into(),
            schema: Some(schema.into()),
            time: Some(Utc::now().to_rfc3339()),
            error: None,
        }),
    )
}

async fn handle_action(State(state): State<Arc<AppState>>, headers: HeaderMap, body: Bytes) -> Response {
    let bearer = bearer_token(&headers);
    let result = match serde_json::from_slice(&body) {
        Ok(value) => match parse_request(value) {
            Ok(request) => dispatch(&state.api, bearer, request).await,
            Err(err) => Err(err),
        },
        Err(err) => Err(ApiError::validation(format!("invalid JSON body: {err}"))),
    };

    match result {
        Ok(value) => (StatusCode::OK, Json(value)).into_response(),
        Err(err) => {
            if err.code == ErrorCode::Internal {
                error!(error = %err.message, "action failed");
            }
            (status_for(err.code), Json(err)).into_response()
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
