// Per-account session listing, bulk termination and activity touch

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use crate::session::types::SessionRecord;
use crate::store::{SessionMap, StoreError};

use super::AppState;

/// All current sessions for one account, most recent login first
pub async fn list_sessions(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<Vec<SessionRecord>>, (StatusCode, Json<Value>)> {
    let sessions = state
        .sessions
        .get_sessions(&account_id)
        .await
        .map_err(store_error_response)?;

    let mut records: Vec<SessionRecord> = sessions.into_values().collect();
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    Ok(Json(records))
}

/// Remove every session the account holds (admin bulk termination)
pub async fn destroy_sessions(
    State(state): State<AppState>,
    Path(account_id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let sessions = state
        .sessions
        .get_sessions(&account_id)
        .await
        .map_err(store_error_response)?;
    let destroyed = sessions.len();

    state
        .sessions
        .set_sessions(&account_id, SessionMap::new())
        .await
        .map_err(store_error_response)?;

    info!("Destroyed {} session(s) for account {}", destroyed, account_id);

    Ok(Json(json!({ "destroyed": destroyed })))
}

#[derive(Debug, Deserialize)]
pub struct TouchSessionRequest {
    pub account_id: String,
    pub token: String,
    pub remote_ip: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Refresh a session's idle clock and source address on observed activity
pub async fn touch_session(
    State(state): State<AppState>,
    Json(payload): Json<TouchSessionRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let idle_hours = match state
        .resolve_policy(&payload.roles)
        .await
        .map_err(store_error_response)?
    {
        Some(policy) => policy.idle_timeout_hours,
        None => state.defaults.idle_timeout_hours,
    };

    let mut sessions = state
        .sessions
        .get_sessions(&payload.account_id)
        .await
        .map_err(store_error_response)?;

    let Some(record) = sessions.get_mut(&payload.token) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "session_not_found",
                "message": "No such session for this account"
            })),
        ));
    };

    record.touch(&payload.remote_ip, idle_hours);
    let idle_expiry_at = record.idle_expiry_at;

    state
        .sessions
        .set_sessions(&payload.account_id, sessions)
        .await
        .map_err(store_error_response)?;

    Ok(Json(json!({
        "status": "touched",
        "idle_expiry_at": idle_expiry_at
    })))
}

fn store_error_response(e: StoreError) -> (StatusCode, Json<Value>) {
    error!("Session store call failed: {}", e);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(json!({
            "error": "store_unavailable",
            "message": "Session store is unavailable"
        })),
    )
}
