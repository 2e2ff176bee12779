// Login evaluation endpoint

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::error;

use crate::policy::EvictionMethod;
use crate::session::LimiterError;
use crate::session::types::{DenyReason, SessionRecord, Verdict};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct EvaluateLoginRequest {
    pub account_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub remote_ip: String,
    #[serde(default)]
    pub user_agent: String,
    /// "Remember me" logins get the longer cookie lifetime
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Serialize)]
pub struct EvaluateLoginResponse {
    #[serde(flatten)]
    pub verdict: Verdict,
    /// Token of the newly admitted session
    pub token: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Evaluate a login attempt and, when admitted, commit the new session.
///
/// The identity system calls this after authenticating credentials and
/// before issuing its cookie; the returned token identifies the committed
/// session record.
pub async fn evaluate_login(
    State(state): State<AppState>,
    Json(payload): Json<EvaluateLoginRequest>,
) -> Result<(StatusCode, Json<EvaluateLoginResponse>), (StatusCode, Json<Value>)> {
    if payload.account_id.is_empty() || payload.remote_ip.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "account_id and remote_ip are required"
            })),
        ));
    }

    let verdict = state
        .limiter
        .evaluate_login(
            &payload.account_id,
            &payload.roles,
            &payload.remote_ip,
            &payload.user_agent,
        )
        .await
        .map_err(limiter_error_response)?;

    if let Verdict::Deny { reason } = &verdict {
        return Err(deny_response(reason));
    }

    // Admitted: commit the record so the map the limiter just judged
    // reflects this login for the next attempt
    let policy = state
        .resolve_policy(&payload.roles)
        .await
        .map_err(|e| limiter_error_response(LimiterError::Store(e)))?;

    let (ttl_hours, idle_hours) = match &policy {
        Some(p) => (
            if payload.remember {
                p.cookie_remember_ttl_hours
            } else {
                p.cookie_ttl_hours
            },
            p.idle_timeout_hours,
        ),
        None => (
            if payload.remember {
                state.defaults.cookie_remember_ttl_hours
            } else {
                state.defaults.cookie_ttl_hours
            },
            state.defaults.idle_timeout_hours,
        ),
    };

    let record = SessionRecord::admit(
        &payload.account_id,
        &payload.remote_ip,
        &payload.user_agent,
        ttl_hours,
        idle_hours,
    );
    let token = record.token.clone();
    let expires_at = record.standard_expiry_at;

    let mut sessions = state
        .sessions
        .get_sessions(&payload.account_id)
        .await
        .map_err(|e| limiter_error_response(LimiterError::Store(e)))?;
    sessions.insert(record.token.clone(), record);
    state
        .sessions
        .set_sessions(&payload.account_id, sessions)
        .await
        .map_err(|e| limiter_error_response(LimiterError::Store(e)))?;

    state.counters.logins.record_succeeded();

    Ok((
        StatusCode::OK,
        Json(EvaluateLoginResponse {
            verdict,
            token,
            expires_at,
        }),
    ))
}

fn deny_response(reason: &DenyReason) -> (StatusCode, Json<Value>) {
    let status = match reason {
        DenyReason::ConcurrencyLimitDenied {
            method: EvictionMethod::BlockGeneric,
        } => StatusCode::BAD_REQUEST,
        _ => StatusCode::FORBIDDEN,
    };
    (
        status,
        Json(json!({
            "error": reason.code(),
            "message": reason.message()
        })),
    )
}

fn limiter_error_response(e: LimiterError) -> (StatusCode, Json<Value>) {
    error!("Login evaluation failed: {}", e);
    let status = match e {
        LimiterError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        LimiterError::ClassifierUnavailable { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "error": "evaluation_failed",
            "message": "Unable to evaluate the login attempt"
        })),
    )
}
