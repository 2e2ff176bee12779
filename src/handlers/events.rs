// Lifecycle notification hooks feeding the event counters
// Fired by the surrounding identity system; best-effort by design

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct LogoutEvent {
    /// When both are present the session record is removed as well
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

pub async fn logout(
    State(state): State<AppState>,
    Json(payload): Json<LogoutEvent>,
) -> (StatusCode, Json<Value>) {
    state.counters.record_logout();

    if let (Some(account_id), Some(token)) = (&payload.account_id, &payload.token) {
        match state.sessions.get_sessions(account_id).await {
            Ok(mut sessions) => {
                if sessions.remove(token).is_some()
                    && let Err(e) = state.sessions.set_sessions(account_id, sessions).await
                {
                    warn!("Failed to remove logged-out session {}: {}", token, e);
                }
            }
            Err(e) => warn!("Failed to load sessions for logout of {}: {}", account_id, e),
        }
    }

    recorded()
}

#[derive(Debug, Deserialize)]
pub struct LoginFailedEvent {
    pub identifier: String,
}

pub async fn login_failed(
    State(state): State<AppState>,
    Json(payload): Json<LoginFailedEvent>,
) -> (StatusCode, Json<Value>) {
    debug!("Failed login attempt for identifier {}", payload.identifier);
    state.counters.logins.record_failed();
    recorded()
}

#[derive(Debug, Deserialize)]
pub struct LoginBlockedEvent {
    pub remote_ip: String,
}

pub async fn login_blocked(
    State(state): State<AppState>,
    Json(payload): Json<LoginBlockedEvent>,
) -> (StatusCode, Json<Value>) {
    debug!("Blocked login attempt from {}", payload.remote_ip);
    state.counters.logins.record_blocked();
    recorded()
}

pub async fn account_registered(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    state.counters.accounts.record_registered();
    recorded()
}

#[derive(Debug, Deserialize)]
pub struct AccountDeletedEvent {
    /// When present, the account's remaining sessions are destroyed too
    #[serde(default)]
    pub account_id: Option<String>,
}

pub async fn account_deleted(
    State(state): State<AppState>,
    Json(payload): Json<AccountDeletedEvent>,
) -> (StatusCode, Json<Value>) {
    state.counters.accounts.record_deleted();

    if let Some(account_id) = &payload.account_id
        && let Err(e) = state
            .sessions
            .set_sessions(account_id, crate::store::SessionMap::new())
            .await
    {
        warn!("Failed to drop sessions of deleted account {}: {}", account_id, e);
    }

    recorded()
}

pub async fn password_reset(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    state.counters.accounts.record_password_reset();
    recorded()
}

fn recorded() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "recorded" })))
}
