// Counter reporting and manual sweep trigger

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::error;

use crate::counters::CountersSnapshot;
use crate::session::SweepOutcome;

use super::AppState;

/// Point-in-time event counter snapshot
pub async fn stats(State(state): State<AppState>) -> Json<CountersSnapshot> {
    Json(state.counters.snapshot())
}

/// Opportunistic sweep trigger.
///
/// Safe to call at any frequency: the sweeper itself decides whether a
/// pass is actually due.
pub async fn run_sweep(
    State(state): State<AppState>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match state.sweeper.maybe_run_sweep().await {
        Ok(SweepOutcome::Swept(report)) => Ok(Json(json!({
            "outcome": "swept",
            "accounts_scanned": report.accounts_scanned,
            "accounts_failed": report.accounts_failed,
            "idle_terminated": report.idle_terminated,
            "expired_terminated": report.expired_terminated,
            "wrapped": report.wrapped
        }))),
        Ok(SweepOutcome::LockHeld) => Ok(Json(json!({ "outcome": "lock_held" }))),
        Ok(SweepOutcome::NotDue) => Ok(Json(json!({ "outcome": "not_due" }))),
        Err(e) => {
            error!("Manual sweep trigger failed: {}", e);
            Err((
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "sweep_failed",
                    "message": "Sweep pass could not be completed"
                })),
            ))
        }
    }
}
