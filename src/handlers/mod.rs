// HTTP boundary for the surrounding identity system
// Thin glue: verdicts, lifecycle notifications, session listing, reporting

pub mod events;
pub mod health;
pub mod login;
pub mod sessions;
pub mod stats;

use std::sync::Arc;

use crate::config::SessionDefaults;
use crate::counters::EventCounters;
use crate::policy::{PolicyStore, RolePolicy};
use crate::session::{SessionLimiter, SessionSweeper};
use crate::store::{SessionStore, StoreError};

/// Shared state handed to every route
#[derive(Clone)]
pub struct AppState {
    pub limiter: Arc<SessionLimiter>,
    pub sweeper: Arc<SessionSweeper>,
    pub sessions: Arc<dyn SessionStore>,
    pub policies: Arc<dyn PolicyStore>,
    pub counters: Arc<EventCounters>,
    pub defaults: SessionDefaults,
}

impl AppState {
    /// First role with a configured policy, in the caller's role order -
    /// the same resolution the limiter applies
    pub async fn resolve_policy(&self, roles: &[String]) -> Result<Option<RolePolicy>, StoreError> {
        for role in roles {
            if let Some(policy) = self.policies.role_policy(role).await? {
                return Ok(Some(policy));
            }
        }
        Ok(None)
    }
}
