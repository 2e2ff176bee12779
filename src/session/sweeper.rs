// Background reclamation of idle and expired sessions
// Pages through the whole account population as a ring, one bounded batch
// per run, guarded by a self-expiring advisory lock

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::counters::EventCounters;
use crate::store::{AccountSessions, SessionStore, StoreError, SweepStateStore};

// Well-known state keys, kept apart from per-account session data
const LAST_RUN_KEY: &str = "session_sweep.last_run_at";
const RUN_LOCK_KEY: &str = "session_sweep.run_lock_started_at";
const CURSOR_KEY: &str = "session_sweep.cursor";

/// Sweeper tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    /// Minimum seconds between two real sweep passes
    pub cycle_interval_secs: u64,
    /// Maximum accounts processed per pass
    pub batch_limit: usize,
    /// Age after which a run lock counts as abandoned and may be overtaken
    pub lock_stale_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: 3600,
            batch_limit: 50,
            lock_stale_secs: 300,
        }
    }
}

/// What a `maybe_run_sweep` call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Another run holds a fresh lock
    LockHeld,
    /// The cycle interval since the last completed run has not elapsed
    NotDue,
    /// A pass ran over one page of accounts
    Swept(SweepReport),
}

/// Result of one sweep pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub accounts_scanned: usize,
    pub accounts_failed: usize,
    pub idle_terminated: u64,
    pub expired_terminated: u64,
    /// True when the pass reached the end of the population and the cursor
    /// wrapped back to the start
    pub wrapped: bool,
}

/// The background expiry sweeper
///
/// `maybe_run_sweep` is idempotent and cheap to call unconditionally; the
/// last-run stamp and the run lock make extra calls no-ops. The lock is
/// advisory and self-expiring - an abandoned lock from a crashed run is
/// overtaken rather than requiring cleanup.
pub struct SessionSweeper {
    sessions: Arc<dyn SessionStore>,
    state: Arc<dyn SweepStateStore>,
    counters: Arc<EventCounters>,
    config: SweepConfig,
}

impl SessionSweeper {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        state: Arc<dyn SweepStateStore>,
        counters: Arc<EventCounters>,
        config: SweepConfig,
    ) -> Self {
        Self {
            sessions,
            state,
            counters,
            config,
        }
    }

    /// Run one sweep pass if one is due and nothing else is sweeping.
    ///
    /// A failed pass still releases the lock and still advances the
    /// last-run stamp: a permanently stuck sweep is worse than a skipped
    /// cycle.
    pub async fn maybe_run_sweep(&self) -> Result<SweepOutcome, StoreError> {
        let now = Utc::now();

        if let Some(lock_started) = self.read_time(RUN_LOCK_KEY).await? {
            if now < lock_started + Duration::seconds(self.config.lock_stale_secs as i64) {
                return Ok(SweepOutcome::LockHeld);
            }
            warn!(
                "Overtaking sweep lock abandoned at {} (older than {}s)",
                lock_started, self.config.lock_stale_secs
            );
        }

        if let Some(last_run) = self.read_time(LAST_RUN_KEY).await? {
            if now < last_run + Duration::seconds(self.config.cycle_interval_secs as i64) {
                return Ok(SweepOutcome::NotDue);
            }
        }

        self.state.put(RUN_LOCK_KEY, &now.to_rfc3339()).await?;

        let result = self.sweep_page(now).await;

        if let Err(e) = self.state.delete(RUN_LOCK_KEY).await {
            error!("Failed to release sweep lock: {}", e);
        }
        if let Err(e) = self.state.put(LAST_RUN_KEY, &Utc::now().to_rfc3339()).await {
            error!("Failed to stamp sweep completion: {}", e);
        }

        match result {
            Ok(report) => {
                info!(
                    "Sweep pass: {} accounts scanned, {} idle-terminated, {} expired-terminated, {} failed{}",
                    report.accounts_scanned,
                    report.idle_terminated,
                    report.expired_terminated,
                    report.accounts_failed,
                    if report.wrapped { ", cursor wrapped" } else { "" }
                );
                Ok(SweepOutcome::Swept(report))
            }
            Err(e) => {
                error!("Sweep pass failed: {}", e);
                Err(e)
            }
        }
    }

    async fn sweep_page(&self, now: DateTime<Utc>) -> Result<SweepReport, StoreError> {
        let cursor = self.read_cursor().await?;
        let (page, next_cursor) = self
            .sessions
            .scan_all(cursor, self.config.batch_limit)
            .await?;

        let mut report = SweepReport {
            accounts_scanned: page.len(),
            ..SweepReport::default()
        };

        for account in &page {
            match self.sweep_account(account, now).await {
                Ok((idle, expired)) => {
                    report.idle_terminated += idle;
                    report.expired_terminated += expired;
                }
                Err(e) => {
                    // One broken account never aborts the rest of the page
                    report.accounts_failed += 1;
                    warn!("Sweep skipped account {}: {}", account.account_id, e);
                }
            }
        }

        // The population is scanned as a ring: a short page means the end
        // was reached, so the next pass starts over
        report.wrapped = page.len() < self.config.batch_limit;
        let new_cursor = if report.wrapped { 0 } else { next_cursor };
        self.state.put(CURSOR_KEY, &new_cursor.to_string()).await?;

        Ok(report)
    }

    /// Remove this account's lapsed sessions; idle expiry is checked before
    /// standard expiry, so a session past both counts as idle-terminated
    async fn sweep_account(
        &self,
        account: &AccountSessions,
        now: DateTime<Utc>,
    ) -> Result<(u64, u64), StoreError> {
        let mut idle_tokens = Vec::new();
        let mut expired_tokens = Vec::new();

        for (token, session) in &account.sessions {
            if session.is_idle_expired(now) {
                idle_tokens.push(token.clone());
            } else if session.is_standard_expired(now) {
                expired_tokens.push(token.clone());
            }
        }

        if idle_tokens.is_empty() && expired_tokens.is_empty() {
            return Ok((0, 0));
        }

        let mut reduced = account.sessions.clone();
        for token in idle_tokens.iter().chain(&expired_tokens) {
            reduced.remove(token);
        }
        self.sessions
            .set_sessions(&account.account_id, reduced)
            .await?;

        // Events only after the reduced map is persisted
        for token in &idle_tokens {
            debug!(
                "Idle-terminated session {} of account {}",
                token, account.account_id
            );
        }
        for token in &expired_tokens {
            debug!(
                "Expired-terminated session {} of account {}",
                token, account.account_id
            );
        }
        self.counters
            .sessions
            .record_idle_terminated(idle_tokens.len() as u64);
        self.counters
            .sessions
            .record_expired_terminated(expired_tokens.len() as u64);

        Ok((idle_tokens.len() as u64, expired_tokens.len() as u64))
    }

    /// Corrupt state entries self-heal to "absent" rather than wedging the
    /// sweeper
    async fn read_time(&self, key: &str) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.state.get(key).await? else {
            return Ok(None);
        };
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(t) => Ok(Some(t.with_timezone(&Utc))),
            Err(_) => {
                warn!("Discarding unparseable sweep state '{}': {}", key, raw);
                Ok(None)
            }
        }
    }

    async fn read_cursor(&self) -> Result<u64, StoreError> {
        let Some(raw) = self.state.get(CURSOR_KEY).await? else {
            return Ok(0);
        };
        match raw.parse::<u64>() {
            Ok(c) => Ok(c),
            Err(_) => {
                warn!("Discarding unparseable sweep cursor: {}", raw);
                Ok(0)
            }
        }
    }
}
