// In-process lifecycle event counters
// Best-effort tallies for the lifetime of one process, consumed by reporting

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Login outcome tallies
#[derive(Debug, Default)]
pub struct LoginCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
    blocked: AtomicU64,
}

impl LoginCounters {
    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked(&self) {
        self.blocked.fetch_add(1, Ordering::Relaxed);
    }
}

/// Session termination tallies, split by cause
#[derive(Debug, Default)]
pub struct SessionCounters {
    idle_terminated: AtomicU64,
    expired_terminated: AtomicU64,
    forced_terminated: AtomicU64,
}

impl SessionCounters {
    pub fn record_idle_terminated(&self, count: u64) {
        self.idle_terminated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_expired_terminated(&self, count: u64) {
        self.expired_terminated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_forced_terminated(&self) {
        self.forced_terminated.fetch_add(1, Ordering::Relaxed);
    }
}

/// Account lifecycle tallies fed by external notifications
#[derive(Debug, Default)]
pub struct AccountCounters {
    registered: AtomicU64,
    deleted: AtomicU64,
    password_reset: AtomicU64,
}

impl AccountCounters {
    pub fn record_registered(&self) {
        self.registered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_deleted(&self) {
        self.deleted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_password_reset(&self) {
        self.password_reset.fetch_add(1, Ordering::Relaxed);
    }
}

/// Central event counters object
///
/// Constructed once at startup and passed into the limiter, the sweeper and
/// the lifecycle hooks by `Arc` - there is deliberately no global instance.
/// Counts reset with the process; persistence is a reporting concern.
#[derive(Debug, Default)]
pub struct EventCounters {
    pub logins: LoginCounters,
    pub sessions: SessionCounters,
    pub accounts: AccountCounters,
    logouts: AtomicU64,
}

impl EventCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_logout(&self) {
        self.logouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all tallies for reporting
    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            logins_succeeded: self.logins.succeeded.load(Ordering::Relaxed),
            logins_failed: self.logins.failed.load(Ordering::Relaxed),
            logins_blocked: self.logins.blocked.load(Ordering::Relaxed),
            logouts: self.logouts.load(Ordering::Relaxed),
            sessions_idle_terminated: self.sessions.idle_terminated.load(Ordering::Relaxed),
            sessions_expired_terminated: self.sessions.expired_terminated.load(Ordering::Relaxed),
            sessions_forced_terminated: self.sessions.forced_terminated.load(Ordering::Relaxed),
            accounts_registered: self.accounts.registered.load(Ordering::Relaxed),
            accounts_deleted: self.accounts.deleted.load(Ordering::Relaxed),
            password_resets: self.accounts.password_reset.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of all counters
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub logins_succeeded: u64,
    pub logins_failed: u64,
    pub logins_blocked: u64,
    pub logouts: u64,
    pub sessions_idle_terminated: u64,
    pub sessions_expired_terminated: u64,
    pub sessions_forced_terminated: u64,
    pub accounts_registered: u64,
    pub accounts_deleted: u64,
    pub password_resets: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = EventCounters::new();
        let snap = counters.snapshot();
        assert_eq!(snap.logins_succeeded, 0);
        assert_eq!(snap.sessions_forced_terminated, 0);
    }

    #[test]
    fn test_increments_are_visible_in_snapshot() {
        let counters = EventCounters::new();
        counters.logins.record_succeeded();
        counters.logins.record_succeeded();
        counters.logins.record_blocked();
        counters.sessions.record_idle_terminated(3);
        counters.sessions.record_forced_terminated();
        counters.accounts.record_registered();
        counters.record_logout();

        let snap = counters.snapshot();
        assert_eq!(snap.logins_succeeded, 2);
        assert_eq!(snap.logins_blocked, 1);
        assert_eq!(snap.sessions_idle_terminated, 3);
        assert_eq!(snap.sessions_forced_terminated, 1);
        assert_eq!(snap.accounts_registered, 1);
        assert_eq!(snap.logouts, 1);
    }

    #[test]
    fn test_shared_across_threads() {
        use std::sync::Arc;

        let counters = Arc::new(EventCounters::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let c = Arc::clone(&counters);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    c.logins.record_failed();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(counters.snapshot().logins_failed, 400);
    }
}
