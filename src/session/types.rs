// Session record and login verdict types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ip::normalize_ip;
use crate::policy::EvictionMethod;

/// One active login for one account
///
/// Records are keyed by `token` inside the account's session map; the map
/// owner guarantees token uniqueness. A record with no `standard_expiry_at`
/// never goes stale on its own; one with no `idle_expiry_at` is never
/// idle-evicted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    /// Opaque unique identifier, stable key within the account's map
    pub token: String,
    /// Owning account
    pub account_id: String,
    /// Login timestamp
    pub created_at: DateTime<Utc>,
    /// Absolute staleness deadline set from cookie TTL policy
    pub standard_expiry_at: Option<DateTime<Utc>>,
    /// Idle deadline, refreshed by observed activity
    pub idle_expiry_at: Option<DateTime<Utc>>,
    /// Normalized (expanded) source address
    pub remote_ip: String,
    /// Raw client user-agent, possibly empty
    pub user_agent: String,
}

impl SessionRecord {
    /// Create a record for an admitted login.
    ///
    /// `cookie_ttl_hours` sets the standard expiry; `idle_timeout_hours` of
    /// 0 disables idle tracking for this session.
    pub fn admit(
        account_id: &str,
        remote_ip: &str,
        user_agent: &str,
        cookie_ttl_hours: u32,
        idle_timeout_hours: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            created_at: now,
            standard_expiry_at: Some(now + Duration::hours(cookie_ttl_hours as i64)),
            idle_expiry_at: (idle_timeout_hours > 0)
                .then(|| now + Duration::hours(idle_timeout_hours as i64)),
            remote_ip: normalize_ip(remote_ip),
            user_agent: user_agent.to_string(),
        }
    }

    /// Refresh the idle clock and source address on observed activity.
    ///
    /// This is the only mutation performed on a live record; a zero idle
    /// timeout leaves the idle clock untouched.
    pub fn touch(&mut self, remote_ip: &str, idle_timeout_hours: u32) {
        self.remote_ip = normalize_ip(remote_ip);
        if idle_timeout_hours > 0 {
            self.idle_expiry_at = Some(Utc::now() + Duration::hours(idle_timeout_hours as i64));
        }
    }

    pub fn is_idle_expired(&self, now: DateTime<Utc>) -> bool {
        self.idle_expiry_at.is_some_and(|at| at <= now)
    }

    pub fn is_standard_expired(&self, now: DateTime<Utc>) -> bool {
        self.standard_expiry_at.is_some_and(|at| at <= now)
    }
}

/// Why a login attempt was refused
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenyReason {
    /// No role policy resolvable under strict mode
    PolicyMissing,
    /// Source address violates the role's IP-range rule
    IpRangeDenied,
    /// The account already holds sessions from the maximum number of
    /// distinct source addresses
    DistinctIpCapExceeded,
    /// The concurrency limit was reached under a blocking eviction method
    ConcurrencyLimitDenied { method: EvictionMethod },
}

impl DenyReason {
    /// Stable reason code for callers and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::PolicyMissing => "policy_missing",
            Self::IpRangeDenied => "ip_range_denied",
            Self::DistinctIpCapExceeded => "distinct_ip_cap_exceeded",
            Self::ConcurrencyLimitDenied { .. } => "concurrency_limit_denied",
        }
    }

    /// Human-readable message.
    ///
    /// Two categories only: network-location denials and capacity denials,
    /// so the surrounding UI can render them differently.
    pub fn message(&self) -> &'static str {
        match self {
            Self::IpRangeDenied | Self::DistinctIpCapExceeded => {
                "Login from this network location is not allowed for your account."
            }
            Self::PolicyMissing | Self::ConcurrencyLimitDenied { .. } => {
                "Your account has reached its maximum number of active sessions."
            }
        }
    }
}

/// Outcome of evaluating a login attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Admit the new session
    Allow,
    /// Admit the new session; an existing one was evicted to make room
    Evicted { evicted_token: String },
    /// Refuse the login
    Deny { reason: DenyReason },
}

impl Verdict {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Allow | Self::Evicted { .. })
    }
}
