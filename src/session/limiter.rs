// Session admission and eviction policy engine
// Decides at login time whether a new session may be created, whether an
// existing one must make room for it, or whether the attempt is refused

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::counters::EventCounters;
use crate::device::DeviceClassifier;
use crate::geo::CountryResolver;
use crate::ip::{IpScope, classify_ip, normalize_ip};
use crate::policy::{
    ConcurrencyDimension, EvictionMethod, GlobalMode, IpBlockRule, PolicyStore, RolePolicy,
};
use crate::store::{SessionStore, StoreError};

use super::types::{DenyReason, SessionRecord, Verdict};

/// Failures that prevent a verdict from being reached at all
///
/// Distinct from a deny: a deny is a decision, these are the absence of one.
#[derive(Debug)]
pub enum LimiterError {
    /// Session or policy store call failed
    Store(StoreError),
    /// A dimension needing a classifier or resolver was selected without
    /// one configured; policy validation should have caught this
    ClassifierUnavailable { dimension: ConcurrencyDimension },
}

impl std::fmt::Display for LimiterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimiterError::Store(e) => write!(f, "Store failure during login evaluation: {}", e),
            LimiterError::ClassifierUnavailable { dimension } => write!(
                f,
                "Dimension '{}' selected but no classifier/resolver is configured",
                dimension.as_str()
            ),
        }
    }
}

impl std::error::Error for LimiterError {}

impl From<StoreError> for LimiterError {
    fn from(e: StoreError) -> Self {
        LimiterError::Store(e)
    }
}

type BucketKeyFn = Box<dyn Fn(&str, &str) -> String + Send + Sync>;

/// The admission/eviction policy engine
///
/// Stateless between calls: every evaluation reads the account's session
/// map fresh from the store. Concurrent evaluations for the same account
/// race last-writer-wins on that map; the next login or sweep pass
/// reconciles the count, so no per-account lock is taken here.
pub struct SessionLimiter {
    sessions: Arc<dyn SessionStore>,
    policies: Arc<dyn PolicyStore>,
    classifier: Option<Arc<dyn DeviceClassifier>>,
    countries: Option<Arc<dyn CountryResolver>>,
    counters: Arc<EventCounters>,
}

impl SessionLimiter {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        policies: Arc<dyn PolicyStore>,
        classifier: Option<Arc<dyn DeviceClassifier>>,
        countries: Option<Arc<dyn CountryResolver>>,
        counters: Arc<EventCounters>,
    ) -> Self {
        Self {
            sessions,
            policies,
            classifier,
            countries,
            counters,
        }
    }

    /// Evaluate a login attempt against policy and the account's sessions.
    ///
    /// Checks run in order and short-circuit on the first non-allow:
    /// global bypass, role resolution, IP-range rule, distinct-IP cap,
    /// concurrency limit. Under `override-oldest` an exceeded limit
    /// resolves into an eviction that is persisted before the caller sees
    /// the verdict, so eviction and admission are atomic from here.
    pub async fn evaluate_login(
        &self,
        account_id: &str,
        roles: &[String],
        remote_ip: &str,
        user_agent: &str,
    ) -> Result<Verdict, LimiterError> {
        let mode = self.policies.global_mode().await?;
        if mode == GlobalMode::Disabled {
            return Ok(Verdict::Allow);
        }

        let Some(policy) = self.resolve_policy(roles).await? else {
            return Ok(self.handle_missing_policy(account_id, roles, mode));
        };

        let attempt_ip = normalize_ip(remote_ip);

        if let Some(verdict) = self.check_ip_range(account_id, &attempt_ip, &policy) {
            return Ok(verdict);
        }

        // Read fresh at decision time; the map may have changed since the
        // caller authenticated the credentials
        let sessions = self.sessions.get_sessions(account_id).await?;

        if let Some(verdict) = self.check_distinct_ip_cap(account_id, &attempt_ip, &policy, &sessions)
        {
            return Ok(verdict);
        }

        self.check_concurrency(account_id, &attempt_ip, user_agent, &policy, sessions)
            .await
    }

    /// First role with a configured policy wins; the caller's role order is
    /// the precedence order
    async fn resolve_policy(&self, roles: &[String]) -> Result<Option<RolePolicy>, LimiterError> {
        for role in roles {
            if let Some(policy) = self.policies.role_policy(role).await? {
                return Ok(Some(policy));
            }
        }
        Ok(None)
    }

    fn handle_missing_policy(&self, account_id: &str, roles: &[String], mode: GlobalMode) -> Verdict {
        match mode {
            GlobalMode::Strict => {
                error!(
                    "Login for account {} denied: no session policy for roles {:?} under strict mode",
                    account_id, roles
                );
                self.counters.logins.record_blocked();
                Verdict::Deny {
                    reason: DenyReason::PolicyMissing,
                }
            }
            _ => {
                warn!(
                    "No session policy for account {} (roles {:?}); admitting under permissive mode",
                    account_id, roles
                );
                Verdict::Allow
            }
        }
    }

    fn check_ip_range(
        &self,
        account_id: &str,
        attempt_ip: &str,
        policy: &RolePolicy,
    ) -> Option<Verdict> {
        let scope = classify_ip(attempt_ip);
        let allowed = match policy.ip_block_rule {
            IpBlockRule::AllowEverywhere => true,
            IpBlockRule::AllowPrivateOnly => scope == IpScope::Private,
            IpBlockRule::AllowPublicOnly => scope == IpScope::Public,
        };
        if allowed {
            return None;
        }

        warn!(
            "Login for account {} denied: source IP {} violates {:?}",
            account_id, attempt_ip, policy.ip_block_rule
        );
        self.counters.logins.record_blocked();
        Some(Verdict::Deny {
            reason: DenyReason::IpRangeDenied,
        })
    }

    /// The distinct-IP cap counts the attempt's own address, not the
    /// concurrency dimension
    fn check_distinct_ip_cap(
        &self,
        account_id: &str,
        attempt_ip: &str,
        policy: &RolePolicy,
        sessions: &crate::store::SessionMap,
    ) -> Option<Verdict> {
        if policy.max_distinct_ip == 0 {
            return None;
        }

        let known_ips: HashSet<&str> = sessions.values().map(|s| s.remote_ip.as_str()).collect();
        if known_ips.contains(attempt_ip) || known_ips.len() < policy.max_distinct_ip as usize {
            return None;
        }

        warn!(
            "Login for account {} denied: attempt from new IP {} but account already holds sessions from {} distinct IPs (max {})",
            account_id,
            attempt_ip,
            known_ips.len(),
            policy.max_distinct_ip
        );
        self.counters.logins.record_blocked();
        Some(Verdict::Deny {
            reason: DenyReason::DistinctIpCapExceeded,
        })
    }

    async fn check_concurrency(
        &self,
        account_id: &str,
        attempt_ip: &str,
        user_agent: &str,
        policy: &RolePolicy,
        sessions: crate::store::SessionMap,
    ) -> Result<Verdict, LimiterError> {
        let dimension = policy.concurrency_dimension;
        if dimension == ConcurrencyDimension::None {
            return Ok(Verdict::Allow);
        }

        let bucket_key = self.bucket_key_fn(dimension)?;
        let attempt_key = bucket_key(attempt_ip, user_agent);

        let bucket: Vec<&SessionRecord> = sessions
            .values()
            .filter(|s| bucket_key(&s.remote_ip, &s.user_agent) == attempt_key)
            .collect();

        if bucket.len() < policy.concurrency_limit as usize {
            return Ok(Verdict::Allow);
        }

        match policy.eviction_method {
            EvictionMethod::OverrideOldest => {
                // Oldest login in the offending bucket; equal timestamps
                // settle on the lexicographically smallest token
                let Some(candidate) = bucket.iter().min_by(|a, b| {
                    a.created_at
                        .cmp(&b.created_at)
                        .then_with(|| a.token.cmp(&b.token))
                }) else {
                    // Only reachable with a zero limit, which validation rejects
                    return Ok(Verdict::Allow);
                };
                let evicted_token = candidate.token.clone();

                let mut updated = sessions;
                updated.remove(&evicted_token);
                self.sessions.set_sessions(account_id, updated).await?;

                self.counters.sessions.record_forced_terminated();
                info!(
                    "Evicted oldest session {} of account {} (dimension {}, bucket '{}') to admit a new login",
                    evicted_token,
                    account_id,
                    dimension.as_str(),
                    attempt_key
                );
                Ok(Verdict::Evicted { evicted_token })
            }
            method @ (EvictionMethod::BlockWith403 | EvictionMethod::BlockGeneric) => {
                warn!(
                    "Login for account {} denied: {} sessions in bucket '{}' of dimension {} (limit {}), method {:?}",
                    account_id,
                    bucket.len(),
                    attempt_key,
                    dimension.as_str(),
                    policy.concurrency_limit,
                    method
                );
                self.counters.logins.record_blocked();
                Ok(Verdict::Deny {
                    reason: DenyReason::ConcurrencyLimitDenied { method },
                })
            }
        }
    }

    /// One grouping function per dimension, resolved once per evaluation
    /// and applied to the attempt and every current session alike
    fn bucket_key_fn(&self, dimension: ConcurrencyDimension) -> Result<BucketKeyFn, LimiterError> {
        let key_fn: BucketKeyFn = match dimension {
            ConcurrencyDimension::None | ConcurrencyDimension::User => {
                Box::new(|_ip: &str, _ua: &str| "account".to_string())
            }
            ConcurrencyDimension::Ip => Box::new(|ip: &str, _ua: &str| ip.to_string()),
            ConcurrencyDimension::Country => {
                let resolver = self
                    .countries
                    .clone()
                    .ok_or(LimiterError::ClassifierUnavailable { dimension })?;
                Box::new(move |ip: &str, _ua: &str| {
                    // Unresolvable addresses each form their own bucket
                    resolver
                        .resolve(ip)
                        .unwrap_or_else(|| format!("unresolved:{}", ip))
                })
            }
            ConcurrencyDimension::DeviceClass
            | ConcurrencyDimension::DeviceType
            | ConcurrencyDimension::DeviceClient
            | ConcurrencyDimension::DeviceBrowser
            | ConcurrencyDimension::DeviceOs => {
                let classifier = self
                    .classifier
                    .clone()
                    .ok_or(LimiterError::ClassifierUnavailable { dimension })?;
                Box::new(move |_ip: &str, ua: &str| {
                    let info = classifier.classify(ua);
                    match dimension {
                        ConcurrencyDimension::DeviceClass => info.class,
                        ConcurrencyDimension::DeviceType => info.device_type,
                        ConcurrencyDimension::DeviceClient => info.client,
                        ConcurrencyDimension::DeviceBrowser => info.browser,
                        _ => info.os,
                    }
                })
            }
        };
        Ok(key_fn)
    }
}
