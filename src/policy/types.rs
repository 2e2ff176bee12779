// Role policy model
// One policy per role name; the first role of an account that has a policy wins

use serde::{Deserialize, Serialize};

/// Operator-wide enforcement mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GlobalMode {
    /// No role limitation at all; every login is admitted
    Disabled,
    /// Accounts without a resolvable policy are logged and admitted
    Permissive,
    /// Accounts without a resolvable policy are denied
    Strict,
}

/// Where logins for a role may originate from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IpBlockRule {
    AllowEverywhere,
    AllowPrivateOnly,
    AllowPublicOnly,
}

/// Dimension along which an account's sessions are counted against the limit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyDimension {
    /// No concurrency limit
    None,
    /// All of the account's sessions share one bucket
    User,
    /// One bucket per source IP
    Ip,
    /// One bucket per resolved country
    Country,
    DeviceClass,
    DeviceType,
    DeviceClient,
    DeviceBrowser,
    DeviceOs,
}

impl ConcurrencyDimension {
    /// True for the dimensions that need a device classifier
    pub fn needs_classifier(&self) -> bool {
        matches!(
            self,
            Self::DeviceClass
                | Self::DeviceType
                | Self::DeviceClient
                | Self::DeviceBrowser
                | Self::DeviceOs
        )
    }

    /// Stable label used in logs and deny payloads
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::User => "user",
            Self::Ip => "ip",
            Self::Country => "country",
            Self::DeviceClass => "device_class",
            Self::DeviceType => "device_type",
            Self::DeviceClient => "device_client",
            Self::DeviceBrowser => "device_browser",
            Self::DeviceOs => "device_os",
        }
    }
}

/// What happens when a login would exceed the concurrency limit
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EvictionMethod {
    /// Terminate the oldest session in the offending bucket and admit
    OverrideOldest,
    /// Refuse with a capacity error the caller surfaces as HTTP 403
    #[serde(rename = "block_with_403")]
    BlockWith403,
    /// Refuse with the caller's default error presentation
    BlockGeneric,
}

/// Per-role session policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RolePolicy {
    #[serde(default = "defaults::ip_block_rule")]
    pub ip_block_rule: IpBlockRule,
    /// 0 means unlimited distinct source IPs per account
    #[serde(default)]
    pub max_distinct_ip: u32,
    #[serde(default = "defaults::concurrency_dimension")]
    pub concurrency_dimension: ConcurrencyDimension,
    /// Meaningless when the dimension is `none`
    #[serde(default = "defaults::concurrency_limit")]
    pub concurrency_limit: u32,
    #[serde(default = "defaults::eviction_method")]
    pub eviction_method: EvictionMethod,
    /// 0 disables idle eviction
    #[serde(default)]
    pub idle_timeout_hours: u32,
    #[serde(default = "defaults::cookie_ttl_hours")]
    pub cookie_ttl_hours: u32,
    #[serde(default = "defaults::cookie_remember_ttl_hours")]
    pub cookie_remember_ttl_hours: u32,
}

mod defaults {
    use super::{ConcurrencyDimension, EvictionMethod, IpBlockRule};

    pub fn ip_block_rule() -> IpBlockRule {
        IpBlockRule::AllowEverywhere
    }

    pub fn concurrency_dimension() -> ConcurrencyDimension {
        ConcurrencyDimension::None
    }

    pub fn concurrency_limit() -> u32 {
        1
    }

    pub fn eviction_method() -> EvictionMethod {
        EvictionMethod::OverrideOldest
    }

    pub fn cookie_ttl_hours() -> u32 {
        48
    }

    pub fn cookie_remember_ttl_hours() -> u32 {
        336
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            ip_block_rule: defaults::ip_block_rule(),
            max_distinct_ip: 0,
            concurrency_dimension: defaults::concurrency_dimension(),
            concurrency_limit: defaults::concurrency_limit(),
            eviction_method: defaults::eviction_method(),
            idle_timeout_hours: 0,
            cookie_ttl_hours: defaults::cookie_ttl_hours(),
            cookie_remember_ttl_hours: defaults::cookie_remember_ttl_hours(),
        }
    }
}

impl RolePolicy {
    /// Validate a policy at configuration load time.
    ///
    /// A dimension that needs a classifier or resolver which is not
    /// configured is rejected here; the limiter never has to handle that
    /// case at decision time.
    pub fn validate(
        &self,
        role: &str,
        classifier_available: bool,
        resolver_available: bool,
    ) -> Result<(), String> {
        if self.concurrency_dimension != ConcurrencyDimension::None && self.concurrency_limit == 0 {
            return Err(format!(
                "Role '{}': concurrency_limit must be at least 1 when a dimension is set",
                role
            ));
        }

        if self.concurrency_dimension.needs_classifier() && !classifier_available {
            return Err(format!(
                "Role '{}': dimension '{}' requires device detection, which is disabled",
                role,
                self.concurrency_dimension.as_str()
            ));
        }

        if self.concurrency_dimension == ConcurrencyDimension::Country && !resolver_available {
            return Err(format!(
                "Role '{}': dimension 'country' requires a country resolver, none is configured",
                role
            ));
        }

        if self.cookie_ttl_hours == 0 || self.cookie_remember_ttl_hours == 0 {
            return Err(format!(
                "Role '{}': cookie lifetimes must be positive",
                role
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_validates() {
        let policy = RolePolicy::default();
        assert!(policy.validate("subscriber", true, true).is_ok());
    }

    #[test]
    fn test_zero_limit_with_dimension_is_rejected() {
        let policy = RolePolicy {
            concurrency_dimension: ConcurrencyDimension::User,
            concurrency_limit: 0,
            ..RolePolicy::default()
        };
        assert!(policy.validate("editor", true, true).is_err());
    }

    #[test]
    fn test_device_dimension_requires_classifier() {
        let policy = RolePolicy {
            concurrency_dimension: ConcurrencyDimension::DeviceBrowser,
            ..RolePolicy::default()
        };
        assert!(policy.validate("editor", false, true).is_err());
        assert!(policy.validate("editor", true, true).is_ok());
    }

    #[test]
    fn test_country_dimension_requires_resolver() {
        let policy = RolePolicy {
            concurrency_dimension: ConcurrencyDimension::Country,
            ..RolePolicy::default()
        };
        assert!(policy.validate("editor", true, false).is_err());
        assert!(policy.validate("editor", true, true).is_ok());
    }

    #[test]
    fn test_policy_deserializes_from_yaml_with_defaults() {
        let yaml = r#"
concurrency_dimension: user
concurrency_limit: 3
eviction_method: block_with_403
"#;
        let policy: RolePolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.concurrency_dimension, ConcurrencyDimension::User);
        assert_eq!(policy.concurrency_limit, 3);
        assert_eq!(policy.eviction_method, EvictionMethod::BlockWith403);
        assert_eq!(policy.ip_block_rule, IpBlockRule::AllowEverywhere);
        assert_eq!(policy.max_distinct_ip, 0);
    }
}
