// Policy store backends

use async_trait::async_trait;
use std::collections::HashMap;

use crate::store::StoreError;

use super::types::{GlobalMode, RolePolicy};

/// Trait for policy lookup backends
///
/// Policies change rarely; implementations are expected to answer from a
/// local snapshot rather than a round trip per login.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Policy for one role name, if one is configured
    async fn role_policy(&self, role: &str) -> Result<Option<RolePolicy>, StoreError>;

    /// Operator-wide enforcement mode
    async fn global_mode(&self) -> Result<GlobalMode, StoreError>;
}

/// Policy store answering from the loaded configuration
pub struct ConfigPolicyStore {
    mode: GlobalMode,
    policies: HashMap<String, RolePolicy>,
}

impl ConfigPolicyStore {
    pub fn new(mode: GlobalMode, policies: HashMap<String, RolePolicy>) -> Self {
        Self { mode, policies }
    }
}

#[async_trait]
impl PolicyStore for ConfigPolicyStore {
    async fn role_policy(&self, role: &str) -> Result<Option<RolePolicy>, StoreError> {
        Ok(self.policies.get(role).cloned())
    }

    async fn global_mode(&self) -> Result<GlobalMode, StoreError> {
        Ok(self.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_known_role_returns_policy() {
        let mut policies = HashMap::new();
        policies.insert("editor".to_string(), RolePolicy::default());
        let store = ConfigPolicyStore::new(GlobalMode::Strict, policies);

        assert!(store.role_policy("editor").await.unwrap().is_some());
        assert!(store.role_policy("subscriber").await.unwrap().is_none());
        assert_eq!(store.global_mode().await.unwrap(), GlobalMode::Strict);
    }
}
