// Role policy module
// Per-role session rules and the store the limiter resolves them from

pub mod store;
pub mod types;

pub use store::{ConfigPolicyStore, PolicyStore};
pub use types::{ConcurrencyDimension, EvictionMethod, GlobalMode, IpBlockRule, RolePolicy};
