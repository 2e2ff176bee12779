use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::policy::{GlobalMode, RolePolicy};
use crate::session::SweepConfig;

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Operator-wide enforcement mode
    #[serde(default = "defaults::global_mode")]
    pub global_mode: GlobalMode,
    /// Session policy per role name
    #[serde(default)]
    pub roles: HashMap<String, RolePolicy>,
    /// Sweeper tuning
    #[serde(default)]
    pub sweep: SweepConfig,
    /// Session parameters applied when no role policy resolves
    #[serde(default)]
    pub defaults: SessionDefaults,
    /// Disables the built-in user-agent classifier and with it every
    /// device-based concurrency dimension
    #[serde(default = "defaults::device_detection")]
    pub device_detection: bool,
    /// Exact-match IP-to-country entries for the static resolver; empty
    /// disables the country dimension
    #[serde(default)]
    pub country_table: HashMap<String, String>,
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: String,
}

/// Session parameters used when an account has no role policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub cookie_ttl_hours: u32,
    pub cookie_remember_ttl_hours: u32,
    pub idle_timeout_hours: u32,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            cookie_ttl_hours: 48,
            cookie_remember_ttl_hours: 336,
            idle_timeout_hours: 0,
        }
    }
}

mod defaults {
    use crate::policy::GlobalMode;

    pub fn global_mode() -> GlobalMode {
        GlobalMode::Permissive
    }

    pub fn device_detection() -> bool {
        true
    }

    pub fn bind_addr() -> String {
        "0.0.0.0:3000".to_string()
    }
}

impl AppConfig {
    /// Validate the configuration as a whole.
    ///
    /// Every dimension/backend mismatch is caught here so the limiter
    /// never sees an unservable policy at decision time.
    pub fn validate(&self) -> Result<(), String> {
        if self.global_mode != GlobalMode::Disabled && self.roles.is_empty() {
            return Err(
                "Configuration must define at least one role policy unless global_mode is 'disabled'"
                    .to_string(),
            );
        }

        let resolver_available = !self.country_table.is_empty();
        for (role, policy) in &self.roles {
            policy.validate(role, self.device_detection, resolver_available)?;
        }

        if self.sweep.batch_limit == 0 {
            return Err("sweep.batch_limit must be at least 1".to_string());
        }

        self.bind_addr
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid bind_addr '{}': {}", self.bind_addr, e))?;

        Ok(())
    }
}

/// Load configuration from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Arc<AppConfig>, String> {
    let path = path.as_ref();
    info!("Loading configuration from: {}", path.display());

    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

    let config: AppConfig = serde_yaml::from_str(&contents)
        .map_err(|e| format!("Failed to parse YAML config: {}", e))?;

    config.validate()?;

    info!(
        "Configuration loaded: mode {:?}, {} role policy(ies), sweep every {}s in batches of {}",
        config.global_mode,
        config.roles.len(),
        config.sweep.cycle_interval_secs,
        config.sweep.batch_limit
    );

    Ok(Arc::new(config))
}

/// Load configuration with fallback options
pub fn load_config_with_fallback() -> Result<Arc<AppConfig>, String> {
    // Try loading from environment variable first
    if let Ok(config_path) = std::env::var("CONFIG_PATH") {
        match load_config(&config_path) {
            Ok(config) => return Ok(config),
            Err(e) => warn!(
                "Failed to load config from CONFIG_PATH ({}): {}",
                config_path, e
            ),
        }
    }

    // Try common config file locations
    let paths = vec!["config.yaml", "config.yml", "./config.yaml", "./config.yml"];

    for path in paths {
        if Path::new(path).exists() {
            match load_config(path) {
                Ok(config) => return Ok(config),
                Err(e) => warn!("Failed to load config from '{}': {}", path, e),
            }
        }
    }

    Err(
        "No configuration file found. Please create a config.yaml file or set CONFIG_PATH environment variable. \
        See config.example.yaml for an example configuration.".to_string()
    )
}
