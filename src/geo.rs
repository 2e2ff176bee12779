// Country resolution for session IPs
// Backed by a static table here; a GeoIP database belongs behind the same trait

use std::collections::HashMap;

use crate::ip::normalize_ip;

/// Trait for resolving an IP address to an ISO 3166-1 alpha-2 country code
///
/// Returns `None` when the address cannot be attributed to a country
/// (private ranges, unknown addresses). Callers must treat `None` as
/// "unknown", never as an error.
pub trait CountryResolver: Send + Sync {
    fn resolve(&self, ip: &str) -> Option<String>;
}

/// Country resolver backed by an exact-match lookup table
///
/// Entries are keyed by normalized address. Useful for tests and for
/// deployments that front a small, known address population; production
/// setups would wrap a GeoIP reader in the same trait.
#[derive(Debug, Default)]
pub struct StaticCountryResolver {
    table: HashMap<String, String>,
}

impl StaticCountryResolver {
    pub fn new(entries: HashMap<String, String>) -> Self {
        let table = entries
            .into_iter()
            .map(|(ip, cc)| (normalize_ip(&ip), cc.to_uppercase()))
            .collect();
        Self { table }
    }
}

impl CountryResolver for StaticCountryResolver {
    fn resolve(&self, ip: &str) -> Option<String> {
        self.table.get(&normalize_ip(ip)).cloned()
    }
}
