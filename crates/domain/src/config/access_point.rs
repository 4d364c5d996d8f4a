use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Access point resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessPointConfig {
    /// Host answering `?client=...` lookups with an `ap_list`.
    #[serde(default = "d_resolver_host")]
    pub resolver_host: String,
    /// Optional `site` hint forwarded to the resolver.
    #[serde(default)]
    pub site: Option<String>,
    /// Web player version reported in the `client` query parameter.
    #[serde(default = "d_client_version")]
    pub client_version: String,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    /// Upper bound on a single resolver lookup.
    #[serde(default = "d_lookup_timeout_secs")]
    pub lookup_timeout_secs: u64,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            resolver_host: d_resolver_host(),
            site: None,
            client_version: d_client_version(),
            user_agent: d_user_agent(),
            lookup_timeout_secs: d_lookup_timeout_secs(),
        }
    }
}

impl AccessPointConfig {
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_timeout_secs)
    }
}

fn d_resolver_host() -> String {
    "apresolve.spotify.com".into()
}

fn d_client_version() -> String {
    "0".into()
}

fn d_user_agent() -> String {
    "node-spotify-web (Chrome/13.37 compatible-ish)".into()
}

fn d_lookup_timeout_secs() -> u64 {
    10
}
