//! Credentials and access point discovery.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use sw_domain::config::AccessPointConfig;
use sw_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Credentials
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Opaque login material plus optional routing hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Colon-separated login string, e.g. `user:token:extra`.
    pub credentials: String,
    /// Skip resolution and connect to this `host:port` directly.
    #[serde(default)]
    pub access_point: Option<String>,
    #[serde(default)]
    pub resolver_host: Option<String>,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub client_version: Option<String>,
}

impl Credentials {
    pub fn new(credentials: impl Into<String>) -> Self {
        Self {
            credentials: credentials.into(),
            ..Default::default()
        }
    }

    pub fn with_access_point(mut self, access_point: impl Into<String>) -> Self {
        self.access_point = Some(access_point.into());
        self
    }

    /// Arguments of the `connect` command: the first two fields, then the
    /// remainder joined back with `:`.
    pub fn connect_args(&self) -> Vec<Value> {
        let mut parts = self.credentials.splitn(3, ':');
        (0..3)
            .map(|_| Value::String(parts.next().unwrap_or_default().to_string()))
            .collect()
    }
}

/// Source of credentials, consulted on every connect and reconnect.
#[async_trait]
pub trait CredentialsProvider: Send + Sync + 'static {
    async fn credentials(&self) -> Result<Credentials>;
}

#[async_trait]
impl CredentialsProvider for Credentials {
    async fn credentials(&self) -> Result<Credentials> {
        Ok(self.clone())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Resolution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Picks the `host:port` the session connects to.
#[async_trait]
pub trait AccessPointResolver: Send + Sync + 'static {
    async fn resolve(&self, credentials: &Credentials) -> Result<String>;
}

/// Always answers with the same access point.
#[derive(Debug, Clone)]
pub struct StaticAccessPoint(pub String);

#[async_trait]
impl AccessPointResolver for StaticAccessPoint {
    async fn resolve(&self, _credentials: &Credentials) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct ApResolveReply {
    #[serde(default)]
    ap_list: Vec<String>,
}

/// Asks the HTTP resolver service for a list of access points and takes
/// the first one.
pub struct HttpResolver {
    client: reqwest::Client,
    config: AccessPointConfig,
}

impl HttpResolver {
    pub fn new(config: AccessPointConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.lookup_timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Http(format!("build resolver client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Use a preconfigured HTTP client.
    pub fn with_client(client: reqwest::Client, config: AccessPointConfig) -> Self {
        Self { client, config }
    }

    fn query(&self, credentials: &Credentials) -> (String, Vec<(&'static str, String)>) {
        let host = credentials
            .resolver_host
            .clone()
            .unwrap_or_else(|| self.config.resolver_host.clone());
        let version = credentials
            .client_version
            .as_deref()
            .unwrap_or(&self.config.client_version);

        let mut query = vec![("client", format!("24:0:0:{version}"))];
        if let Some(site) = credentials.site.as_ref().or(self.config.site.as_ref()) {
            query.push(("site", site.clone()));
        }
        (format!("http://{host}/"), query)
    }
}

#[async_trait]
impl AccessPointResolver for HttpResolver {
    async fn resolve(&self, credentials: &Credentials) -> Result<String> {
        let (url, query) = self.query(credentials);
        tracing::debug!(url = %url, "resolving access point");

        let resp = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Connection(format!("access point lookup failed: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::Connection(format!(
                "access point lookup returned {}",
                resp.status()
            )));
        }
        let reply: ApResolveReply = resp
            .json()
            .await
            .map_err(|e| Error::Connection(format!("invalid access point list: {e}")))?;

        let access_point = reply
            .ap_list
            .into_iter()
            .next()
            .ok_or_else(|| Error::Connection("access point list is empty".into()))?;
        tracing::info!(access_point = %access_point, "access point resolved");
        Ok(access_point)
    }
}
