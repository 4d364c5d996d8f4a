//! Builder pattern for constructing a [`Session`].

use std::sync::Arc;
use std::time::Duration;

use sw_domain::config::{AccessPointConfig, ClientConfig};
use sw_domain::{Error, Result};

use crate::access_point::{AccessPointResolver, CredentialsProvider, HttpResolver, StaticAccessPoint};
use crate::reconnect::ReconnectPolicy;
use crate::session::{Session, SessionOptions};
use crate::work::WorkHandler;

/// Fluent builder for [`Session`].
///
/// # Example
///
/// ```rust,no_run
/// # use std::time::Duration;
/// # use sw_client::{Credentials, ReconnectPolicy, Session};
/// let session = Session::builder()
///     .credentials(Credentials::new("user:token:extra"))
///     .request_timeout(Some(Duration::from_secs(5)))
///     .reconnect(ReconnectPolicy::every(Duration::from_secs(2)))
///     .build()
///     .unwrap();
/// ```
pub struct SessionBuilder {
    credentials: Option<Arc<dyn CredentialsProvider>>,
    resolver: Option<Arc<dyn AccessPointResolver>>,
    work_handler: Option<Arc<dyn WorkHandler>>,
    access_point: AccessPointConfig,
    request_timeout: Option<Duration>,
    keepalive_interval: Duration,
    reconnect: ReconnectPolicy,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            credentials: None,
            resolver: None,
            work_handler: None,
            access_point: AccessPointConfig::default(),
            request_timeout: Some(Duration::from_secs(10)),
            keepalive_interval: Duration::from_secs(180),
            reconnect: ReconnectPolicy::default(),
        }
    }

    /// Apply every section of a loaded [`ClientConfig`].
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.request_timeout = config.session.request_timeout();
        self.keepalive_interval = config.session.keepalive_interval();
        self.reconnect = ReconnectPolicy::from(&config.reconnect);
        self.access_point = config.access_point.clone();
        self
    }

    // ── Required ─────────────────────────────────────────────────────

    pub fn credentials(mut self, provider: impl CredentialsProvider) -> Self {
        self.credentials = Some(Arc::new(provider));
        self
    }

    pub fn credentials_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    // ── Access point ─────────────────────────────────────────────────

    /// Replace HTTP resolution with a custom resolver.
    pub fn resolver(mut self, resolver: impl AccessPointResolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Always connect to `host:port` (or a full `ws://` URL).
    pub fn access_point(self, access_point: impl Into<String>) -> Self {
        self.resolver(StaticAccessPoint(access_point.into()))
    }

    // ── Behavior ─────────────────────────────────────────────────────

    /// Per-call timeout; `None` disables timeouts (default 10s).
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Interval between `sp/echo` keepalives (default 180s).  Zero disables
    /// them.
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Answer `do_work` pushes with `handler`.
    pub fn work_handler(mut self, handler: impl WorkHandler) -> Self {
        self.work_handler = Some(Arc::new(handler));
        self
    }

    /// Build the [`Session`].  Does not connect.
    pub fn build(self) -> Result<Session> {
        let credentials = self
            .credentials
            .ok_or_else(|| Error::Config("a credentials provider is required".into()))?;
        let resolver: Arc<dyn AccessPointResolver> = match self.resolver {
            Some(resolver) => resolver,
            None => Arc::new(HttpResolver::new(self.access_point)?),
        };

        Ok(Session::new(
            SessionOptions {
                request_timeout: self.request_timeout,
                keepalive_interval: self.keepalive_interval,
                reconnect: self.reconnect,
            },
            credentials,
            resolver,
            self.work_handler,
        ))
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access_point::Credentials;
    use crate::session::SessionState;

    #[test]
    fn credentials_are_required() {
        let err = SessionBuilder::new().build().err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn builds_disconnected_session() {
        let session = SessionBuilder::new()
            .credentials(Credentials::new("u:t:x"))
            .access_point("127.0.0.1:4070")
            .build()
            .unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.connected());
        assert!(!session.reconnect_enabled());
    }

    #[test]
    fn config_sections_are_applied() {
        let config = ClientConfig::from_toml_str(
            r#"
            [session]
            request_timeout_secs = 0
            keepalive_interval_secs = 30

            [reconnect]
            enabled = true
            wait_secs = 1
            "#,
        )
        .unwrap();
        let builder = SessionBuilder::new().config(&config);
        assert_eq!(builder.request_timeout, None);
        assert_eq!(builder.keepalive_interval, Duration::from_secs(30));
        assert!(builder.reconnect.enabled);
        assert_eq!(builder.reconnect.wait, Duration::from_secs(1));

        let session = builder.credentials(Credentials::new("u:t:x")).build().unwrap();
        assert!(session.reconnect_enabled());
    }
}
