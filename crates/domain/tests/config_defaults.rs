use std::time::Duration;

use sw_domain::config::ClientConfig;

#[test]
fn default_request_timeout_is_ten_seconds() {
    let config = ClientConfig::default();
    assert_eq!(config.session.request_timeout(), Some(Duration::from_secs(10)));
}

#[test]
fn default_keepalive_is_three_minutes() {
    let config = ClientConfig::default();
    assert_eq!(config.session.keepalive_interval(), Duration::from_secs(180));
}

#[test]
fn reconnect_disabled_by_default() {
    let config = ClientConfig::default();
    assert!(!config.reconnect.enabled);
    assert_eq!(config.reconnect.wait(), Duration::from_secs(5));
    assert_eq!(config.reconnect.jitter(), Duration::ZERO);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = ClientConfig::from_toml_str("").unwrap();
    assert_eq!(config.access_point.resolver_host, "apresolve.spotify.com");
    assert!(config.access_point.site.is_none());
}

#[test]
fn partial_sections_parse() {
    let toml_str = r#"
[session]
request_timeout_secs = 30

[reconnect]
enabled = true
jitter_ms = 250

[access_point]
site = "london"
"#;
    let config = ClientConfig::from_toml_str(toml_str).unwrap();
    assert_eq!(config.session.request_timeout_secs, 30);
    assert_eq!(config.session.keepalive_interval_secs, 180);
    assert!(config.reconnect.enabled);
    assert_eq!(config.reconnect.wait_secs, 5);
    assert_eq!(config.reconnect.jitter(), Duration::from_millis(250));
    assert_eq!(config.access_point.site.as_deref(), Some("london"));
}

#[test]
fn invalid_toml_is_config_error() {
    let err = ClientConfig::from_toml_str("[session\nfoo").unwrap_err();
    assert!(matches!(err, sw_domain::Error::Config(_)));
}

#[test]
fn load_missing_file_is_io_error() {
    let err = ClientConfig::load("/nonexistent/spotweb.toml").unwrap_err();
    assert!(matches!(err, sw_domain::Error::Io(_)));
}
