//! Resolved client configuration.

use std::time::Duration;

use crate::lotus::endpoint::ApiInfo;
use crate::tracing::prelude::*;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:1234/rpc/v0";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RETRY_COUNT: u32 = 3;

/// Environment variables read by [`ClientConfig::from_env`].
pub mod env {
    pub const API_URL: &str = "LOTUS_API_URL";
    pub const API_TOKEN: &str = "LOTUS_API_TOKEN";
    pub const API_TIMEOUT: &str = "LOTUS_API_TIMEOUT";
    pub const API_RETRIES: &str = "LOTUS_API_RETRIES";
    /// Lotus-style `TOKEN:MULTIADDR` string, used when no URL is set.
    pub const FULLNODE_API_INFO: &str = "FULLNODE_API_INFO";
}

/// Everything needed to construct a [`LotusClient`](crate::lotus::LotusClient).
///
/// The client copies what it needs at construction; changing a config
/// afterwards does not affect clients already built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// HTTP(S) URL or multiaddress of the node's RPC endpoint.
    pub endpoint: String,

    /// Bearer token; `None` sends no `Authorization` header.
    pub auth_token: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Extra attempts after the first for transient failures.
    pub retry_count: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
            retry_count: DEFAULT_RETRY_COUNT,
        }
    }
}

impl ClientConfig {
    /// Build from process environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup over the defaults.
    ///
    /// Empty values count as unset. Values that fail to parse are ignored
    /// with a warning rather than rejected.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = get(env::API_URL) {
            config.endpoint = url;
        } else if let Some(info) = get(env::FULLNODE_API_INFO) {
            let info = ApiInfo::parse(&info);
            config.endpoint = info.endpoint;
            config.auth_token = info.token;
        }

        if let Some(token) = get(env::API_TOKEN) {
            config.auth_token = Some(token);
        }

        if let Some(raw) = get(env::API_TIMEOUT) {
            match humantime::parse_duration(raw.trim()) {
                Ok(timeout) => config.timeout = timeout,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {}", env::API_TIMEOUT),
            }
        }

        if let Some(raw) = get(env::API_RETRIES) {
            match raw.trim().parse() {
                Ok(retries) => config.retry_count = retries,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring invalid {}", env::API_RETRIES),
            }
        }

        config
    }

    /// Apply per-invocation overrides; `None` keeps the current value.
    pub fn with_overrides(
        mut self,
        endpoint: Option<String>,
        auth_token: Option<String>,
        timeout: Option<Duration>,
        retry_count: Option<u32>,
    ) -> Self {
        if let Some(endpoint) = endpoint {
            self.endpoint = endpoint;
        }
        if let Some(token) = auth_token {
            self.auth_token = Some(token);
        }
        if let Some(timeout) = timeout {
            self.timeout = timeout;
        }
        if let Some(retry_count) = retry_count {
            self.retry_count = retry_count;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.endpoint, "http://127.0.0.1:1234/rpc/v0");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.auth_token, None);
    }

    #[test]
    fn reads_all_variables() {
        let config = ClientConfig::from_lookup(lookup(&[
            (env::API_URL, "https://node.example:1234/rpc/v1"),
            (env::API_TOKEN, "secret"),
            (env::API_TIMEOUT, "1m 30s"),
            (env::API_RETRIES, "5"),
        ]));
        assert_eq!(config.endpoint, "https://node.example:1234/rpc/v1");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(90));
        assert_eq!(config.retry_count, 5);
    }

    #[test]
    fn invalid_values_keep_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (env::API_TIMEOUT, "soon"),
            (env::API_RETRIES, "-1"),
            (env::API_TOKEN, "   "),
        ]));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.retry_count, DEFAULT_RETRY_COUNT);
        assert_eq!(config.auth_token, None);
    }

    #[test]
    fn api_info_used_when_url_missing() {
        let config = ClientConfig::from_lookup(lookup(&[(
            env::FULLNODE_API_INFO,
            "eyJhbGciOi:/ip4/10.0.0.5/tcp/1234/http",
        )]));
        assert_eq!(config.endpoint, "/ip4/10.0.0.5/tcp/1234/http");
        assert_eq!(config.auth_token.as_deref(), Some("eyJhbGciOi"));

        // Explicit token beats the embedded one
        let config = ClientConfig::from_lookup(lookup(&[
            (env::FULLNODE_API_INFO, "embedded:/ip4/10.0.0.5/tcp/1234/http"),
            (env::API_TOKEN, "explicit"),
        ]));
        assert_eq!(config.auth_token.as_deref(), Some("explicit"));
    }

    #[test]
    fn overrides_take_precedence() {
        let config = ClientConfig::default().with_overrides(
            Some("http://other:1234/rpc/v0".into()),
            None,
            Some(Duration::from_secs(5)),
            Some(0),
        );
        assert_eq!(config.endpoint, "http://other:1234/rpc/v0");
        assert_eq!(config.auth_token, None);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry_count, 0);
    }
}
