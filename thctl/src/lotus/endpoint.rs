//! Endpoint resolution.
//!
//! Nodes are addressed either by a plain HTTP(S) URL or by the multiaddress
//! form Lotus prints in its API info, e.g. `/ip4/127.0.0.1/tcp/1234/http`.
//! Multiaddresses are rewritten to the node's `/rpc/v0` URL; plain URLs are
//! passed through untouched.

use reqwest::Url;

use crate::error::{ClientError, ErrorKind, Result};

/// Path of the JSON-RPC handler on a Lotus node.
const RPC_PATH: &str = "/rpc/v0";

/// Turn a configured endpoint into the URL requests are posted to.
///
/// ```text
/// /ip4/10.0.0.5/tcp/1234          -> http://10.0.0.5:1234/rpc/v0
/// /ip6/::1/tcp/1234/https         -> https://[::1]:1234/rpc/v0
/// /dns/node.example/tcp/443/wss   -> https://node.example:443/rpc/v0
/// https://node.example/rpc/v1     -> https://node.example/rpc/v1
/// ```
pub fn resolve(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.starts_with('/') {
        return resolve_multiaddr(raw);
    }

    let url = Url::parse(raw).map_err(|e| {
        ClientError::new(ErrorKind::InvalidRequest, format!("invalid endpoint {raw:?}"))
            .with_source(e)
    })?;
    match url.scheme() {
        "http" | "https" => Ok(raw.to_string()),
        scheme => Err(ClientError::new(
            ErrorKind::InvalidRequest,
            format!("unsupported endpoint scheme {scheme:?}"),
        )),
    }
}

fn resolve_multiaddr(raw: &str) -> Result<String> {
    let invalid = |reason: &str| {
        ClientError::new(
            ErrorKind::InvalidRequest,
            format!("invalid multiaddress {raw:?}: {reason}"),
        )
    };

    let parts: Vec<&str> = raw.trim_start_matches('/').split('/').collect();
    let [proto, host, "tcp", port, rest @ ..] = parts.as_slice() else {
        return Err(invalid("expected /<proto>/<host>/tcp/<port>"));
    };

    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    let host = match *proto {
        "ip4" => {
            host.parse::<std::net::Ipv4Addr>()
                .map_err(|_| invalid("bad ip4 address"))?;
            host.to_string()
        }
        "ip6" => {
            host.parse::<std::net::Ipv6Addr>()
                .map_err(|_| invalid("bad ip6 address"))?;
            format!("[{host}]")
        }
        "dns" | "dns4" | "dns6" => host.to_string(),
        other => return Err(invalid(&format!("unsupported protocol {other}"))),
    };

    let port: u16 = port.parse().map_err(|_| invalid("bad tcp port"))?;

    let scheme = match rest {
        [] | ["http"] | ["ws"] => "http",
        ["https"] | ["wss"] => "https",
        _ => return Err(invalid("unsupported trailing components")),
    };

    Ok(format!("{scheme}://{host}:{port}{RPC_PATH}"))
}

/// A `TOKEN:ENDPOINT` string as found in `FULLNODE_API_INFO`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiInfo {
    pub endpoint: String,
    pub token: Option<String>,
}

impl ApiInfo {
    /// Split off the token if one precedes the endpoint.
    ///
    /// Only a prefix followed by a multiaddress counts as a token, so a
    /// bare URL such as `http://host:1234` is not mistaken for one.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.split_once(':') {
            Some((token, endpoint))
                if !token.is_empty()
                    && endpoint.starts_with('/')
                    && !endpoint.starts_with("//") =>
            {
                Self {
                    endpoint: endpoint.to_string(),
                    token: Some(token.to_string()),
                }
            }
            _ => Self {
                endpoint: raw.to_string(),
                token: None,
            },
        }
    }
}
