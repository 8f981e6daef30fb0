//! JSON-RPC over HTTP.
//!
//! A [`Transport`] performs exactly one request/response round trip and
//! classifies any failure into a [`ClientError`]. It never retries; that is
//! the job of [`RetryingCaller`](super::retry::RetryingCaller).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ClientError, ErrorKind, Result};
use crate::tracing::prelude::*;

/// Requests are not pipelined, so every request can share one id.
const REQUEST_ID: u64 = 1;

/// One JSON-RPC call against a node.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Invoke `method` with positional `params` and return the raw result.
    ///
    /// A JSON `null` result is returned as [`Value::Null`], not an error.
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value>;
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: &'a [Value],
    id: u64,
}

#[derive(Deserialize)]
struct RpcResponse {
    // Distinguishes `"result": null` (a valid answer) from a missing field.
    #[serde(default, deserialize_with = "deserialize_some")]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
    #[serde(default)]
    id: Option<Value>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    #[serde(default)]
    message: String,
}

fn deserialize_some<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// [`Transport`] backed by a pooled `reqwest` client.
///
/// Holds no per-call state, so one instance serves any number of
/// concurrent calls.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    url: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    /// Create a transport posting to an already resolved `url`.
    pub fn new(url: impl Into<String>, auth_token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ClientError::new(ErrorKind::Unknown, "failed to build HTTP client").with_source(e)
            })?;

        Ok(Self {
            http,
            url: url.into(),
            auth_token,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let body = RpcRequest {
            jsonrpc: "2.0",
            method,
            params: &params,
            id: REQUEST_ID,
        };

        trace!(method, url = %self.url, "Sending RPC request");

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ClientError::from_transport)?;

        let status = response.status();
        if status != StatusCode::OK {
            debug!(method, status = status.as_u16(), "RPC request rejected");
            return Err(ClientError::from_http_status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(ClientError::from_transport)?;
        trace!(method, len = bytes.len(), "Received RPC response");

        decode_response(&bytes)
    }
}

fn decode_response(bytes: &[u8]) -> Result<Value> {
    let response: RpcResponse = serde_json::from_slice(bytes)
        .map_err(|e| ClientError::malformed("response is not a JSON-RPC envelope").with_source(e))?;

    if response.id != Some(Value::from(REQUEST_ID)) {
        return Err(ClientError::malformed(format!(
            "response id {} does not match request id {REQUEST_ID}",
            response.id.unwrap_or(Value::Null)
        )));
    }

    if let Some(error) = response.error {
        return Err(ClientError::from_rpc_error(error.code, &error.message));
    }

    response
        .result
        .ok_or_else(|| ClientError::malformed("response has neither result nor error"))
}
