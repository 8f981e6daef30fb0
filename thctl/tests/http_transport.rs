//! End-to-end client tests against a local fake Lotus node.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use test_case::test_case;

use thctl::config::ClientConfig;
use thctl::context::CallContext;
use thctl::error::ErrorKind;
use thctl::lotus::LotusClient;
use thctl::miner;

#[derive(Clone)]
enum Reply {
    Result(Value),
    RpcError(i64, &'static str),
    Status(u16),
    Delayed(Duration, Value),
    /// Answer with a raw body and status 200.
    Raw(&'static str),
}

#[derive(Debug, Clone)]
struct Recorded {
    authorization: Option<String>,
    content_type: Option<String>,
    body: Value,
}

#[derive(Default)]
struct FakeNode {
    routes: Mutex<HashMap<String, Reply>>,
    requests: Mutex<Vec<Recorded>>,
}

impl FakeNode {
    fn route(&self, method: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .insert(format!("Filecoin.{method}"), reply);
    }

    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn rpc(
    State(node): State<Arc<FakeNode>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    node.requests.lock().unwrap().push(Recorded {
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: body.clone(),
    });

    let method = body["method"].as_str().unwrap_or_default().to_string();
    let id = body["id"].clone();
    let reply = node.routes.lock().unwrap().get(&method).cloned();

    match reply {
        Some(Reply::Result(result)) => {
            Json(json!({"jsonrpc": "2.0", "result": result, "id": id})).into_response()
        }
        Some(Reply::RpcError(code, message)) => Json(json!({
            "jsonrpc": "2.0",
            "error": {"code": code, "message": message},
            "id": id
        }))
        .into_response(),
        Some(Reply::Status(status)) => StatusCode::from_u16(status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        Some(Reply::Delayed(delay, result)) => {
            tokio::time::sleep(delay).await;
            Json(json!({"jsonrpc": "2.0", "result": result, "id": id})).into_response()
        }
        Some(Reply::Raw(body)) => body.into_response(),
        None => Json(json!({
            "jsonrpc": "2.0",
            "error": {"code": -32601, "message": format!("method '{method}' not found")},
            "id": id
        }))
        .into_response(),
    }
}

async fn start_node() -> (Arc<FakeNode>, SocketAddr) {
    let node = Arc::new(FakeNode::default());
    let app = Router::new()
        .route("/rpc/v0", post(rpc))
        .with_state(node.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (node, addr)
}

fn config(addr: SocketAddr, token: Option<&str>, retries: u32) -> ClientConfig {
    ClientConfig {
        endpoint: format!("http://{addr}/rpc/v0"),
        auth_token: token.map(str::to_string),
        timeout: Duration::from_secs(5),
        retry_count: retries,
    }
}

fn miner_info() -> Value {
    json!({
        "Owner": "f0100",
        "Worker": "f0101",
        "ControlAddresses": null,
        "PeerId": "12D3KooW",
        "WindowPoStProofType": 8,
        "SectorSize": 34359738368_u64,
        "Beneficiary": "f0100"
    })
}

#[tokio::test]
async fn request_carries_envelope_and_bearer_token() {
    let (node, addr) = start_node().await;
    node.route("StateMinerInfo", Reply::Result(miner_info()));
    let client = LotusClient::new(&config(addr, Some("secret"), 0)).unwrap();

    let info = client
        .get_miner_info(&CallContext::new(), "f01234")
        .await
        .unwrap();
    assert_eq!(info.owner, "f0100");
    assert_eq!(info.sector_size.to_string(), "32.00 GiB");

    let requests = node.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer secret"));
    assert_eq!(requests[0].content_type.as_deref(), Some("application/json"));
    assert_eq!(
        requests[0].body,
        json!({
            "jsonrpc": "2.0",
            "method": "Filecoin.StateMinerInfo",
            "params": ["f01234", null],
            "id": 1
        })
    );
}

#[tokio::test]
async fn no_token_sends_no_authorization() {
    let (node, addr) = start_node().await;
    node.route("WalletBalance", Reply::Result(json!("1000000000000000000")));
    let client = LotusClient::new(&config(addr, None, 0)).unwrap();

    let balance = client
        .get_wallet_balance(&CallContext::new(), "f3abc")
        .await
        .unwrap();
    assert_eq!(balance.to_string(), "1.000000 FIL");
    assert_eq!(node.requests()[0].authorization, None);
}

#[tokio::test]
async fn multiaddr_endpoint_reaches_node() {
    let (node, addr) = start_node().await;
    node.route("StateMinerFaults", Reply::Result(json!([2, 3])));
    let config = ClientConfig {
        endpoint: format!("/ip4/127.0.0.1/tcp/{}/http", addr.port()),
        ..config(addr, None, 0)
    };
    let client = LotusClient::new(&config).unwrap();

    let faults = client
        .get_miner_faults(&CallContext::new(), "f01234")
        .await
        .unwrap();
    assert_eq!(faults.to_vec(), vec![2, 3, 4]);
}

#[test_case(401, ErrorKind::Authentication; "unauthorized")]
#[test_case(404, ErrorKind::NotFound; "not_found")]
#[test_case(500, ErrorKind::Connection; "internal_error")]
#[test_case(503, ErrorKind::Connection; "unavailable")]
#[test_case(418, ErrorKind::Unknown; "teapot")]
#[tokio::test]
async fn http_status_is_classified(status: u16, kind: ErrorKind) {
    let (node, addr) = start_node().await;
    node.route("StateMinerPower", Reply::Status(status));
    let client = LotusClient::new(&config(addr, None, 0)).unwrap();

    let err = client
        .get_miner_power(&CallContext::new(), "f01234")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), kind);
}

#[test_case(-32601, "method not found", ErrorKind::MethodNotFound; "standard_method_not_found")]
#[test_case(-32602, "invalid params", ErrorKind::InvalidParams; "standard_invalid_params")]
#[test_case(-32001, "bad params", ErrorKind::InvalidParams; "lotus_invalid_params")]
#[test_case(1, "resolution lookup failed (f09999): actor not found", ErrorKind::NotFound; "actor_not_found")]
#[test_case(-32000, "something broke", ErrorKind::Unknown; "server_error")]
#[tokio::test]
async fn rpc_errors_are_classified(code: i64, message: &'static str, kind: ErrorKind) {
    let (node, addr) = start_node().await;
    node.route("StateMinerInfo", Reply::RpcError(code, message));
    let client = LotusClient::new(&config(addr, None, 3)).unwrap();

    let err = client
        .get_miner_info(&CallContext::new(), "f09999")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), kind);
    assert_eq!(err.code(), Some(code));
    // Not retryable, so only one request
    assert_eq!(node.requests().len(), 1);
}

#[tokio::test]
async fn server_errors_are_retried() {
    let (node, addr) = start_node().await;
    node.route("StateMinerPower", Reply::Status(502));
    let client = LotusClient::new(&config(addr, None, 1)).unwrap();

    let err = client
        .get_miner_power(&CallContext::new(), "f01234")
        .await
        .unwrap_err();
    assert!(err.is_connection_error());
    assert_eq!(node.requests().len(), 2);
}

#[tokio::test]
async fn slow_node_times_out() {
    let (node, addr) = start_node().await;
    node.route(
        "StateMinerInfo",
        Reply::Delayed(Duration::from_secs(5), miner_info()),
    );
    let config = ClientConfig {
        timeout: Duration::from_millis(100),
        ..config(addr, None, 0)
    };
    let client = LotusClient::new(&config).unwrap();

    let err = client
        .get_miner_info(&CallContext::new(), "f01234")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RpcTimeout);
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let (node, addr) = start_node().await;
    node.route("StateMinerInfo", Reply::Raw("<html>gateway</html>"));
    let client = LotusClient::new(&config(addr, None, 0)).unwrap();

    let err = client
        .get_miner_info(&CallContext::new(), "f01234")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);
}

#[tokio::test]
async fn unreachable_node_is_connection_error() {
    // Reserve a port, then free it so nothing is listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = LotusClient::new(&config(addr, None, 0)).unwrap();
    let err = client
        .get_miner_info(&CallContext::new(), "f01234")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[tokio::test]
async fn cancelled_context_aborts_request() {
    let (node, addr) = start_node().await;
    node.route(
        "StateMinerInfo",
        Reply::Delayed(Duration::from_secs(10), miner_info()),
    );
    let client = LotusClient::new(&config(addr, None, 3)).unwrap();

    let ctx = CallContext::with_timeout(Duration::from_millis(50));
    let start = std::time::Instant::now();
    let err = client.get_miner_info(&ctx, "f01234").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RpcTimeout);
    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(node.requests().len(), 1);
}

#[tokio::test]
async fn aggregate_over_http_tolerates_missing_procedures() {
    let (node, addr) = start_node().await;
    node.route("StateMinerInfo", Reply::Result(miner_info()));
    node.route(
        "StateMinerPower",
        Reply::Result(json!({
            "MinerPower": {"RawBytePower": "1125899906842624", "QualityAdjPower": "1125899906842624"},
            "TotalPower": {"RawBytePower": "4503599627370496", "QualityAdjPower": "4503599627370496"},
            "HasMinPower": true
        })),
    );
    node.route("WalletBalance", Reply::Result(json!("5000000000000000000")));
    // Everything else answers "method not found"
    let client = LotusClient::new(&config(addr, Some("secret"), 0)).unwrap();

    let agg = miner::aggregate(&client, &CallContext::new(), "f01234")
        .await
        .unwrap();

    assert_eq!(agg.owner.address, "f0100");
    assert_eq!(
        agg.owner.balance.map(|b| b.to_string()).as_deref(),
        Some("5.000000 FIL")
    );
    assert_eq!(agg.network_power_share, 0.25);
    assert_eq!(agg.deadline_count, 0);
    assert!(
        node.requests()
            .iter()
            .all(|r| r.authorization.as_deref() == Some("Bearer secret"))
    );
}

#[tokio::test]
async fn aggregate_over_http_fails_on_unauthorized() {
    let (node, addr) = start_node().await;
    node.route("StateMinerInfo", Reply::Status(401));
    let client = LotusClient::new(&config(addr, Some("wrong"), 0)).unwrap();

    let err = miner::aggregate(&client, &CallContext::new(), "f01234")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert!(err.partial().is_none());
}
