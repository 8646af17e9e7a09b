//! Minimal hand-rolled HTTP/1.1 adapter exposing the coordinator over the
//! endpoint table in §6.1. Parses a request line, headers, and an optional
//! body; dispatches by (method, path); serializes responses as JSON. No
//! keep-alive, chunked transfer, or TLS — each connection serves exactly
//! one request and closes.

use std::sync::Arc;

use corelib::clock::SystemClock;
use corelib::node::NodeId;
use replication::Coordinator;
use serde::Serialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

struct Request {
    method: String,
    path: String,
    body: Vec<u8>,
}

struct Response {
    status: u16,
    reason: &'static str,
    body: Vec<u8>,
}

impl Response {
    fn json<T: Serialize>(status: u16, reason: &'static str, value: &T) -> Self {
        Self {
            status,
            reason,
            body: serde_json::to_vec(value).unwrap_or_else(|_| b"{}".to_vec()),
        }
    }

    fn not_found() -> Self {
        Self::json(404, "Not Found", &json!({"error": "not_found"}))
    }

    fn bad_request(message: &str) -> Self {
        Self::json(400, "Bad Request", &json!({"error": message}))
    }

    fn server_error(message: &str) -> Self {
        Self::json(500, "Internal Server Error", &json!({"error": message}))
    }
}

pub async fn serve(addr: std::net::SocketAddr, coordinator: Arc<Coordinator<SystemClock>>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    loop {
        let (stream, peer) = listener.accept().await?;
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, coordinator).await {
                warn!(%peer, error = %e, "http connection failed");
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    coordinator: Arc<Coordinator<SystemClock>>,
) -> anyhow::Result<()> {
    let mut reader = BufReader::new(stream);
    let request = match read_request(&mut reader).await? {
        Some(r) => r,
        None => return Ok(()),
    };

    debug!(method = %request.method, path = %request.path, "http request");
    let response = dispatch(request, &coordinator).await;
    write_response(reader.get_mut(), response).await
}

async fn read_request(reader: &mut BufReader<TcpStream>) -> anyhow::Result<Option<Request>> {
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).await? == 0 {
        return Ok(None);
    }
    let mut parts = request_line.trim_end().split(' ');
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    Ok(Some(Request { method, path, body }))
}

async fn write_response(stream: &mut TcpStream, response: Response) -> anyhow::Result<()> {
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        response.reason,
        response.body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(&response.body).await?;
    stream.flush().await?;
    Ok(())
}

#[derive(serde::Deserialize)]
struct PutBody {
    value: String,
}

#[derive(serde::Deserialize)]
struct AddNodeBody {
    node_id: String,
    address: std::net::SocketAddr,
}

async fn dispatch(request: Request, coordinator: &Arc<Coordinator<SystemClock>>) -> Response {
    let segments: Vec<&str> = request.path.trim_start_matches('/').split('/').collect();

    match (request.method.as_str(), segments.as_slice()) {
        ("GET", ["health"]) => health(coordinator),

        ("PUT", ["data", key]) => put_handler(key, &request.body, coordinator).await,
        ("GET", ["data", key]) => get_handler(key, coordinator).await,

        ("GET", ["cluster", "status"]) => cluster_status(coordinator),
        ("GET", ["cluster", "ring"]) => cluster_ring(coordinator),
        ("GET", ["cluster", "distribution"]) => cluster_distribution(coordinator),
        ("POST", ["cluster", "nodes"]) => add_node_handler(&request.body, coordinator).await,

        _ => Response::not_found(),
    }
}

async fn put_handler(
    key: &str,
    body: &[u8],
    coordinator: &Arc<Coordinator<SystemClock>>,
) -> Response {
    let put_body: PutBody = match serde_json::from_slice(body) {
        Ok(b) => b,
        Err(_) => return Response::bad_request("expected JSON body with a \"value\" field"),
    };

    match coordinator
        .put(key.as_bytes().to_vec(), put_body.value.into_bytes())
        .await
    {
        Ok(result) => Response::json(200, "OK", &result),
        Err(e) => Response::server_error(&e.to_string()),
    }
}

async fn get_handler(key: &str, coordinator: &Arc<Coordinator<SystemClock>>) -> Response {
    match coordinator.get(key.as_bytes()).await {
        Ok(Some(result)) => Response::json(200, "OK", &result),
        Ok(None) => Response::not_found(),
        Err(e) => Response::server_error(&e.to_string()),
    }
}

async fn add_node_handler(body: &[u8], coordinator: &Arc<Coordinator<SystemClock>>) -> Response {
    let add_body: AddNodeBody = match serde_json::from_slice(body) {
        Ok(b) => b,
        Err(_) => return Response::bad_request("expected JSON body with \"node_id\" and \"address\""),
    };

    match coordinator
        .add_node(NodeId::new(add_body.node_id), add_body.address)
        .await
    {
        Ok(()) => Response::json(200, "OK", &json!({"success": true, "message": "node added"})),
        Err(e) => Response::server_error(&e.to_string()),
    }
}

fn cluster_status(coordinator: &Arc<Coordinator<SystemClock>>) -> Response {
    let ring = coordinator.ring();
    // Ring membership and liveness are the same fact here: the failure
    // detector evicts a node from the ring the instant it's declared
    // failed (§4.4), so every node still listed is alive.
    let nodes: Vec<_> = ring
        .nodes()
        .into_iter()
        .map(|n| json!({"nodeId": n.id.as_str(), "status": "alive", "address": n.address.to_string()}))
        .collect();

    Response::json(
        200,
        "OK",
        &json!({
            "localNode": coordinator.local_id().as_str(),
            "totalNodes": ring.node_count(),
            "aliveNodes": ring.node_count(),
            "replicationFactor": coordinator.replication_factor(),
            "quorumSize": coordinator.quorum_size(),
            "nodes": nodes,
        }),
    )
}

fn cluster_ring(coordinator: &Arc<Coordinator<SystemClock>>) -> Response {
    let ring = coordinator.ring();
    let nodes: Vec<_> = ring
        .nodes()
        .into_iter()
        .map(|n| json!({"nodeId": n.id.as_str(), "address": n.address.to_string()}))
        .collect();

    Response::json(
        200,
        "OK",
        &json!({
            "totalNodes": ring.node_count(),
            "virtualNodes": coordinator.vnode_count(),
            "replicationFactor": coordinator.replication_factor(),
            "ringSize": ring.token_count(),
            "nodes": nodes,
        }),
    )
}

/// Replica placement sampled over the keys this node currently holds, not
/// over the whole key space — there's no enumerable "all keys" to report on.
const DISTRIBUTION_SAMPLE_LIMIT: usize = 100;

fn cluster_distribution(coordinator: &Arc<Coordinator<SystemClock>>) -> Response {
    let mut distribution = serde_json::Map::new();
    for key in coordinator.store().keys().into_iter().take(DISTRIBUTION_SAMPLE_LIMIT) {
        let replicas: Vec<String> = coordinator
            .replicas_for_key(&key)
            .into_iter()
            .map(|id| id.as_str().to_string())
            .collect();
        distribution.insert(String::from_utf8_lossy(&key).into_owned(), json!(replicas));
    }
    Response::json(200, "OK", &serde_json::Value::Object(distribution))
}

fn health(coordinator: &Arc<Coordinator<SystemClock>>) -> Response {
    Response::json(
        200,
        "OK",
        &json!({
            "nodeId": coordinator.local_id().as_str(),
            "address": coordinator.local_address().to_string(),
            "isAlive": true,
            "dataCount": coordinator.store().len(),
            "peersCount": coordinator.peer_count(),
            "timestamp": coordinator.now_ms(),
        }),
    )
}
