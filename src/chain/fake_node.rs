//! In-process JSON-RPC node and HTTP document server for gateway tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Default)]
struct NodeState {
    /// Canned `result` per JSON-RPC method
    results: HashMap<String, Value>,
    /// GET documents by request path
    documents: HashMap<String, Value>,
    /// JSON-RPC methods received, in arrival order
    calls: Mutex<Vec<String>>,
}

/// Local HTTP server answering JSON-RPC posts and explorer or price lookups
pub(crate) struct FakeNode {
    url: String,
    state: Arc<NodeState>,
}

#[derive(Default)]
pub(crate) struct FakeNodeBuilder {
    state: NodeState,
}

impl FakeNodeBuilder {
    pub(crate) fn result(mut self, method: &str, result: Value) -> Self {
        self.state.results.insert(method.to_string(), result);
        self
    }

    /// Explorer account document
    pub(crate) fn account(self, address: &str, document: Value) -> Self {
        let path = format!("/accounts/{}", address.to_lowercase());
        self.document(&path, document)
    }

    /// Document served for GET requests to `path`, any query string
    pub(crate) fn document(mut self, path: &str, document: Value) -> Self {
        self.state.documents.insert(path.to_string(), document);
        self
    }

    pub(crate) async fn start(self) -> FakeNode {
        let state = Arc::new(self.state);
        let app = Router::new()
            .route("/", post(rpc))
            .fallback(get(document))
            .with_state(state.clone());
        FakeNode {
            url: serve(app).await,
            state,
        }
    }
}

impl FakeNode {
    pub(crate) fn builder() -> FakeNodeBuilder {
        FakeNodeBuilder::default()
    }

    /// Server that accepts every request and never answers
    pub(crate) async fn silent() -> FakeNode {
        let app = Router::new().fallback(hang);
        FakeNode {
            url: serve(app).await,
            state: Arc::new(NodeState::default()),
        }
    }

    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    pub(crate) fn methods(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().clone()
    }
}

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn rpc(State(state): State<Arc<NodeState>>, Json(request): Json<Value>) -> Json<Value> {
    let reply = match request {
        Value::Array(batch) => Value::Array(batch.iter().map(|r| answer(&state, r)).collect()),
        single => answer(&state, &single),
    };
    Json(reply)
}

fn answer(state: &NodeState, request: &Value) -> Value {
    let method = request
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    state.calls.lock().unwrap().push(method.clone());

    match state.results.get(&method) {
        Some(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        None => json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": { "code": -32601, "message": format!("method {} not found", method) }
        }),
    }
}

async fn document(State(state): State<Arc<NodeState>>, uri: Uri) -> Result<Json<Value>, StatusCode> {
    state
        .documents
        .get(uri.path())
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn hang() -> StatusCode {
    std::future::pending().await
}

/// 32-byte ABI word holding `value`, as returned by `eth_call`
pub(crate) fn abi_word(value: u128) -> Value {
    Value::String(format!("0x{:064x}", value))
}

/// Minimal latest-block document; `base_fee` None models a chain without a fee market
pub(crate) fn block(base_fee: Option<u64>) -> Value {
    let zero_hash = format!("0x{}", "0".repeat(64));
    let mut block = json!({
        "hash": format!("0x{}", "1".repeat(64)),
        "parentHash": zero_hash,
        "sha3Uncles": zero_hash,
        "miner": format!("0x{}", "0".repeat(40)),
        "stateRoot": zero_hash,
        "transactionsRoot": zero_hash,
        "receiptsRoot": zero_hash,
        "logsBloom": format!("0x{}", "0".repeat(512)),
        "difficulty": "0x0",
        "number": "0x10",
        "gasLimit": "0x1c9c380",
        "gasUsed": "0x0",
        "timestamp": "0x65000000",
        "extraData": "0x",
        "mixHash": zero_hash,
        "nonce": "0x0000000000000000",
        "uncles": [],
        "transactions": []
    });
    if let Some(base_fee) = base_fee {
        block["baseFeePerGas"] = Value::String(format!("0x{:x}", base_fee));
    }
    block
}
