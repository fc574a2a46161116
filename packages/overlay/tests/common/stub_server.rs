//! Local explanation API that replays scripted event streams.
//!
//! Each script is keyed by the request's `text`, so one server can answer
//! a slow request and a fast one side by side.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use explain_stream::{encode_frame, DonePayload, StreamFrame};
use futures::StreamExt;
use overlay::consumer::EXTENSION_TOKEN_HEADER;
use overlay::{CredentialStore, ExplainClient, MemoryStore, StoredCredentials};
use serde_json::{json, Value};

pub const VALID_TOKEN: &str = "paired-token";

#[derive(Debug, Clone)]
pub enum Script {
    /// Raw wire chunks, each sent after its delay
    Chunks(Vec<(Duration, String)>),
    Status(StatusCode, Value),
}

impl Script {
    /// One chunk per encoded frame, terminated by a done frame without json.
    pub fn deltas(deltas: &[&str]) -> Self {
        let tick = Duration::from_millis(5);
        let mut chunks: Vec<(Duration, String)> = deltas
            .iter()
            .map(|d| (tick, encode_frame(&StreamFrame::delta(*d))))
            .collect();
        chunks.push((tick, encode_frame(&StreamFrame::Done(DonePayload::default()))));
        Script::Chunks(chunks)
    }

    /// One delta, then silence for far longer than any test runs.
    pub fn stalled(first: &str) -> Self {
        Script::Chunks(vec![
            (Duration::ZERO, encode_frame(&StreamFrame::delta(first))),
            (Duration::from_secs(30), encode_frame(&StreamFrame::delta("never"))),
        ])
    }
}

#[derive(Clone, Default)]
struct StubState {
    scripts: Arc<HashMap<String, Script>>,
    received: Arc<Mutex<Vec<Value>>>,
}

pub struct StubServer {
    pub base: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl StubServer {
    pub async fn start(scripts: Vec<(&str, Script)>) -> Self {
        let state = StubState {
            scripts: Arc::new(
                scripts
                    .into_iter()
                    .map(|(text, script)| (text.to_string(), script))
                    .collect(),
            ),
            received: Arc::default(),
        };
        let received = state.received.clone();

        let app = Router::new()
            .route("/api/explain", post(explain))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub server");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server");
        });

        Self {
            base: format!("http://{}", addr),
            received,
        }
    }

    pub fn client(&self) -> ExplainClient {
        ExplainClient::new(&self.base).expect("client")
    }

    /// Bodies of every authenticated request, in arrival order.
    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

async fn explain(State(state): State<StubState>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    let token = headers
        .get(EXTENSION_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if token != Some(VALID_TOKEN) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response();
    }

    state.received.lock().unwrap().push(body.clone());
    let text = body["text"].as_str().unwrap_or_default().to_string();

    match state.scripts.get(&text).cloned() {
        Some(Script::Chunks(chunks)) => {
            let stream = futures::stream::iter(chunks).then(|(delay, chunk)| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, Infallible>(chunk)
            });
            (
                [(header::CONTENT_TYPE, explain_stream::CONTENT_TYPE)],
                Body::from_stream(stream),
            )
                .into_response()
        }
        Some(Script::Status(status, body)) => (status, Json(body)).into_response(),
        None => (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid payload"}))).into_response(),
    }
}

/// Storage already holding a paired credential with `token`.
pub async fn paired_storage(token: &str) -> Arc<MemoryStore> {
    let storage = Arc::new(MemoryStore::new());
    CredentialStore::new(storage.clone())
        .save(&StoredCredentials::new(token))
        .await
        .expect("save credentials");
    storage
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
