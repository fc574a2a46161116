//! In-process test harness.
//!
//! Builds the real router over mock dependencies and drives it with
//! `tower::ServiceExt::oneshot`, so no socket or external service is needed.

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use explain_stream::{FrameDecoder, StreamFrame};
use serde_json::Value;
use server_core::domains::auth::SESSION_COOKIE;
use server_core::kernel::TestDependencies;
use server_core::server::build_app;
use server_core::server::middleware::EXTENSION_TOKEN_HEADER;
use tower::ServiceExt;

/// How a test request authenticates.
#[derive(Debug, Clone)]
pub enum Credential {
    Anonymous,
    Extension(String),
    Session(String),
}

pub struct TestHarness {
    pub deps: TestDependencies,
    app: Router,
}

impl TestHarness {
    pub fn new(deps: TestDependencies) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let app = build_app(deps.server_deps(), &[]);
        Self { deps, app }
    }

    /// Credential for a paired extension belonging to `user_id`.
    pub fn extension(&self, user_id: &str) -> Credential {
        Credential::Extension(self.deps.extension_token(user_id))
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn post_json(&self, path: &str, body: &Value, credential: Credential) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json");

        builder = match credential {
            Credential::Anonymous => builder,
            Credential::Extension(token) => builder.header(EXTENSION_TOKEN_HEADER, token),
            Credential::Session(token) => {
                builder.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, token))
            }
        };

        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn get(&self, path: &str) -> Response<Body> {
        self.send(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
    }
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read")
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = body_bytes(response).await;
    (status, serde_json::from_slice(&bytes).expect("JSON body"))
}

/// Decode a full event-stream body into frames.
pub async fn body_frames(response: Response<Body>) -> Vec<StreamFrame> {
    let bytes = body_bytes(response).await;
    let mut decoder = FrameDecoder::new();
    let mut frames = decoder.push(&bytes);
    frames.extend(decoder.finish());
    frames
}
