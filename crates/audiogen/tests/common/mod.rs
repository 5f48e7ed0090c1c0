//! Common test utilities for audiogen tests
//!
//! An ephemeral axum server standing in for the prediction API, the file
//! CDN the outputs are served from, and the model hub.

#![allow(dead_code)]

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub const AUDIO_BYTES: &[u8] = b"RIFF\x24\x00\x00\x00WAVEfmt stub-audio-payload";
pub const HUB_TOKEN: &str = "hf_valid";
pub const HUB_TOKEN_GRANTED: &str = "hf_granted";

/// How the stub answers predictions.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Submission returns `succeeded` with the output URL straight away.
    Immediate,
    /// `processing` for this many status polls, then `succeeded`.
    AfterPolls(usize),
    /// Terminal `failed` with this error text.
    Fail(String),
    /// Succeeds without any output.
    NoOutput,
    /// Submission answers with this status and body.
    Reject(StatusCode, String),
    /// Submission answers 429 with this `retry-after` in seconds.
    RateLimited(u64),
}

pub struct StubState {
    base_url: String,
    behavior: Behavior,
    download_status: StatusCode,
    hits: AtomicUsize,
    polls: AtomicUsize,
    cancels: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
    auth_headers: Mutex<Vec<String>>,
}

impl StubState {
    fn hit(&self, headers: &HeaderMap) {
        self.hits.fetch_add(1, Ordering::SeqCst);
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            self.auth_headers.lock().unwrap().push(auth.to_string());
        }
    }

    fn output_url(&self) -> String {
        format!("{}/files/out.wav", self.base_url)
    }

    fn prediction(&self, id: &str, status: &str) -> Value {
        let output = match (status, &self.behavior) {
            ("succeeded", Behavior::NoOutput) => Value::Null,
            ("succeeded", _) => json!(self.output_url()),
            _ => Value::Null,
        };
        let error = match (status, &self.behavior) {
            ("failed", Behavior::Fail(msg)) => json!(msg),
            _ => Value::Null,
        };
        json!({
            "id": id,
            "status": status,
            "output": output,
            "error": error,
            "urls": {
                "get": format!("{}/v1/predictions/{id}", self.base_url),
                "cancel": format!("{}/v1/predictions/{id}/cancel", self.base_url),
            }
        })
    }
}

/// A stub service on an ephemeral port, shut down on drop.
pub struct StubServer {
    pub url: String,
    state: Arc<StubState>,
    shutdown_token: CancellationToken,
}

impl StubServer {
    pub async fn start(behavior: Behavior) -> Result<Self> {
        Self::start_with_download(behavior, StatusCode::OK).await
    }

    pub async fn start_with_download(behavior: Behavior, download_status: StatusCode) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        let url = format!("http://127.0.0.1:{port}");

        let state = Arc::new(StubState {
            base_url: url.clone(),
            behavior,
            download_status,
            hits: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
            bodies: Mutex::new(Vec::new()),
            auth_headers: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/v1/predictions", post(create_prediction))
            .route("/v1/models/{owner}/{name}/predictions", post(create_prediction))
            .route("/v1/deployments/{owner}/{name}/predictions", post(create_prediction))
            .route("/v1/predictions/{id}", get(get_prediction))
            .route("/v1/predictions/{id}/cancel", post(cancel_prediction))
            .route("/v1/models/{owner}/{name}", get(model_info))
            .route("/files/out.wav", get(download))
            .route("/api/whoami-v2", get(whoami))
            .route("/api/models/{owner}/{name}", get(hub_model))
            .route("/{owner}/{name}/resolve/main/{file}", get(resolve))
            .with_state(state.clone());

        let shutdown_token = CancellationToken::new();
        let token = shutdown_token.clone();
        tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                token.cancelled().await;
            });
            if let Err(e) = server.await {
                eprintln!("Stub server error: {e:?}");
            }
        });

        Ok(Self {
            url,
            state,
            shutdown_token,
        })
    }

    pub fn api_base(&self) -> String {
        format!("{}/v1", self.url)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn polls(&self) -> usize {
        self.state.polls.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.state.cancels.load(Ordering::SeqCst)
    }

    /// JSON bodies received by the submission endpoints.
    pub fn submissions(&self) -> Vec<Value> {
        self.state.bodies.lock().unwrap().clone()
    }

    pub fn auth_headers(&self) -> Vec<String> {
        self.state.auth_headers.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.shutdown_token.cancel();
    }
}

async fn create_prediction(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.hit(&headers);
    state.bodies.lock().unwrap().push(body);

    let status = match &state.behavior {
        Behavior::Immediate | Behavior::NoOutput => "succeeded",
        Behavior::AfterPolls(_) => "starting",
        Behavior::Fail(_) => "failed",
        Behavior::Reject(code, body) => return (*code, body.clone()).into_response(),
        Behavior::RateLimited(secs) => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                [("retry-after", secs.to_string())],
                r#"{"detail": "Request was throttled."}"#,
            )
                .into_response()
        }
    };
    (StatusCode::CREATED, Json(state.prediction("pred-1", status))).into_response()
}

async fn get_prediction(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.hit(&headers);
    let n = state.polls.fetch_add(1, Ordering::SeqCst);
    let status = match &state.behavior {
        Behavior::AfterPolls(pending) if n < *pending => "processing",
        Behavior::Fail(_) => "failed",
        _ => "succeeded",
    };
    Json(state.prediction(&id, status)).into_response()
}

async fn cancel_prediction(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    state.hit(&headers);
    state.cancels.fetch_add(1, Ordering::SeqCst);
    Json(state.prediction(&id, "canceled")).into_response()
}

async fn model_info(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path((owner, name)): Path<(String, String)>,
) -> Response {
    state.hit(&headers);
    Json(json!({
        "owner": owner,
        "name": name,
        "description": "stub model",
        "latest_version": {"id": "v-latest"}
    }))
    .into_response()
}

async fn download(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.hit(&headers);
    if state.download_status == StatusCode::OK {
        (StatusCode::OK, AUDIO_BYTES.to_vec()).into_response()
    } else {
        (state.download_status, "no such file").into_response()
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

async fn whoami(State(state): State<Arc<StubState>>, headers: HeaderMap) -> Response {
    state.hit(&headers);
    match bearer(&headers) {
        Some(HUB_TOKEN) | Some(HUB_TOKEN_GRANTED) => {
            Json(json!({"name": "stub-user", "type": "user"})).into_response()
        }
        _ => (StatusCode::UNAUTHORIZED, "invalid token").into_response(),
    }
}

async fn hub_model(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path((owner, name)): Path<(String, String)>,
) -> Response {
    state.hit(&headers);
    Json(json!({"id": format!("{owner}/{name}"), "gated": "manual"})).into_response()
}

async fn resolve(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path((_owner, _name, file)): Path<(String, String, String)>,
) -> Response {
    state.hit(&headers);
    match bearer(&headers) {
        Some(HUB_TOKEN_GRANTED) if file == "model_config.json" => StatusCode::OK.into_response(),
        Some(HUB_TOKEN_GRANTED) => StatusCode::NOT_FOUND.into_response(),
        Some(_) => StatusCode::FORBIDDEN.into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}
