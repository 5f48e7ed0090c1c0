//! Hosted prediction API client.
//!
//! Speaks the Replicate-style HTTP API: create a prediction, poll it by id,
//! cancel it. Everything else (waiting, deadlines) lives in the controller.

use crate::credentials::ApiToken;
use crate::error::{Error, Result};
use crate::request::{GenerationRequest, ModelRef};
use crate::types::{Prediction, PredictionId};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Per-request cap. The overall wait is bounded by the controller deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A remote execution service that runs predictions.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Submit a job. The returned prediction may already be terminal.
    async fn submit(&self, model: &ModelRef, request: &GenerationRequest) -> Result<Prediction>;

    /// Fetch the current state of a job.
    async fn get(&self, id: &PredictionId) -> Result<Prediction>;

    /// Ask the service to stop a job. Best effort; the service may ignore it.
    async fn cancel(&self, id: &PredictionId) -> Result<()>;
}

/// Model metadata from `GET /models/{owner}/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub latest_version: Option<ModelVersion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelVersion {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

pub struct ReplicateClient {
    api_base: String,
    token: ApiToken,
    client: reqwest::Client,
}

impl ReplicateClient {
    pub fn new(api_base: impl Into<String>, token: ApiToken) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("audiogen/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(self.token.expose())
    }

    /// Look up a model, used as a connectivity and credential check.
    #[tracing::instrument(name = "remote.model_info", skip(self))]
    pub async fn model_info(&self, owner: &str, name: &str) -> Result<ModelInfo> {
        let builder = self.authorized(self.client.get(self.url(&format!("models/{owner}/{name}"))));
        let resp = send(builder, "model lookup").await?;
        Ok(resp.json().await?)
    }
}

/// Send a request and turn non-success statuses into `Error::Remote`.
async fn send(builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
    let resp = match builder.send().await {
        Ok(r) => r,
        Err(e) if e.is_connect() => {
            return Err(Error::Remote(format!("{what}: service unreachable: {e}")))
        }
        Err(e) => return Err(e.into()),
    };

    let status = resp.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(5);

        let error_body = resp
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read error body>".to_string());

        tracing::warn!(retry_after, error_body = ?error_body, "Prediction API rate limited");
        return Err(Error::Remote(format!(
            "{what}: rate limited, retry after {retry_after}s"
        )));
    }

    if !status.is_success() {
        let error_body = resp
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read error body>".to_string());
        return Err(Error::Remote(format!("{what}: HTTP {status}: {error_body}")));
    }

    Ok(resp)
}

#[async_trait]
impl PredictionService for ReplicateClient {
    #[tracing::instrument(name = "remote.submit", skip(self, request), fields(model = %model))]
    async fn submit(&self, model: &ModelRef, request: &GenerationRequest) -> Result<Prediction> {
        let builder = self
            .authorized(self.client.post(self.url(&model.submit_path())))
            .json(&model.submit_body(request));

        let resp = send(builder, "submit").await?;
        let prediction: Prediction = resp.json().await?;

        tracing::debug!(
            prediction.id = %prediction.id,
            status = prediction.status.as_str(),
            "Prediction created"
        );
        Ok(prediction)
    }

    #[tracing::instrument(name = "remote.get", skip(self), fields(prediction.id = %id))]
    async fn get(&self, id: &PredictionId) -> Result<Prediction> {
        let builder = self.authorized(self.client.get(self.url(&format!("predictions/{id}"))));
        let resp = send(builder, "status").await?;
        Ok(resp.json().await?)
    }

    #[tracing::instrument(name = "remote.cancel", skip(self), fields(prediction.id = %id))]
    async fn cancel(&self, id: &PredictionId) -> Result<()> {
        let builder =
            self.authorized(self.client.post(self.url(&format!("predictions/{id}/cancel"))));
        send(builder, "cancel").await?;
        Ok(())
    }
}
