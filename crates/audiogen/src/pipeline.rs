//! The remote generation pipeline: controller, fetcher, persister in sequence.

use crate::credentials::ApiToken;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::lifecycle::PredictionController;
use crate::persist::OutputLayout;
use crate::remote::ReplicateClient;
use crate::request::{GenerationRequest, ModelRef};
use genconf::AudiogenConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A file produced by a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAudio {
    pub path: PathBuf,
    pub url: String,
    pub bytes: usize,
}

pub struct Pipeline {
    controller: PredictionController,
    fetcher: Fetcher,
    layout: OutputLayout,
    timeout: Duration,
}

impl Pipeline {
    pub fn new(
        controller: PredictionController,
        fetcher: Fetcher,
        layout: OutputLayout,
        timeout: Duration,
    ) -> Self {
        Self {
            controller,
            fetcher,
            layout,
            timeout,
        }
    }

    /// Build the hosted-API pipeline described by `config`, authenticated with `token`.
    pub fn from_config(config: &AudiogenConfig, token: ApiToken) -> Result<Self> {
        let model = ModelRef::parse(&config.remote.model, config.remote.deployment)?;
        let client = ReplicateClient::new(config.remote.api_base.clone(), token)?;
        let controller = PredictionController::new(Arc::new(client), model)
            .with_poll_interval(config.poll_interval());

        Ok(Self::new(
            controller,
            Fetcher::new()?,
            OutputLayout::from_config(&config.output),
            config.timeout(),
        ))
    }

    /// Resolve the API token through `lookup` and build from `config`.
    /// A missing token fails here, before any client exists.
    pub fn connect<F>(config: &AudiogenConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = ApiToken::from_lookup(lookup)?;
        Self::from_config(config, token)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_layout(mut self, layout: OutputLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one request end to end. Nothing is written unless every earlier
    /// step succeeded.
    #[tracing::instrument(
        name = "pipeline.generate",
        skip(self, request),
        fields(description = request.description(), duration = request.duration())
    )]
    pub async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAudio> {
        let result = self.controller.run(request, self.timeout).await?;
        let url = result.url.ok_or(Error::NoOutput(result.id))?;

        let body = self.fetcher.fetch(&url).await?;
        let path = self.layout.write(request, &body)?;

        tracing::info!(path = %path.display(), bytes = body.len(), "Audio saved");
        Ok(GeneratedAudio {
            path,
            url,
            bytes: body.len(),
        })
    }
}
