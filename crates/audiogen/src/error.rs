//! Error taxonomy shared by the remote and local paths.

use crate::types::PredictionId;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required credential is absent. Raised before any network call.
    #[error("{0} is not set; export it or add it to a .env file")]
    MissingCredential(&'static str),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid model reference {0:?}: expected owner/name or owner/name:version")]
    InvalidModelRef(String),

    /// The remote service rejected or failed the job. Message is passed through verbatim.
    #[error("remote prediction failed: {0}")]
    Remote(String),

    /// The local deadline elapsed before the remote job resolved.
    #[error("prediction timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("prediction {0} succeeded but produced no output")]
    NoOutput(PredictionId),

    #[error("download failed with HTTP {status}: {url}")]
    Download { status: u16, url: String },

    /// Setup of the local engine failed; the engine must not accept requests.
    #[error("local setup failed: {0}")]
    Setup(String),

    #[error("access to gated model {model} denied (HTTP {status}); request access on the hub first")]
    GatedModel { model: String, status: u16 },

    #[error("local inference failed: {0}")]
    Local(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid JSON from service: {0}")]
    Json(#[from] serde_json::Error),

    #[error("WAV encoding failed: {0}")]
    Wav(#[from] hound::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether resubmitting a fresh request could succeed without a config change.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Timeout(_) | Error::Remote(_) | Error::Download { .. } | Error::Http(_)
        )
    }
}
