//! audiogen - text-to-audio generation against a hosted prediction API,
//! with a hub-authenticated local engine alongside.
//!
//! Library exposing the pipeline pieces for the CLI and for tests.

pub mod credentials;
pub mod error;
pub mod fetch;
pub mod hub;
pub mod lifecycle;
pub mod local;
pub mod persist;
pub mod pipeline;
pub mod remote;
pub mod request;
pub mod types;

pub use credentials::{ApiToken, HubToken};
pub use error::{Error, Result};
pub use fetch::Fetcher;
pub use hub::HubClient;
pub use lifecycle::PredictionController;
pub use local::{LocalModel, LocalRuntime, ToneModel, Waveform};
pub use persist::OutputLayout;
pub use pipeline::{GeneratedAudio, Pipeline};
pub use remote::{PredictionService, ReplicateClient};
pub use request::{GenerationRequest, ModelRef};
pub use types::{LifecyclePhase, Prediction, PredictionId, PredictionResult, PredictionStatus};
