//! Prediction lifecycle controller: submit, wait under a deadline, report.

use crate::error::{Error, Result};
use crate::remote::PredictionService;
use crate::request::{GenerationRequest, ModelRef};
use crate::types::{LifecyclePhase, Prediction, PredictionId, PredictionResult, PredictionStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn, Span};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

/// Shortest poll interval accepted; smaller values are raised to this.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a best-effort cancel may take after the deadline has passed.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Stand-in deadline for timeouts too large to add to the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Runs one prediction per call against a [`PredictionService`].
///
/// Each call owns its own deadline, so concurrent calls on the same
/// controller never interfere with each other.
#[derive(Clone)]
pub struct PredictionController {
    service: Arc<dyn PredictionService>,
    model: ModelRef,
    poll_interval: Duration,
}

impl PredictionController {
    pub fn new(service: Arc<dyn PredictionService>, model: ModelRef) -> Self {
        Self {
            service,
            model,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Set the status poll interval, raised to at least [`MIN_POLL_INTERVAL`].
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Submit `request` and wait for a terminal state.
    ///
    /// The deadline covers submission and waiting together. When it elapses
    /// after the job was accepted, a cancel is sent and [`Error::Timeout`] is
    /// returned; the cancel outcome never changes that error.
    #[tracing::instrument(
        name = "prediction.run",
        skip(self, request),
        fields(
            model = %self.model,
            duration = request.duration(),
            timeout_secs = timeout.as_secs(),
            prediction.id = tracing::field::Empty,
            prediction.phase = LifecyclePhase::Idle.as_str(),
        )
    )]
    pub async fn run(&self, request: &GenerationRequest, timeout: Duration) -> Result<PredictionResult> {
        let now = Instant::now();
        let deadline = now.checked_add(timeout).unwrap_or(now + FAR_FUTURE);

        let submitted =
            match tokio::time::timeout_at(deadline, self.service.submit(&self.model, request)).await {
                Ok(Ok(prediction)) => prediction,
                Ok(Err(e)) => {
                    record_phase(LifecyclePhase::Failed);
                    error!(error = %e, "Prediction submission failed");
                    return Err(e);
                }
                Err(_) => {
                    record_phase(LifecyclePhase::TimedOut);
                    warn!("Prediction timed out before submission was accepted");
                    return Err(Error::Timeout(timeout));
                }
            };

        let id = submitted.id.clone();
        Span::current().record("prediction.id", id.as_str());
        record_phase(LifecyclePhase::Submitted);
        info!(status = submitted.status.as_str(), "Prediction submitted");

        match tokio::time::timeout_at(deadline, self.wait(submitted)).await {
            Ok(Ok(prediction)) => {
                record_phase(LifecyclePhase::Succeeded);
                let result = prediction.result();
                info!(has_output = result.url.is_some(), "Prediction succeeded");
                Ok(result)
            }
            Ok(Err(e)) => {
                record_phase(LifecyclePhase::Failed);
                error!(error = %e, "Prediction failed");
                Err(e)
            }
            Err(_) => {
                record_phase(LifecyclePhase::TimedOut);
                warn!("Prediction timed out, cancelling");
                self.cancel_best_effort(&id).await;
                Err(Error::Timeout(timeout))
            }
        }
    }

    async fn wait(&self, mut prediction: Prediction) -> Result<Prediction> {
        loop {
            match prediction.status {
                PredictionStatus::Succeeded => return Ok(prediction),
                PredictionStatus::Failed | PredictionStatus::Canceled => {
                    return Err(Error::Remote(prediction.error_message()))
                }
                PredictionStatus::Starting | PredictionStatus::Processing => {
                    tokio::time::sleep(self.poll_interval).await;
                    prediction = self.service.get(&prediction.id).await?;
                    debug!(status = prediction.status.as_str(), "Polled prediction");
                }
            }
        }
    }

    async fn cancel_best_effort(&self, id: &PredictionId) {
        match tokio::time::timeout(CANCEL_GRACE, self.service.cancel(id)).await {
            Ok(Ok(())) => debug!(prediction.id = %id, "Cancel acknowledged"),
            Ok(Err(e)) => warn!(prediction.id = %id, error = %e, "Cancel failed"),
            Err(_) => warn!(prediction.id = %id, "Cancel did not complete in time"),
        }
    }
}

fn record_phase(phase: LifecyclePhase) {
    Span::current().record("prediction.phase", phase.as_str());
}
