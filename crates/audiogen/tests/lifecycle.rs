//! Controller behaviour on a simulated clock.
//!
//! The services here are in-process so the paused tokio clock only ever
//! advances through the controller's own sleeps and deadlines.

use async_trait::async_trait;
use audiogen::{
    Error, Fetcher, GenerationRequest, ModelRef, OutputLayout, Pipeline, Prediction,
    PredictionController, PredictionId, PredictionService, PredictionStatus, Result,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::Instant;

fn prediction(id: &str, status: PredictionStatus) -> Prediction {
    Prediction {
        id: PredictionId::from(id),
        status,
        output: None,
        error: None,
        logs: None,
    }
}

fn model() -> ModelRef {
    ModelRef::parse("mgysel/stable-audio-open:8465bf", false).unwrap()
}

fn drum_request() -> GenerationRequest {
    GenerationRequest::new("A quick drum beat", 1).unwrap()
}

/// Succeeds on submission with a fixed URL.
struct Instant200;

#[async_trait]
impl PredictionService for Instant200 {
    async fn submit(&self, _model: &ModelRef, _request: &GenerationRequest) -> Result<Prediction> {
        let mut p = prediction("fast", PredictionStatus::Succeeded);
        p.output = Some(json!("https://cdn.example/fast.wav"));
        Ok(p)
    }

    async fn get(&self, id: &PredictionId) -> Result<Prediction> {
        Ok(prediction(id.as_str(), PredictionStatus::Succeeded))
    }

    async fn cancel(&self, _id: &PredictionId) -> Result<()> {
        Ok(())
    }
}

/// Accepts the job and then never finishes it.
#[derive(Default)]
struct NeverResolves {
    submits: AtomicUsize,
    cancels: AtomicUsize,
    /// Once set, new submissions succeed immediately.
    recover: AtomicBool,
}

#[async_trait]
impl PredictionService for NeverResolves {
    async fn submit(&self, _model: &ModelRef, _request: &GenerationRequest) -> Result<Prediction> {
        let n = self.submits.fetch_add(1, Ordering::SeqCst);
        if self.recover.load(Ordering::SeqCst) {
            let mut p = prediction(&format!("p{n}"), PredictionStatus::Succeeded);
            p.output = Some(json!("https://cdn.example/late.wav"));
            return Ok(p);
        }
        Ok(prediction(&format!("p{n}"), PredictionStatus::Starting))
    }

    async fn get(&self, id: &PredictionId) -> Result<Prediction> {
        Ok(prediction(id.as_str(), PredictionStatus::Processing))
    }

    async fn cancel(&self, _id: &PredictionId) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Submission itself hangs forever.
struct HangingSubmit {
    cancels: AtomicUsize,
}

#[async_trait]
impl PredictionService for HangingSubmit {
    async fn submit(&self, _model: &ModelRef, _request: &GenerationRequest) -> Result<Prediction> {
        std::future::pending().await
    }

    async fn get(&self, id: &PredictionId) -> Result<Prediction> {
        Ok(prediction(id.as_str(), PredictionStatus::Processing))
    }

    async fn cancel(&self, _id: &PredictionId) -> Result<()> {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails the job after one poll.
struct FailsRemotely;

#[async_trait]
impl PredictionService for FailsRemotely {
    async fn submit(&self, _model: &ModelRef, _request: &GenerationRequest) -> Result<Prediction> {
        Ok(prediction("bad", PredictionStatus::Processing))
    }

    async fn get(&self, id: &PredictionId) -> Result<Prediction> {
        let mut p = prediction(id.as_str(), PredictionStatus::Failed);
        p.error = Some(json!("CUDA out of memory"));
        Ok(p)
    }

    async fn cancel(&self, _id: &PredictionId) -> Result<()> {
        Ok(())
    }
}

/// Cancel hangs; the controller must not wait on it past its grace period.
struct StuckCancel;

#[async_trait]
impl PredictionService for StuckCancel {
    async fn submit(&self, _model: &ModelRef, _request: &GenerationRequest) -> Result<Prediction> {
        Ok(prediction("stuck", PredictionStatus::Starting))
    }

    async fn get(&self, id: &PredictionId) -> Result<Prediction> {
        Ok(prediction(id.as_str(), PredictionStatus::Processing))
    }

    async fn cancel(&self, _id: &PredictionId) -> Result<()> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn immediate_success_returns_url_without_polling() {
    let controller = PredictionController::new(Arc::new(Instant200), model());

    let start = Instant::now();
    let result = controller
        .run(&drum_request(), Duration::from_secs(600))
        .await
        .unwrap();

    assert_eq!(result.url.as_deref(), Some("https://cdn.example/fast.wav"));
    assert_eq!(result.id.as_str(), "fast");
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn unbounded_timeout_runs_normally() {
    let controller = PredictionController::new(Arc::new(Instant200), model());

    let result = controller
        .run(&drum_request(), Duration::from_secs(u64::MAX))
        .await
        .unwrap();

    assert_eq!(result.url.as_deref(), Some("https://cdn.example/fast.wav"));
}

#[tokio::test(start_paused = true)]
async fn unbounded_timeout_keeps_polling() {
    let service = Arc::new(NeverResolves::default());
    let controller = PredictionController::new(service.clone(), model());

    let first = tokio::time::timeout(
        Duration::from_secs(60),
        controller.run(&drum_request(), Duration::MAX),
    )
    .await;
    assert!(first.is_err(), "a huge deadline must not fire early");
    assert_eq!(service.cancels.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn never_resolving_job_times_out_at_the_deadline() {
    let service = Arc::new(NeverResolves::default());
    let controller = PredictionController::new(service.clone(), model())
        .with_poll_interval(Duration::from_millis(500));

    let start = Instant::now();
    let err = controller
        .run(&drum_request(), Duration::from_secs(2))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(d) if d == Duration::from_secs(2)), "got {err:?}");
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert_eq!(service.cancels.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn a_timed_out_call_does_not_bar_the_next_one() {
    let service = Arc::new(NeverResolves::default());
    let controller = PredictionController::new(service.clone(), model());

    let first = controller.run(&drum_request(), Duration::from_secs(2)).await;
    assert!(matches!(first, Err(Error::Timeout(_))));

    service.recover.store(true, Ordering::SeqCst);
    let second = controller
        .run(&drum_request(), Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(second.url.as_deref(), Some("https://cdn.example/late.wav"));
}

#[tokio::test(start_paused = true)]
async fn hanging_submission_times_out_without_cancel() {
    let service = Arc::new(HangingSubmit {
        cancels: AtomicUsize::new(0),
    });
    let controller = PredictionController::new(service.clone(), model());

    let start = Instant::now();
    let err = controller
        .run(&drum_request(), Duration::from_secs(3))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(start.elapsed(), Duration::from_secs(3));
    assert_eq!(service.cancels.load(Ordering::SeqCst), 0, "no handle, nothing to cancel");
}

#[tokio::test(start_paused = true)]
async fn remote_failure_is_surfaced_verbatim() {
    let controller = PredictionController::new(Arc::new(FailsRemotely), model());

    let err = controller
        .run(&drum_request(), Duration::from_secs(600))
        .await
        .unwrap_err();

    match err {
        Error::Remote(msg) => assert_eq!(msg, "CUDA out of memory"),
        other => panic!("expected remote failure, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stuck_cancel_still_reports_timeout() {
    let controller = PredictionController::new(Arc::new(StuckCancel), model());

    let start = Instant::now();
    let err = controller
        .run(&drum_request(), Duration::from_secs(2))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
    assert!(start.elapsed() < Duration::from_secs(10), "cancel grace is bounded");
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_keep_their_own_deadlines() {
    let slow = PredictionController::new(Arc::new(NeverResolves::default()), model());
    let fast = PredictionController::new(Arc::new(Instant200), model());
    let request = drum_request();

    let (slow_result, fast_result) = tokio::join!(
        slow.run(&request, Duration::from_secs(5)),
        fast.run(&request, Duration::from_secs(1)),
    );

    assert!(matches!(slow_result, Err(Error::Timeout(d)) if d == Duration::from_secs(5)));
    assert!(fast_result.is_ok());
}

#[tokio::test(start_paused = true)]
async fn pipeline_timeout_writes_nothing() {
    let temp = TempDir::new().unwrap();
    let layout = OutputLayout::new(temp.path().join("generated_audio"), "generated_audio_{duration}s.wav");
    let controller = PredictionController::new(Arc::new(NeverResolves::default()), model());
    let pipeline = Pipeline::new(controller, Fetcher::new().unwrap(), layout.clone(), Duration::from_secs(2));

    let start = Instant::now();
    let err = pipeline.generate(&drum_request()).await.unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert!(!layout.path_for(&drum_request()).exists());
    assert!(!layout.dir().exists());
}
