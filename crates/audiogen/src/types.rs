//! Prediction handles, remote status, and results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque identifier of one in-flight remote job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PredictionId(String);

impl PredictionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PredictionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PredictionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Status string reported by the prediction API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
}

impl PredictionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }
}

/// A prediction as returned by submit and status calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: PredictionId,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub logs: Option<String>,
}

impl Prediction {
    /// Error text reported by the service, verbatim when it is a string.
    pub fn error_message(&self) -> String {
        match &self.error {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => format!("prediction {} {}", self.id, self.status.as_str()),
            Some(other) => other.to_string(),
        }
    }

    pub fn result(&self) -> PredictionResult {
        PredictionResult::from_output(self.id.clone(), self.output.as_ref())
    }
}

/// Outcome payload of a succeeded prediction: the audio URL, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictionResult {
    pub id: PredictionId,
    pub url: Option<String>,
}

impl PredictionResult {
    /// A string output is the URL; for a list of outputs the first string element wins.
    pub fn from_output(id: PredictionId, output: Option<&Value>) -> Self {
        let url = match output {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .find(|s| !s.is_empty())
                .map(str::to_string),
            _ => None,
        };
        Self { id, url }
    }
}

/// Where one controller call is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Idle,
    Submitted,
    Succeeded,
    Failed,
    TimedOut,
}

impl LifecyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            LifecyclePhase::Idle => "idle",
            LifecyclePhase::Submitted => "submitted",
            LifecyclePhase::Succeeded => "succeeded",
            LifecyclePhase::Failed => "failed",
            LifecyclePhase::TimedOut => "timed_out",
        }
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
