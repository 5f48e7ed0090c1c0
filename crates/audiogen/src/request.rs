//! Request builder: validated generation input and how it is addressed remotely.

use crate::error::{Error, Result};
use serde::Serialize;
use serde_json::{json, Value};

/// Longest clip the deployed model accepts, in seconds.
pub const MAX_DURATION_SECS: u32 = 120;

/// What to generate. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationRequest {
    description: String,
    duration: u32,
}

impl GenerationRequest {
    pub fn new(description: impl Into<String>, duration: u32) -> Result<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(Error::InvalidRequest("description must not be empty".into()));
        }
        if duration == 0 || duration > MAX_DURATION_SECS {
            return Err(Error::InvalidRequest(format!(
                "duration must be between 1 and {MAX_DURATION_SECS} seconds, got {duration}"
            )));
        }
        Ok(Self { description, duration })
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Requested length in whole seconds.
    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Filesystem-safe form of the description: lower-case alphanumerics joined by `_`.
    pub fn slug(&self) -> String {
        let mut slug = String::with_capacity(self.description.len());
        let mut pending_sep = false;
        for c in self.description.chars() {
            if c.is_ascii_alphanumeric() {
                if pending_sep && !slug.is_empty() {
                    slug.push('_');
                }
                pending_sep = false;
                slug.push(c.to_ascii_lowercase());
            } else {
                pending_sep = true;
            }
        }
        if slug.is_empty() {
            slug.push_str("audio");
        }
        slug
    }

    /// The model input payload: `{"description": ..., "duration": ...}`.
    pub fn to_input(&self) -> Value {
        json!({
            "description": self.description,
            "duration": self.duration,
        })
    }
}

/// How a prediction is addressed on the hosted API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelRef {
    /// A pinned model version.
    Version {
        owner: String,
        name: String,
        version: String,
    },
    /// The model's current default version.
    Model { owner: String, name: String },
    /// A deployment fronting the model.
    Deployment { owner: String, name: String },
}

impl ModelRef {
    /// Parse `owner/name` or `owner/name:version`. With `deployment` set the
    /// reference must not carry a version.
    pub fn parse(reference: &str, deployment: bool) -> Result<Self> {
        let invalid = || Error::InvalidModelRef(reference.to_string());

        let (path, version) = match reference.split_once(':') {
            Some((path, version)) => (path, Some(version)),
            None => (reference, None),
        };
        let (owner, name) = path.split_once('/').ok_or_else(invalid)?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        let owner = owner.to_string();
        let name = name.to_string();
        match (version, deployment) {
            (Some(v), false) if !v.is_empty() => Ok(ModelRef::Version {
                owner,
                name,
                version: v.to_string(),
            }),
            (None, false) => Ok(ModelRef::Model { owner, name }),
            (None, true) => Ok(ModelRef::Deployment { owner, name }),
            _ => Err(invalid()),
        }
    }

    /// Submission path relative to the API base.
    pub fn submit_path(&self) -> String {
        match self {
            ModelRef::Version { .. } => "predictions".to_string(),
            ModelRef::Model { owner, name } => format!("models/{owner}/{name}/predictions"),
            ModelRef::Deployment { owner, name } => {
                format!("deployments/{owner}/{name}/predictions")
            }
        }
    }

    /// Full submission body for `request`.
    pub fn submit_body(&self, request: &GenerationRequest) -> Value {
        match self {
            ModelRef::Version { version, .. } => json!({
                "version": version,
                "input": request.to_input(),
            }),
            ModelRef::Model { .. } | ModelRef::Deployment { .. } => json!({
                "input": request.to_input(),
            }),
        }
    }

    pub fn owner_and_name(&self) -> (&str, &str) {
        match self {
            ModelRef::Version { owner, name, .. }
            | ModelRef::Model { owner, name }
            | ModelRef::Deployment { owner, name } => (owner, name),
        }
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelRef::Version { owner, name, version } => write!(f, "{owner}/{name}:{version}"),
            ModelRef::Model { owner, name } => write!(f, "{owner}/{name}"),
            ModelRef::Deployment { owner, name } => write!(f, "deployment {owner}/{name}"),
        }
    }
}
