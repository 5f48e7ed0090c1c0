//! Bearer credentials. Resolved once at the edge and injected into clients.

use crate::error::{Error, Result};

pub const API_TOKEN_VAR: &str = "REPLICATE_API_TOKEN";

/// Hub token variables, in lookup order.
pub const HUB_TOKEN_VARS: [&str; 3] = ["HUGGING_FACE_HUB_TOKEN", "HF_TOKEN", "HUGGINGFACE_HUB_TOKEN"];

fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(10).collect();
    format!("{prefix}...")
}

/// Token for the hosted prediction API.
#[derive(Clone)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::MissingCredential(API_TOKEN_VAR));
        }
        Ok(Self(token.trim().to_string()))
    }

    /// Resolve from `lookup` (usually the process environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup(API_TOKEN_VAR)
            .ok_or(Error::MissingCredential(API_TOKEN_VAR))
            .and_then(Self::new)
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiToken({})", redact(&self.0))
    }
}

impl std::fmt::Display for ApiToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&redact(&self.0))
    }
}

/// Token for the model hub, plus the variable it came from.
#[derive(Clone)]
pub struct HubToken {
    token: String,
    source: &'static str,
}

impl HubToken {
    pub fn new(token: impl Into<String>, source: &'static str) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(Error::MissingCredential(HUB_TOKEN_VARS[0]));
        }
        Ok(Self {
            token: token.trim().to_string(),
            source,
        })
    }

    /// First non-empty variable in [`HUB_TOKEN_VARS`] wins.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        HUB_TOKEN_VARS
            .iter()
            .find_map(|var| {
                lookup(var)
                    .filter(|v| !v.trim().is_empty())
                    .map(|v| (v, *var))
            })
            .ok_or(Error::MissingCredential(HUB_TOKEN_VARS[0]))
            .and_then(|(token, var)| Self::new(token, var))
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn expose(&self) -> &str {
        &self.token
    }

    /// Name of the variable the token was read from.
    pub fn source(&self) -> &'static str {
        self.source
    }
}

impl std::fmt::Debug for HubToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HubToken({} from {})", redact(&self.token), self.source)
    }
}

impl std::fmt::Display for HubToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&redact(&self.token))
    }
}
