//! Model hub client: identity check and gated-model access probes.

use crate::credentials::HubToken;
use crate::error::{Error, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

pub const HUB_BASE_URL: &str = "https://huggingface.co";

const HUB_TIMEOUT: Duration = Duration::from_secs(30);

/// Account behind a hub token.
#[derive(Debug, Clone, Deserialize)]
pub struct HubUser {
    pub name: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HubModelInfo {
    pub id: String,
    /// `None` for public models, otherwise the gating mode (`auto`, `manual`).
    #[serde(default, deserialize_with = "deserialize_gated")]
    pub gated: Option<String>,
}

impl HubModelInfo {
    pub fn is_gated(&self) -> bool {
        self.gated.is_some()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawGated {
    Flag(bool),
    Mode(String),
}

fn deserialize_gated<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<RawGated>::deserialize(deserializer)? {
        None | Some(RawGated::Flag(false)) => None,
        Some(RawGated::Flag(true)) => Some("true".to_string()),
        Some(RawGated::Mode(mode)) => Some(mode),
    })
}

pub struct HubClient {
    endpoint: String,
    token: HubToken,
    client: reqwest::Client,
}

impl HubClient {
    pub fn new(endpoint: impl Into<String>, token: HubToken) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(HUB_TIMEOUT)
            .user_agent(concat!("audiogen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    pub fn token(&self) -> &HubToken {
        &self.token
    }

    #[tracing::instrument(name = "hub.whoami", skip(self))]
    pub async fn whoami(&self) -> Result<HubUser> {
        let url = format!("{}/api/whoami-v2", self.endpoint);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.token.expose())
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(Error::Remote(format!(
                "hub rejected token from {}",
                self.token.source()
            )));
        }
        if !status.is_success() {
            return Err(Error::Remote(format!("hub whoami: HTTP {status}")));
        }
        let user: HubUser = resp.json().await?;
        tracing::debug!(user = %user.name, "Hub identity confirmed");
        Ok(user)
    }

    #[tracing::instrument(name = "hub.model_info", skip(self))]
    pub async fn model_info(&self, model_id: &str) -> Result<HubModelInfo> {
        let url = format!("{}/api/models/{}", self.endpoint, model_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(self.token.expose())
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(resp.json().await?),
            StatusCode::NOT_FOUND => Err(Error::Remote(format!("model {model_id} not found on hub"))),
            s @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => Err(Error::GatedModel {
                model: model_id.to_string(),
                status: s.as_u16(),
            }),
            s => Err(Error::Remote(format!("hub model lookup: HTTP {s}"))),
        }
    }

    /// Probe one file of `model_id` with a HEAD request. Gated models answer
    /// 401/403 until the account has been granted access.
    #[tracing::instrument(name = "hub.check_file_access", skip(self))]
    pub async fn check_file_access(&self, model_id: &str, filename: &str) -> Result<()> {
        let url = format!("{}/{}/resolve/main/{}", self.endpoint, model_id, filename);
        let resp = self
            .client
            .head(&url)
            .bearer_auth(self.token.expose())
            .send()
            .await?;

        match resp.status() {
            s if s.is_success() => Ok(()),
            s @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => Err(Error::GatedModel {
                model: model_id.to_string(),
                status: s.as_u16(),
            }),
            StatusCode::NOT_FOUND => Err(Error::Remote(format!(
                "{model_id}/{filename} not found on hub"
            ))),
            s => Err(Error::Remote(format!("hub file probe: HTTP {s}"))),
        }
    }
}
