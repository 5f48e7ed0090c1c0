//! Result fetcher: pulls generated audio bytes from a URL.

use crate::error::{Error, Result};
use bytes::Bytes;
use reqwest::StatusCode;
use std::time::Duration;

const FETCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
}

impl Fetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .user_agent(concat!("audiogen/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Download the whole body. Anything but `200 OK` is a failure, and the
    /// body is fully read before it is handed back.
    #[tracing::instrument(name = "fetch", skip(self))]
    pub async fn fetch(&self, url: &str) -> Result<Bytes> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), "Download rejected");
            return Err(Error::Download {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = resp.bytes().await?;
        tracing::debug!(bytes = body.len(), "Downloaded audio");
        Ok(body)
    }
}
