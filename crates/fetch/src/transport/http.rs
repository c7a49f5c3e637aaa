//! Production transport built on `reqwest`.

use super::{BodyError, ByteStream, DEFAULT_USER_AGENT, Transport, TransportOptions};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use futures::TryStreamExt;

/// Streams response bodies with a shared [`reqwest::Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with default settings (no timeout).
    pub fn new() -> Result<Self> {
        Self::with_options(&TransportOptions::default())
    }

    pub fn with_options(options: &TransportOptions) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(options.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT));
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| ErrorKind::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<ByteStream> {
        let response = self.client.get(url).send().await.map_err(|e| ErrorKind::Transport {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        tracing::trace!(url, status = status.as_u16(), length = response.content_length(), "Response headers received");
        Ok(Box::pin(response.bytes_stream().map_err(|e| BodyError(e.to_string()).into_io())))
    }
}
