//! In-memory transport for testing.

use super::{BodyError, ByteStream, Transport};
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Semaphore;

#[derive(Clone)]
enum Response {
    Body(Bytes),
    Status(u16),
    /// Sends the partial body, then drops the connection.
    Broken(Bytes),
}

/// Transport that serves canned responses and counts requests.
///
/// Unknown URLs answer with HTTP 404. Requests are counted as soon as they
/// are made, before the optional gate is passed, so a test can observe how
/// many fetches are waiting.
///
/// # Examples
///
/// ```
/// use vendr_fetch::transport::{MockTransport, Transport};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let transport = MockTransport::new().with_body("https://cdn.example.com/a.js", "console.log(1)");
/// assert!(transport.get("https://cdn.example.com/a.js").await.is_ok());
/// assert!(transport.get("https://cdn.example.com/missing.js").await.is_err());
/// assert_eq!(transport.total_calls(), 2);
/// # }
/// ```
#[derive(Default)]
pub struct MockTransport {
    responses: HashMap<String, Response>,
    calls: Mutex<HashMap<String, usize>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.responses.insert(url.into(), Response::Body(body.into()));
        self
    }

    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.responses.insert(url.into(), Response::Status(status));
        self
    }

    pub fn with_broken_body(mut self, url: impl Into<String>, partial: impl Into<Bytes>) -> Self {
        self.responses.insert(url.into(), Response::Broken(partial.into()));
        self
    }

    /// Hold every request until `gate` has a permit available.
    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).values().sum()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> Result<ByteStream> {
        *self.calls.lock().unwrap_or_else(PoisonError::into_inner).entry(url.to_string()).or_default() += 1;
        let _permit = match &self.gate {
            Some(gate) => Some(gate.acquire().await.map_err(|e| ErrorKind::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        let chunks: Vec<std::io::Result<Bytes>> = match self.responses.get(url).cloned() {
            Some(Response::Body(body)) => vec![Ok(body)],
            Some(Response::Broken(partial)) => vec![Ok(partial), Err(BodyError("connection reset".to_string()).into_io())],
            Some(Response::Status(status)) => exn::bail!(ErrorKind::Status {
                url: url.to_string(),
                status,
            }),
            None => exn::bail!(ErrorKind::Status {
                url: url.to_string(),
                status: 404,
            }),
        };
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}
