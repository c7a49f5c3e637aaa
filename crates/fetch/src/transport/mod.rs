//! HTTP transport used to fetch remote assets.
//!
//! The coordinator only ever needs one thing from the network: "give me the
//! body of this URL as a stream". [`Transport`] is that seam. The production
//! implementation is [`ReqwestTransport`]; an in-memory [`MockTransport`] is
//! available behind the `mock` feature for tests in other crates.

#[cfg(any(test, feature = "mock"))]
mod mock;
#[cfg(feature = "reqwest")]
mod http;

use crate::error::Result;
use async_trait::async_trait;
use derive_more::{Display, Error};
use std::sync::Arc;
use std::time::Duration;
pub use vendr_storage::ByteStream;

#[cfg(any(test, feature = "mock"))]
pub use self::mock::MockTransport;
#[cfg(feature = "reqwest")]
pub use self::http::ReqwestTransport;

pub type TransportHandle = Arc<dyn Transport>;

pub const DEFAULT_USER_AGENT: &str = concat!("vendr/", env!("CARGO_PKG_VERSION"));

/// Marks a failure that happened while the response body was streaming.
///
/// Body chunks travel as [`std::io::Result`]s (see [`ByteStream`]) so the
/// transport's own error is wrapped in one of these first. That lets the
/// coordinator tell a dropped connection apart from a failing disk when the
/// streamed write fails.
#[derive(Debug, Display, Error)]
#[display("{_0}")]
pub struct BodyError(#[error(not(source))] pub String);

impl BodyError {
    pub fn into_io(self) -> std::io::Error {
        std::io::Error::other(self)
    }

    /// Returns `true` if `error` was produced by [`into_io`](Self::into_io).
    pub fn is_body_error(error: &std::io::Error) -> bool {
        error.get_ref().is_some_and(|inner| inner.is::<BodyError>())
    }
}

/// Asynchronous HTTP client abstraction.
///
/// Implementations handle their own redirect following and timeouts, and
/// must treat a non-success status as an error
/// ([`Status`](crate::error::ErrorKind::Status)) rather than streaming the
/// error page into the cache.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a `GET` request and return the response body as a stream.
    async fn get(&self, url: &str) -> Result<ByteStream>;
}

/// Settings for the HTTP client. Timeouts are not enforced anywhere else.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportOptions {
    /// Total time allowed per request, including the body.
    pub timeout: Option<Duration>,
    /// Defaults to [`DEFAULT_USER_AGENT`].
    pub user_agent: Option<String>,
}
