//! Downloads of remote assets into the vendored cache.
//!
//! # Architecture
//! - **Keys**: every remote URL maps to a short [`CacheKey`] that names its
//!   cache file. Same URL, same file, across runs.
//! - **Transport**: the network seam ([`Transport`](transport::Transport)).
//!   Production code uses `reqwest`; tests use an in-memory mock.
//! - **Coordinator**: streams bodies into storage and makes sure no cache
//!   file is ever downloaded twice at the same time.

mod coordinator;
pub mod error;
mod key;
pub mod transport;

pub use crate::coordinator::{Coordinator, Download, Ensured, Fetched};
pub use crate::key::{CacheKey, KEY_LENGTH};
