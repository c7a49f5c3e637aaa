//! Storage for the vendored asset cache.
//!
//! Every cache directory is wrapped in a [`StorageBackend`]; the names handed
//! to a backend are flat cache file names, validated with [`validate_path`]
//! before use. The local filesystem implementation is [`LocalBackend`]; an
//! in-memory [`MockBackend`] is available behind the `mock` feature for tests
//! in other crates.

pub mod backend;
pub mod error;
mod path;

pub use crate::backend::{ByteStream, StorageBackend};
pub use crate::path::validate as validate_path;
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
