//! Vendoring remote scripts and stylesheets referenced from HTML documents.
//!
//! Elements that opt in with a match attribute (`data-remote-script` by
//! default) have their remote resource downloaded once into a cache
//! directory, under a name derived from the URL, and are rewritten to point
//! at the cached copy.
//!
//! # Architecture
//! - **Scanner**: finds opted-in elements whose URL is an absolute
//!   `http`/`https` URL, using a configurable [`ResourceKinds`] table.
//! - **Rewriter**: computes the replacement reference from the build mode and
//!   [`ResolveMode`].
//! - **Engine**: ties the scanner, the download coordinator and the rewriter
//!   together per document, and decides whether to wait for downloads or to
//!   defer them and invalidate the document later.

mod config;
mod document;
mod engine;
pub mod error;
mod kind;
pub mod rewriter;
mod scan;

pub use crate::config::{
    BuildContext, DEFAULT_ASSETS_DIR, DEFAULT_CHUNK_PREFIX, DEFAULT_MATCH_ATTRIBUTE, EngineConfig, Mode, ResolveMode,
    Resolution, Resolver,
};
pub use crate::document::{Document, Edit};
pub use crate::engine::{Engine, Invalidate, Transformed};
pub use crate::kind::{ResourceKind, ResourceKinds};
pub use crate::scan::{Reference, Scanner, is_remote};
