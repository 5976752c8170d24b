//! GXP Common Library
//!
//! Shared error taxonomy and logging setup for the GXP workspace.
//!
//! Every pipeline component reports failures through [`IngestError`] so
//! that a job's terminal result carries one well-defined failure kind,
//! and both binaries initialize tracing through [`logging::init_logging`].

pub mod error;
pub mod logging;

pub use error::{IngestError, Result};
