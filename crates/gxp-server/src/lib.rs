//! GXP Server library
//!
//! Thin HTTP surface over the ingestion pipeline: job submission and
//! polling routes, plus the study search/browse queries the portal
//! frontend uses. All heavy lifting happens in worker processes; the
//! server only enqueues jobs and reads state.

pub mod api;
pub mod config;
pub mod db;
pub mod error;

pub use api::AppState;
pub use config::Config;
pub use error::{AppError, AppResult};
