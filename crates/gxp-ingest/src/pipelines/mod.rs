//! Per-job-kind pipelines
//!
//! Each pipeline wires the reusable components (source reader, batch
//! buffer, bulk loader, registry client, reconciler) for one job kind
//! and produces a structured report that becomes the job's result
//! payload.

pub mod expression;
pub mod metadata;
pub mod samples;
