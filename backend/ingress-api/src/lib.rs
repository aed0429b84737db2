//! Ingress API
//!
//! Stateless HTTP front door for the pipeline: issues presigned upload
//! URLs, verifies completed uploads against the object store, creates
//! metadata records, and enqueues transcode jobs.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod state;
pub mod validation;

pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use state::AppState;
