//! Transcode worker
//!
//! Long-running consumer that drains the job queue with bounded
//! concurrency and turns each uploaded source video into an HLS rendition
//! tree in the processed bucket.

pub mod config;
pub mod downloader;
pub mod error;
pub mod metrics;
pub mod quality;
pub mod transcoder;
pub mod uploader;
pub mod worker;

pub use config::WorkerConfig;
pub use error::WorkerError;
pub use worker::Worker;
