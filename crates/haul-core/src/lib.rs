//! Chunked transfer pipeline: resumable multipart uploads, a push-to-pull
//! stream bridge for callback-driven transports, and throttled disk writes.

pub mod checksum;
pub mod config;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod progress;
pub mod storage;
pub mod store;
pub mod stream;
pub mod throttle;
pub mod upload;
