//! Helpers shared by every backend

pub mod retry;

pub use retry::{RetryConfig, retry, retry_with_backoff};
