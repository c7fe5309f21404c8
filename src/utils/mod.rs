//! Utility modules.

pub mod postgres;
pub mod retry;

pub use retry::{RetryPolicy, Retryable, with_retry};
