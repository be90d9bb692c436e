//! Caller-side deadlines.
//!
//! Providers and pipelines never impose their own deadline. Callers that need
//! one wrap the future here and decide what a timeout means for their state.

use std::future::Future;
use std::time::Duration;

use crate::types::{Result, TopicError};

/// Execute an async operation with a timeout
///
/// Returns `TopicError::Timeout` if the operation doesn't complete within the
/// given duration. The inner future is dropped on expiry.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(TopicError::timeout(operation_name, timeout)),
    }
}
