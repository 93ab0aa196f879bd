//! Deadline enforcement for external calls.

use std::future::Future;
use std::time::Duration;

use crate::error::{RagError, Result};

/// Await `call`, failing with `on_timeout(limit)` if it does not finish in time.
///
/// The inner future is dropped on timeout, which cancels the in-flight request
/// for transports that support it.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    call: F,
    on_timeout: impl FnOnce(Duration) -> RagError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}
