use std::future::Future;
use std::time::Duration;
use tracing::error;

use crate::{
    modules::error::{code::ErrorCode, MailFabricResult},
    raise_error,
};

/// Runs `fut` and turns a timeout into a tagged, retryable error instead of
/// hanging a job worker indefinitely. Used at every provider/LLM suspension
/// point named in the concurrency model (provider calls, LLM calls).
pub async fn with_timeout<F, T>(duration: Duration, label: &str, fut: F) -> MailFabricResult<T>
where
    F: Future<Output = MailFabricResult<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => {
            error!(label, seconds = duration.as_secs(), "operation timed out");
            Err(raise_error!(
                format!("{} timed out after {}s", label, duration.as_secs()),
                ErrorCode::RequestTimeout
            ))
        }
    }
}
