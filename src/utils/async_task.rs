use std::future::Future;

use tokio::task::JoinHandle;
use tracing::debug;
use tracing::error;

/// Spawns a named background loop and logs how it ended.
pub(crate) fn spawn_task<F>(
    name: &'static str,
    task: F,
) -> JoinHandle<()>
where
    F: Future<Output = crate::Result<()>> + Send + 'static,
{
    tokio::spawn(async move {
        match task.await {
            Ok(()) => debug!(task = name, "background task stopped"),
            Err(e) => error!(task = name, ?e, "background task stopped with error"),
        }
    })
}
