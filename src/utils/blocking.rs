use anyhow::Context;

/// Run blocking handle I/O off the async executor and surface a join failure
/// as an internal error.
pub async fn run_blocking<T, E, F>(label: &'static str, task: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<anyhow::Error> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .with_context(|| format!("{label} worker join failed"))?
}
