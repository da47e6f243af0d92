//! Fan-in for concurrent branches.

use crate::error::SourceError;
use tokio::task::JoinSet;
use tracing::debug;

/// Wait for every task in `tasks` and collect their outputs.
///
/// Outputs arrive in completion order. The first error observed becomes the
/// result, but the remaining tasks are still awaited so nothing outlives
/// the call. Later errors are logged and dropped.
pub async fn join_all<T>(mut tasks: JoinSet<Result<T, SourceError>>) -> Result<Vec<T>, SourceError>
where
    T: Send + 'static,
{
    let mut outputs = Vec::with_capacity(tasks.len());
    let mut first_error: Option<SourceError> = None;

    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(SourceError::from).and_then(|outcome| outcome) {
            Ok(value) => {
                if first_error.is_none() {
                    outputs.push(value);
                }
            }
            Err(e) if first_error.is_none() => {
                debug!("Branch failed, waiting for {} siblings: {}", tasks.len(), e);
                first_error = Some(e);
            }
            Err(e) => debug!("Ignoring later branch failure: {}", e),
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(outputs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_collects_all_outputs() {
        let mut tasks = JoinSet::new();
        for i in 0..5u64 {
            tasks.spawn(async move { Ok::<_, SourceError>(i) });
        }
        let mut outputs = join_all(tasks).await.unwrap();
        outputs.sort();
        assert_eq!(outputs, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_first_error_wins_after_siblings_finish() {
        let slow_done = Arc::new(AtomicBool::new(false));
        let mut tasks = JoinSet::new();

        tasks.spawn(async { Err(SourceError::unavailable("votes", "first")) });
        let flag = slow_done.clone();
        tasks.spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            flag.store(true, Ordering::SeqCst);
            Err(SourceError::unavailable("breakdown", "second"))
        });

        let err = join_all::<()>(tasks).await.unwrap_err();
        assert!(err.to_string().contains("first"));
        assert!(slow_done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_panicking_task_is_an_error() {
        let mut tasks: JoinSet<Result<u64, SourceError>> = JoinSet::new();
        tasks.spawn(async { panic!("boom") });
        let err = join_all(tasks).await.unwrap_err();
        assert!(matches!(err, SourceError::Task(_)));
    }
}
