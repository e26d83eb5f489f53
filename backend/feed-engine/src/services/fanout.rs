/// Bounded fan-out / fan-in for request-scoped fetches
use futures::stream::{self, StreamExt, TryStreamExt};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::{FeedError, Result};

/// Drive `tasks` with at most `max_in_flight` running at once and collect
/// their outputs in input order. The first error is returned immediately and
/// every sibling still pending is dropped.
pub async fn try_join_bounded<I, Fut, T, E>(tasks: I, max_in_flight: usize) -> std::result::Result<Vec<T>, E>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = std::result::Result<T, E>>,
{
    stream::iter(tasks)
        .buffered(max_in_flight.max(1))
        .try_collect()
        .await
}

/// Like `try_join_bounded`, but every task runs to completion and each
/// outcome is kept.
pub async fn join_bounded<I, Fut, T>(tasks: I, max_in_flight: usize) -> Vec<T>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = T>,
{
    stream::iter(tasks)
        .buffered(max_in_flight.max(1))
        .collect()
        .await
}

/// Execute a fallible future with an optional deadline. On expiry the future
/// is dropped, which cancels everything it was waiting on.
pub async fn with_deadline<F, T>(deadline: Option<Duration>, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match deadline {
        Some(duration) => timeout(duration, future)
            .await
            .map_err(|_| FeedError::DeadlineExceeded(duration))?,
        None => future.await,
    }
}
