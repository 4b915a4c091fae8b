//! Bounded fan-out

use crate::error::{Result, SyncError};
use futures_util::{StreamExt, TryStreamExt, stream};
use std::future::Future;

/// Run `f` over `items` with at most `limit` units in flight.
///
/// The first failing unit fails the whole call; units still in flight are
/// dropped and their results discarded.
pub async fn run_bounded<I, T, F, Fut>(items: I, limit: usize, f: F) -> Result<()>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    stream::iter(items)
        .map(Ok::<T, SyncError>)
        .try_for_each_concurrent(limit.max(1), f)
        .await
}
