//! Async adapters feeding a `Subject`
//!
//! The subject itself is single-threaded, so these futures must be driven on
//! the thread that owns it (`block_on`, a current-thread runtime, or a
//! `LocalSet`). Forwarding stops at the first emission error.

use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast::{self, error::RecvError};

use super::{Emission, Subject};
use crate::error::Result;

/// Forward a broadcast channel until every sender is dropped.
///
/// Returns how many emissions were forwarded. Lagged messages are skipped
/// with a warning.
pub async fn forward_broadcast<T>(
    mut rx: broadcast::Receiver<Emission<T>>,
    subject: &Subject<T>,
) -> Result<usize>
where
    T: Clone + 'static,
{
    let mut forwarded = 0;
    loop {
        match rx.recv().await {
            Ok(emission) => {
                subject.emit(emission)?;
                forwarded += 1;
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Broadcast forwarder lagged; emissions dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
    tracing::debug!(forwarded, "Broadcast channel closed");
    Ok(forwarded)
}

/// Forward every item of `stream` until it ends
pub async fn forward_stream<T, S>(stream: S, subject: &Subject<T>) -> Result<usize>
where
    T: Clone + 'static,
    S: Stream<Item = Emission<T>>,
{
    futures_util::pin_mut!(stream);
    let mut forwarded = 0;
    while let Some(emission) = stream.next().await {
        subject.emit(emission)?;
        forwarded += 1;
    }
    Ok(forwarded)
}
