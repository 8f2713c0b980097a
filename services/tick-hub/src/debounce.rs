//! Trailing-edge debounce for user input streams

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::trace;

/// Forward only the last value of each burst from `input`
///
/// A value is emitted once `window` passes without a newer one. The pending
/// value is flushed when `input` closes.
pub fn debounce<T: Send + 'static>(window: Duration, mut input: mpsc::Receiver<T>) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        let mut pending: Option<T> = None;
        loop {
            let Some(value) = pending.take() else {
                match input.recv().await {
                    Some(value) => pending = Some(value),
                    None => return,
                }
                continue;
            };
            tokio::select! {
                next = input.recv() => match next {
                    Some(newer) => {
                        trace!("Debounce window restarted");
                        pending = Some(newer);
                    }
                    None => {
                        let _ = tx.send(value).await;
                        return;
                    }
                },
                () = sleep(window) => {
                    if tx.send(value).await.is_err() {
                        return;
                    }
                }
            }
        }
    });
    rx
}
