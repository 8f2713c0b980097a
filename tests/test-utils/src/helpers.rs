//! Test helper functions and utilities

use anyhow::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;

/// Default wait used by the integration suites
pub const WAIT: Duration = Duration::from_secs(5);

/// Poll interval for [`wait_until`]
const POLL: Duration = Duration::from_millis(10);

/// Initialize test logging with environment-based configuration.
///
/// Log levels come from `RUST_LOG`; output goes to the test writer so it is
/// captured per test. Safe to call multiple times.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait for an async condition to become true.
///
/// Polls `condition` every `poll_interval` until it returns true or
/// `timeout_duration` expires.
///
/// # Examples
///
/// ```ignore
/// wait_for(
///     || async { broker.connection_count() == 2 },
///     Duration::from_secs(5),
///     Duration::from_millis(10),
/// )
/// .await?;
/// ```
pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> Result<()>
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    timeout(timeout_duration, async {
        loop {
            if condition().await {
                return;
            }
            sleep(poll_interval).await;
        }
    })
    .await
    .map_err(|_| anyhow::anyhow!("Timeout waiting for condition"))
}

/// Wait for a synchronous condition, polling within [`WAIT`]
pub async fn wait_until<F>(condition: F) -> Result<()>
where
    F: Fn() -> bool,
{
    wait_for(|| std::future::ready(condition()), WAIT, POLL).await
}

/// Run `future` with a deadline so a stuck test fails instead of hanging
pub async fn with_timeout<T, Fut>(duration: Duration, future: Fut) -> Result<T>
where
    Fut: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| anyhow::anyhow!("Operation timed out after {duration:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_wait_until_sees_change() {
        let counter = Arc::new(AtomicUsize::new(0));
        let bump = Arc::clone(&counter);
        tokio::spawn(async move {
            sleep(Duration::from_millis(20)).await;
            bump.store(3, Ordering::SeqCst);
        });

        wait_until(|| counter.load(Ordering::SeqCst) == 3).await.unwrap();
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let result = with_timeout(Duration::from_millis(10), sleep(Duration::from_secs(1))).await;
        assert!(result.is_err());
    }
}
