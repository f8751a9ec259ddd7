//! Bounded polling for asynchronous provider state changes

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Default time to wait for a failed endpoint's deletion
pub const DEFAULT_DELETION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Default interval between describe calls while waiting
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Outcome of a single poll
#[derive(Debug, PartialEq)]
pub enum Poll<T> {
    /// Condition met
    Ready(T),
    /// Keep waiting; carries the last observed status for diagnostics
    Pending(String),
}

/// Why a wait ended without the condition being met
#[derive(Debug, PartialEq)]
pub enum WaitError<E> {
    /// The deadline passed
    Timeout {
        /// Configured timeout
        waited: Duration,
        /// Last status reported before the deadline, if any poll completed
        last_observed: Option<String>,
    },
    /// A poll failed; the error is surfaced immediately
    Poll(E),
}

/// Poll until `poll_fn` reports ready, a poll fails, or `timeout` expires.
///
/// The deadline also bounds a poll that is in flight when it passes.
pub async fn wait_for<T, E, F, Fut>(
    description: &str,
    timeout: Duration,
    poll_interval: Duration,
    mut poll_fn: F,
) -> Result<T, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Poll<T>, E>>,
{
    let mut last_observed: Option<String> = None;

    let outcome = tokio::time::timeout(timeout, async {
        loop {
            match poll_fn().await {
                Ok(Poll::Ready(value)) => return Ok(value),
                Ok(Poll::Pending(status)) => {
                    debug!(status = %status, "Still waiting for {}", description);
                    last_observed = Some(status);
                }
                Err(e) => return Err(WaitError::Poll(e)),
            }
            tokio::time::sleep(poll_interval).await;
        }
    })
    .await;

    match outcome {
        Ok(result) => result,
        Err(_elapsed) => Err(WaitError::Timeout {
            waited: timeout,
            last_observed,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn returns_once_condition_is_met() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32, WaitError<String>> = wait_for(
            "counter",
            Duration::from_secs(60),
            Duration::from_secs(1),
            move || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n >= 3 {
                        Ok(Poll::Ready(n))
                    } else {
                        Ok(Poll::Pending(format!("attempt {}", n)))
                    }
                }
            },
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_observed_status() {
        let result: Result<(), WaitError<String>> = wait_for(
            "never",
            Duration::from_secs(10),
            Duration::from_secs(3),
            || async { Ok(Poll::Pending("Deleting".to_string())) },
        )
        .await;

        assert_eq!(
            result,
            Err(WaitError::Timeout {
                waited: Duration::from_secs(10),
                last_observed: Some("Deleting".to_string()),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn poll_errors_stop_the_wait() {
        let result: Result<(), WaitError<String>> = wait_for(
            "broken",
            Duration::from_secs(10),
            Duration::from_secs(1),
            || async { Err("AccessDenied".to_string()) },
        )
        .await;

        assert_eq!(result, Err(WaitError::Poll("AccessDenied".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_poll_is_bounded_by_deadline() {
        let result: Result<(), WaitError<String>> = wait_for(
            "hung",
            Duration::from_secs(5),
            Duration::from_secs(1),
            || async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Poll::Ready(()))
            },
        )
        .await;

        assert!(matches!(
            result,
            Err(WaitError::Timeout {
                last_observed: None,
                ..
            })
        ));
    }
}
