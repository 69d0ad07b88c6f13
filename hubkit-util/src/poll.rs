use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tracing::trace;

/// A status that can tell whether the process it describes has stopped
pub trait Terminal {
    fn is_terminal(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum PollError<E> {
    #[error("gave up waiting after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Fetch(E),
}

/// Fetch a status every `interval` until it reaches a terminal state.
///
/// `on_status` sees every fetched status, including the terminal one. No
/// fetch happens after a terminal status. If `timeout` elapses before that,
/// the poll fails with [PollError::Timeout]; a fetch error ends the poll
/// immediately.
pub async fn poll_until_terminal<T, E, F, Fut, S>(
    interval: Duration,
    timeout: Option<Duration>,
    mut fetch: F,
    mut on_status: S,
) -> Result<T, PollError<E>>
where
    T: Terminal,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    S: FnMut(&T),
{
    let deadline = timeout.map(|t| Instant::now() + t);
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let status = fetch().await.map_err(PollError::Fetch)?;
        on_status(&status);

        if status.is_terminal() {
            trace!(attempt, "reached terminal status");
            return Ok(status);
        }

        if let (Some(deadline), Some(timeout)) = (deadline, timeout) {
            if Instant::now() + interval > deadline {
                return Err(PollError::Timeout(timeout));
            }
        }

        tokio::time::sleep(interval).await;
    }
}
