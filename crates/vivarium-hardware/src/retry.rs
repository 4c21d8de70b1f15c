//! Bounded retry with growing backoff.
//!
//! Hardware loading and measurements share one retry schedule: three
//! attempts, starting at half a second of delay and doubling up to a two
//! second cap. Callers of `update()` must therefore tolerate it blocking
//! for several seconds on failure paths.

use std::future::Future;
use tracing::warn;
use vivarium_core::constants::{RETRY_INITIAL_DELAY, RETRY_MAX_DELAY};
use vivarium_core::Result;

/// Run `operation` up to `attempts` times, sleeping between failures.
///
/// The last error is returned when every attempt fails.
pub(crate) async fn with_backoff<T, F, Fut>(attempts: u32, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay = RETRY_INITIAL_DELAY;
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < attempts => {
                warn!("Attempt {attempt}/{attempts} failed: {error}; retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(RETRY_MAX_DELAY);
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
