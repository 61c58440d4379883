use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

pub fn inspect_err<E: Debug>(msg: &str, err: E) -> E {
    tracing::error!(msg = msg, ?err);
    err
}

/// Runs `op` until it succeeds or `attempts` runs have failed, sleeping a
/// little longer after each failure. Zero attempts behaves like one.
pub async fn retry_op<T, E, F, Fut>(attempts: usize, mut op: F) -> Result<T, E>
where
    E: Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(msg = "Attempt failed, retrying", attempt, attempts, ?err);
                tokio::time::sleep(RETRY_BACKOFF * attempt as u32).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
