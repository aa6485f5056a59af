//! Bounded retry-until-true polling

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::error::EngineResult;
use crate::predicate::Observation;

/// Interval between outcome checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Run `check` until it passes or `budget` elapses.
///
/// The check always runs at least once. On timeout the last observation is
/// returned with `passed == false`, so callers can report the last state.
/// Non-fatal check errors count as failed observations; session-fatal errors
/// end polling immediately.
pub async fn poll_until<F, Fut>(budget: Duration, interval: Duration, mut check: F) -> EngineResult<Observation>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = EngineResult<Observation>>,
{
    let deadline = Instant::now() + budget;
    loop {
        let observation = match check().await {
            Ok(obs) => obs,
            Err(e) if e.is_session_fatal() => return Err(e),
            Err(e) => Observation::fail(format!("Error verifying: {}", e)),
        };
        if observation.passed {
            return Ok(observation);
        }

        let now = Instant::now();
        if now >= deadline {
            return Ok(observation);
        }
        sleep(interval.min(deadline - now)).await;
    }
}
