//! Periodic expiry of unanswered signer requests.

use std::sync::Arc;
use std::time::Duration;

use mmbridge_broker::Broker;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

const MIN_SWEEP: Duration = Duration::from_secs(1);
const MAX_SWEEP: Duration = Duration::from_secs(60);

/// How often to sweep for a given TTL: half the TTL, within 1s..=60s.
pub fn sweep_interval(ttl: Duration) -> Duration {
    (ttl / 2).clamp(MIN_SWEEP, MAX_SWEEP)
}

/// Spawn a task that drops correlation entries older than `ttl` until `cancel`
/// fires.
pub fn spawn_expiry_task(
    broker: Arc<Broker>,
    ttl: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let every = sweep_interval(ttl);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let expired = broker.expire_outstanding(ttl);
                    if expired > 0 {
                        debug!(expired, "expiry sweep");
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}
