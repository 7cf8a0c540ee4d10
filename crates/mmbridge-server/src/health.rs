//! `/health` endpoint.

use std::time::Instant;

use mmbridge_broker::BrokerStats;
use serde::Serialize;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the server is running.
    pub status: String,
    /// Seconds since the server started.
    pub uptime_secs: u64,
    /// Open bridge connections, signer included.
    pub connections: usize,
    /// Whether a signer is attached.
    pub signer_connected: bool,
    /// Requests waiting for a signer.
    pub pending_requests: usize,
    /// Requests forwarded and not yet answered.
    pub outstanding_requests: usize,
}

/// Build a health response from broker counters.
pub fn health_check(start_time: Instant, stats: BrokerStats) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections: stats.clients + usize::from(stats.signer_connected),
        signer_connected: stats.signer_connected,
        pending_requests: stats.pending_requests,
        outstanding_requests: stats.outstanding_requests,
    }
}
