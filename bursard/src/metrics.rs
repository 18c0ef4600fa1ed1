//! Prometheus metrics for the daemon.
//!
//! Counters follow the request/decision/settlement lifecycle; the
//! registry is rendered by the `/metrics` endpoint.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

use crate::error::{DaemonError, DaemonResult};

/// Counter set registered against one registry.
pub struct Metrics {
    pub requests_submitted: IntCounterVec,
    pub requests_decided: IntCounterVec,
    pub orders_executed: IntCounterVec,
    pub trades_settled: IntCounterVec,
    pub ipo_applications_decided: IntCounterVec,
}

impl Metrics {
    /// Create and register the counter set.
    pub fn new(registry: &Registry) -> DaemonResult<Self> {
        let requests_submitted = IntCounterVec::new(
            Opts::new("bursar_requests_submitted_total", "Workflow requests submitted"),
            &["kind"],
        )
        .map_err(metrics_error)?;
        let requests_decided = IntCounterVec::new(
            Opts::new("bursar_requests_decided_total", "Workflow requests decided"),
            &["kind", "status"],
        )
        .map_err(metrics_error)?;
        let orders_executed = IntCounterVec::new(
            Opts::new("bursar_orders_executed_total", "Buy/sell executions"),
            &["side"],
        )
        .map_err(metrics_error)?;
        let trades_settled = IntCounterVec::new(
            Opts::new("bursar_trades_settled_total", "Timed trades settled"),
            &["outcome"],
        )
        .map_err(metrics_error)?;
        let ipo_applications_decided = IntCounterVec::new(
            Opts::new("bursar_ipo_applications_decided_total", "IPO applications decided"),
            &["status"],
        )
        .map_err(metrics_error)?;

        registry.register(Box::new(requests_submitted.clone())).map_err(metrics_error)?;
        registry.register(Box::new(requests_decided.clone())).map_err(metrics_error)?;
        registry.register(Box::new(orders_executed.clone())).map_err(metrics_error)?;
        registry.register(Box::new(trades_settled.clone())).map_err(metrics_error)?;
        registry
            .register(Box::new(ipo_applications_decided.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            requests_submitted,
            requests_decided,
            orders_executed,
            trades_settled,
            ipo_applications_decided,
        })
    }
}

/// Render a registry in the Prometheus text exposition format.
pub fn render(registry: &Registry) -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(error) = encoder.encode(&registry.gather(), &mut buffer) {
        tracing::error!(%error, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

fn metrics_error(error: prometheus::Error) -> DaemonError {
    DaemonError::Config(format!("metrics registration failed: {}", error))
}

// =============================================================================
// Tests
// =============================================================================
