use std::net::SocketAddr;
use std::time::Instant;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations executed. Labels: op, status.
pub const OPS_TOTAL: &str = "frontdesk_ops_total";

/// Histogram: operation latency in seconds. Labels: op.
pub const OP_DURATION_SECONDS: &str = "frontdesk_op_duration_seconds";

/// Counter: booking attempts rejected because the room was taken.
pub const BOOKINGS_REJECTED_TOTAL: &str = "frontdesk_bookings_rejected_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "frontdesk_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "frontdesk_wal_flush_batch_size";

/// Install the Prometheus exporter on the given port. No-op if `port` is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Record one engine operation's outcome and latency.
pub fn record_op(op: &'static str, started: Instant, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(OPS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(OP_DURATION_SECONDS, "op" => op).record(started.elapsed().as_secs_f64());
}
