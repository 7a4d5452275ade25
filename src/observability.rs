use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: rooms created.
pub const ROOMS_CREATED_TOTAL: &str = "innkeep_rooms_created_total";

/// Counter: bookings committed to the ledger.
pub const BOOKINGS_CREATED_TOTAL: &str = "innkeep_bookings_created_total";

/// Counter: booking attempts rejected because the dates were already taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "innkeep_booking_conflicts_total";

/// Counter: bookings cancelled.
pub const BOOKINGS_CANCELLED_TOTAL: &str = "innkeep_bookings_cancelled_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Histogram: journal group-commit duration in seconds.
pub const JOURNAL_COMMIT_DURATION_SECONDS: &str = "innkeep_journal_commit_duration_seconds";

/// Histogram: journal group-commit batch size (events per fsync).
pub const JOURNAL_COMMIT_BATCH_SIZE: &str = "innkeep_journal_commit_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
