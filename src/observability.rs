use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

// ── Engine outcomes ─────────────────────────────────────────────

/// Counter: rejected proposals. Labels: kind (maintenance, hold, booking).
pub const CONFLICTS_TOTAL: &str = "clubres_conflicts_total";

/// Counter: committed booking operations. Labels: op.
pub const BOOKINGS_TOTAL: &str = "clubres_bookings_total";

/// Counter: bulk hold syncs. Labels: outcome (applied, unchanged, conflict).
pub const HOLD_SYNC_TOTAL: &str = "clubres_hold_sync_total";

/// Counter: holds written by syncs. Labels: change (created, released).
pub const HOLDS_CHANGED_TOTAL: &str = "clubres_holds_changed_total";

/// Counter: refund obligations emitted.
pub const REFUNDS_DUE_TOTAL: &str = "clubres_refunds_due_total";

// ── Journal ─────────────────────────────────────────────────────

/// Histogram: group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "clubres_journal_flush_duration_seconds";

/// Histogram: group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "clubres_journal_flush_batch_size";

/// Counter: journal compactions. Labels: status.
pub const COMPACTIONS_TOTAL: &str = "clubres_compactions_total";

/// Install the Prometheus exporter on `port`. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Default fmt subscriber filtered by `RUST_LOG`. Leaves an existing one in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
