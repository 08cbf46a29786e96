use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::Engine;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact the journal once it has grown by `threshold` appends.
/// Returns whether a compaction ran.
pub async fn compact_if_due(engine: &Engine, threshold: u64) -> bool {
    let appends = engine.journal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match engine.compact_journal().await {
        Ok(()) => {
            metrics::counter!(crate::observability::COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            info!("compacted journal after {appends} appends");
            true
        }
        Err(e) => {
            metrics::counter!(crate::observability::COMPACTIONS_TOTAL, "status" => "error").increment(1);
            warn!("journal compaction failed: {e}");
            false
        }
    }
}

/// Background task; runs until the runtime shuts down.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&engine, threshold).await;
    }
}
