use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;

const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Background task that snapshots the journal once enough entries have piled
/// up since the last compaction. Booking churn (create/cancel/delete)
/// otherwise grows the log without bound.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        let entries = engine.journal_entries_since_compact().await;
        if entries < threshold {
            continue;
        }
        match engine.compact_journal().await {
            Ok(()) => info!("compacted journal after {entries} entries"),
            Err(e) => tracing::warn!("journal compaction failed: {e}"),
        }
    }
}
