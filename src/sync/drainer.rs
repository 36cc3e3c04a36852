//! Queue drainer: replays pending sync-queue rows onto the primary store
//! in strict arrival order.
//!
//! A failing row stops the pass. Rows behind it must wait, otherwise two
//! writes against the same entity could reach the primary out of order.

use tracing::{debug, error, info};

use super::queue::SyncQueue;
use crate::entity::EntityRegistry;
use crate::error::SyncResult;
use crate::session::applier;
use crate::storage::EntityStore;

/// Outcome of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Rows replayed and marked synced.
    pub replayed: usize,
    /// Row that stopped the pass, if any.
    pub failed: Option<i64>,
}

/// Replay up to `limit` pending rows. Per-row failures are recorded on
/// the row (`attempts`, `last_error`) and end the pass; they are never
/// propagated. Errors reading or writing the queue itself do propagate,
/// since there is no row to record them on.
pub fn drain(
    primary: &dyn EntityStore,
    queue: &SyncQueue,
    registry: &EntityRegistry,
    limit: usize,
) -> SyncResult<DrainReport> {
    let mut report = DrainReport::default();

    for entry in queue.pending(limit)? {
        let Some(id) = entry.id else {
            error!("queue row without id; stopping drain pass");
            break;
        };

        let mut ops = [entry.to_operation()];
        match applier::apply(primary, registry, &mut ops) {
            Ok(_) => {
                queue.mark_synced(id)?;
                report.replayed += 1;
                debug!("replayed queue row {} ({})", id, entry.entity_type);
            }
            Err(err) => {
                error!(
                    "replay of queue row {} ({}) failed: {}",
                    id, entry.entity_type, err
                );
                queue.mark_failed(id, &err.to_string())?;
                report.failed = Some(id);
                break;
            }
        }
    }

    if report.replayed > 0 {
        info!(
            "drained {} queued operation(s) to '{}'",
            report.replayed,
            primary.name()
        );
    }
    Ok(report)
}
