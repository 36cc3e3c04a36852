//! Background drain worker.
//!
//! Commits drain the queue opportunistically, but a deployment that goes
//! quiet after an outage would otherwise leave rows parked until the next
//! write. The worker sweeps the queue on a fixed interval. A claiming
//! lock serializes sweeps, so within one process drains never race each
//! other on row selection.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{info, warn};

use super::drainer::{self, DrainReport};
use super::queue::SyncQueue;
use crate::entity::EntityRegistry;
use crate::storage::EntityStore;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Maximum rows replayed per sweep.
    pub batch_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            batch_size: 100,
        }
    }
}

pub struct DrainWorker {
    primary: Arc<dyn EntityStore>,
    queue: SyncQueue,
    registry: Arc<EntityRegistry>,
    config: WorkerConfig,
    claiming_lock: Mutex<()>,
}

impl DrainWorker {
    pub fn new(
        primary: Arc<dyn EntityStore>,
        secondary: Arc<dyn EntityStore>,
        registry: Arc<EntityRegistry>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            primary,
            queue: SyncQueue::new(secondary),
            registry,
            config,
            claiming_lock: Mutex::new(()),
        }
    }

    /// Sweep forever on the configured interval. Spawn this on the
    /// runtime alongside the request handlers.
    pub async fn run(self) {
        info!(
            "drain worker started (interval {:?}, batch {})",
            self.config.interval, self.config.batch_size
        );
        let mut tick = interval(self.config.interval);
        loop {
            tick.tick().await;
            self.sweep();
        }
    }

    /// One drain sweep. Returns `None` when another sweep already holds
    /// the claiming lock or the sweep itself could not run.
    pub fn sweep(&self) -> Option<DrainReport> {
        let _lock = match self.claiming_lock.try_lock() {
            Ok(lock) => lock,
            Err(_) => return None, // Already sweeping
        };

        match drainer::drain(
            self.primary.as_ref(),
            &self.queue,
            &self.registry,
            self.config.batch_size,
        ) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!("drain sweep failed: {}", err);
                None
            }
        }
    }
}
