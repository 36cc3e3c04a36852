//! Offline synchronization: the durable queue, the drainer that replays
//! it, and the background worker that sweeps it.

pub mod drainer;
pub mod queue;
pub mod worker;

pub use drainer::{drain, DrainReport};
pub use queue::{QueueEntry, SyncQueue, MAX_ERROR_LEN, QUEUE_TABLE};
pub use worker::{DrainWorker, WorkerConfig};
