pub mod entity;
pub mod error;
pub mod session;
pub mod storage;
pub mod sync;

pub use entity::{
    Column, ColumnType, Entity, EntityDescriptor, EntityHandle, EntityRegistry, EnumSpec,
    FieldMap, FieldValue,
};
pub use error::{SyncError, SyncResult};
pub use session::changeset::{OpKind, Operation};
pub use session::{CommitReport, CommitTarget, DualSession, ReplicaOutcome, SessionConfig};
pub use storage::{EntityStore, MemoryStore, Record, WriteOp};
pub use sync::{drain, DrainReport, DrainWorker, QueueEntry, SyncQueue, WorkerConfig, MAX_ERROR_LEN};

#[cfg(test)]
pub(crate) mod testutil;
