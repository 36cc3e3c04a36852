//! Dual-write session.
//!
//! The session is the one component callers touch: they register
//! mutations against it (`add` / `mark_dirty` / `delete`) and call
//! `commit` once. The commit mirrors the change set against the primary
//! store and the secondary store; when the primary is unreachable the
//! change set lands in the secondary together with its sync-queue rows in
//! one atomic batch, to be replayed when the primary comes back.

pub mod applier;
pub mod changeset;

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::entity::{EntityHandle, EntityRegistry};
use crate::error::{SyncError, SyncResult};
use crate::storage::{EntityStore, Record};
use crate::sync::drainer::{self, DrainReport};
use crate::sync::queue::SyncQueue;
use applier::Staged;
use changeset::{capture, Operation};

/// Where a committed change set landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitTarget {
    /// The primary store accepted the commit.
    Primary,
    /// The primary was unreachable; the change set is in the secondary
    /// store and queued for replay.
    SecondaryQueued,
}

/// Outcome of the best-effort secondary replication step. Modeled as a
/// value rather than a swallowed exception so callers and tests can
/// assert on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicaOutcome {
    Applied,
    Skipped,
    Failed(String),
}

#[derive(Debug)]
pub struct CommitReport {
    pub target: CommitTarget,
    pub operations: usize,
    pub replication: ReplicaOutcome,
    pub drain: Option<DrainReport>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on queue rows replayed by the drain step of one commit.
    pub drain_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { drain_limit: 100 }
    }
}

/// One unit of work over a primary and a secondary store. Created per
/// request, never shared across concurrent callers.
pub struct DualSession {
    primary: Arc<dyn EntityStore>,
    secondary: Arc<dyn EntityStore>,
    registry: Arc<EntityRegistry>,
    queue: SyncQueue,
    config: SessionConfig,
    new: Vec<EntityHandle>,
    dirty: Vec<EntityHandle>,
    deleted: Vec<EntityHandle>,
    closed: bool,
}

impl DualSession {
    pub fn new(
        primary: Arc<dyn EntityStore>,
        secondary: Arc<dyn EntityStore>,
        registry: Arc<EntityRegistry>,
    ) -> Self {
        Self::with_config(primary, secondary, registry, SessionConfig::default())
    }

    pub fn with_config(
        primary: Arc<dyn EntityStore>,
        secondary: Arc<dyn EntityStore>,
        registry: Arc<EntityRegistry>,
        config: SessionConfig,
    ) -> Self {
        let queue = SyncQueue::new(secondary.clone());
        Self {
            primary,
            secondary,
            registry,
            queue,
            config,
            new: Vec::new(),
            dirty: Vec::new(),
            deleted: Vec::new(),
            closed: false,
        }
    }

    /// The sync queue living in this session's secondary store.
    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    /// Track a newly created instance.
    pub fn add(&mut self, handle: EntityHandle) {
        push_unique(&mut self.new, handle);
    }

    /// Track a modification to an instance already persisted.
    pub fn mark_dirty(&mut self, handle: EntityHandle) {
        push_unique(&mut self.dirty, handle);
    }

    /// Track a removal. The primary key is captured at commit time,
    /// before the delete is applied anywhere.
    pub fn delete(&mut self, handle: EntityHandle) {
        remove_handle(&mut self.new, &handle);
        remove_handle(&mut self.dirty, &handle);
        push_unique(&mut self.deleted, handle);
    }

    /// Number of instances currently tracked for the next commit.
    pub fn pending_operations(&self) -> usize {
        self.new.len() + self.dirty.len() + self.deleted.len()
    }

    /// Commit the tracked change set. Either returns a report saying
    /// where the write landed, or one error reflecting total write loss;
    /// partial states are never exposed. The tracked sets are discarded
    /// regardless of outcome.
    pub fn commit(&mut self) -> SyncResult<CommitReport> {
        if self.closed {
            return Err(SyncError::SessionClosed);
        }

        let changes = capture(&self.new, &self.dirty, &self.deleted);
        self.new.clear();
        self.dirty.clear();
        self.deleted.clear();

        let sources: Vec<EntityHandle> = changes.iter().map(|c| c.source.clone()).collect();
        let mut ops: Vec<Operation> = changes.into_iter().map(|c| c.op).collect();

        if ops.is_empty() {
            return Ok(CommitReport {
                target: CommitTarget::Primary,
                operations: 0,
                replication: ReplicaOutcome::Skipped,
                drain: self.drain_queue(),
            });
        }

        match applier::apply(self.primary.as_ref(), &self.registry, &mut ops) {
            Ok(records) => {
                debug!(
                    "committed {} operation(s) to primary '{}'",
                    ops.len(),
                    self.primary.name()
                );
                self.copy_back_all(&sources, &records);
                let replication = self.replicate_secondary(&ops);
                let drain = self.drain_queue();
                Ok(CommitReport {
                    target: CommitTarget::Primary,
                    operations: ops.len(),
                    replication,
                    drain,
                })
            }
            Err(err) if err.is_store_failure() => self.fall_back(ops, sources, err),
            Err(err) => Err(err),
        }
    }

    /// Discard the tracked sets without writing anything.
    pub fn rollback(&mut self) {
        self.new.clear();
        self.dirty.clear();
        self.deleted.clear();
    }

    /// Roll back and mark the session unusable; later commits fail with
    /// `SessionClosed`.
    pub fn close(&mut self) {
        self.rollback();
        self.closed = true;
    }

    /// Best-effort mirror of an already-committed change set onto the
    /// secondary store. Never fails the commit; the secondary is allowed
    /// to drift and reconciles on a later drain.
    fn replicate_secondary(&self, ops: &[Operation]) -> ReplicaOutcome {
        let mut mirror = ops.to_vec();
        match applier::apply(self.secondary.as_ref(), &self.registry, &mut mirror) {
            Ok(_) => ReplicaOutcome::Applied,
            Err(err) => {
                warn!(
                    "best-effort replication to '{}' failed: {}",
                    self.secondary.name(),
                    err
                );
                ReplicaOutcome::Failed(err.to_string())
            }
        }
    }

    /// Replay queued operations onto the primary, best-effort.
    fn drain_queue(&self) -> Option<DrainReport> {
        match drainer::drain(
            self.primary.as_ref(),
            &self.queue,
            &self.registry,
            self.config.drain_limit,
        ) {
            Ok(report) => Some(report),
            Err(err) => {
                warn!("queue drain skipped: {}", err);
                None
            }
        }
    }

    /// Primary is unreachable: write the change set to the secondary with
    /// copy-back, appending the sync-queue rows to the same atomic batch.
    /// If the secondary fails too, the original primary error is
    /// re-raised: total write loss is surfaced, never swallowed.
    fn fall_back(
        &self,
        mut ops: Vec<Operation>,
        sources: Vec<EntityHandle>,
        primary_err: SyncError,
    ) -> SyncResult<CommitReport> {
        info!(
            "primary '{}' rejected commit ({}); falling back to '{}'",
            self.primary.name(),
            primary_err,
            self.secondary.name()
        );

        let reason = primary_err.to_string();
        match self.apply_fallback(&mut ops, &reason) {
            Ok(records) => {
                self.copy_back_all(&sources, &records);
                Ok(CommitReport {
                    target: CommitTarget::SecondaryQueued,
                    operations: ops.len(),
                    replication: ReplicaOutcome::Skipped,
                    drain: None,
                })
            }
            Err(fallback_err) => {
                error!(
                    "fallback to '{}' failed as well ({}); write lost",
                    self.secondary.name(),
                    fallback_err
                );
                Err(primary_err)
            }
        }
    }

    fn apply_fallback(
        &self,
        ops: &mut Vec<Operation>,
        reason: &str,
    ) -> SyncResult<Vec<Option<Record>>> {
        let Staged {
            mut writes,
            upserts,
        } = applier::stage(self.secondary.as_ref(), &self.registry, ops)?;

        // Queue rows snapshot the change set before the secondary assigns
        // anything, and commit in the same batch as the entity rows.
        writes.extend(self.queue.stage(ops, reason));

        let results = self.secondary.apply_batch(writes)?;
        applier::refresh(ops, &upserts, &results);
        Ok(applier::per_op_records(ops.len(), &upserts, &results))
    }

    fn copy_back_all(&self, sources: &[EntityHandle], records: &[Option<Record>]) {
        for (source, record) in sources.iter().zip(records) {
            if let Some(record) = record {
                let mut entity = source.write().unwrap();
                if let Err(err) = applier::copy_back(&mut *entity, record) {
                    warn!(
                        "copy-back failed for '{}': {}",
                        entity.descriptor().entity_type,
                        err
                    );
                }
            }
        }
    }
}

fn push_unique(handles: &mut Vec<EntityHandle>, handle: EntityHandle) {
    if !handles.iter().any(|h| Arc::ptr_eq(h, &handle)) {
        handles.push(handle);
    }
}

fn remove_handle(handles: &mut Vec<EntityHandle>, handle: &EntityHandle) {
    handles.retain(|h| !Arc::ptr_eq(h, handle));
}
