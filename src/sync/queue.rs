//! Durable sync queue.
//!
//! Operations that failed to reach the primary store are parked as rows of
//! a system table inside the secondary store, tagged with their attempt
//! count and last error. Rows are never deleted; the queue doubles as an
//! append-only audit of replication attempts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};
use crate::session::changeset::{OpKind, Operation};
use crate::storage::{EntityStore, Record, WriteOp};

/// Name of the queue's system table inside the secondary store.
pub const QUEUE_TABLE: &str = "_sync_queue";

/// Stored error messages are truncated to this many characters.
pub const MAX_ERROR_LEN: usize = 1000;

/// One durable queue row. The store assigns `id`; its insertion order is
/// the replay order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub entity_type: String,
    pub operation: OpKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl QueueEntry {
    fn from_operation(op: &Operation, error: &str) -> Self {
        Self {
            id: None,
            entity_type: op.entity_type.clone(),
            operation: op.kind,
            primary_key: if op.primary_key.is_empty() {
                None
            } else {
                Some(op.primary_key.clone())
            },
            fields: op.fields.clone(),
            attempts: 0,
            last_error: Some(truncate_error(error)),
            created_at: Utc::now(),
            synced_at: None,
        }
    }

    /// Reconstruct the operation this row was queued for.
    pub fn to_operation(&self) -> Operation {
        Operation {
            kind: self.operation,
            entity_type: self.entity_type.clone(),
            primary_key: self.primary_key.clone().unwrap_or_default(),
            fields: self.fields.clone(),
        }
    }

    fn to_row(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => unreachable!("queue entries serialize to objects"),
        }
    }

    fn from_record(record: &Record) -> SyncResult<Self> {
        let id = record
            .key
            .first()
            .and_then(Value::as_i64)
            .unwrap_or_default();
        serde_json::from_value(Value::Object(record.fields.clone())).map_err(|err| {
            SyncError::CorruptedQueueRow {
                id,
                reason: err.to_string(),
            }
        })
    }
}

fn truncate_error(error: &str) -> String {
    error.chars().take(MAX_ERROR_LEN).collect()
}

/// Handle on the queue table of one secondary store.
#[derive(Clone)]
pub struct SyncQueue {
    store: Arc<dyn EntityStore>,
}

impl SyncQueue {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Queue writes for `ops`, for inclusion in a caller-owned atomic
    /// batch (the fallback path commits entity rows and queue rows
    /// together).
    pub fn stage(&self, ops: &[Operation], error: &str) -> Vec<WriteOp> {
        ops.iter()
            .map(|op| WriteOp::Upsert {
                entity_type: QUEUE_TABLE.to_string(),
                key: Vec::new(),
                fields: QueueEntry::from_operation(op, error).to_row(),
            })
            .collect()
    }

    /// Append one durable row per operation, committing them as one
    /// batch. Returns the assigned row ids.
    pub fn enqueue(&self, ops: &[Operation], error: &str) -> SyncResult<Vec<i64>> {
        let results = self.store.apply_batch(self.stage(ops, error))?;
        Ok(results
            .into_iter()
            .flatten()
            .filter_map(|record| record.key.first().and_then(Value::as_i64))
            .collect())
    }

    /// Up to `limit` unsynced rows, oldest first.
    pub fn pending(&self, limit: usize) -> SyncResult<Vec<QueueEntry>> {
        let mut entries = Vec::new();
        for record in self.store.scan(QUEUE_TABLE)? {
            if entries.len() >= limit {
                break;
            }
            let entry = QueueEntry::from_record(&record)?;
            if entry.synced_at.is_none() {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Count of rows still awaiting replay.
    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.pending(usize::MAX)?.len())
    }

    /// Fetch one row by id.
    pub fn entry(&self, id: i64) -> SyncResult<Option<QueueEntry>> {
        self.store
            .get(QUEUE_TABLE, &[Value::from(id)])?
            .map(|record| QueueEntry::from_record(&record))
            .transpose()
    }

    /// Record a successful replay. `synced_at` is set at most once and
    /// never cleared.
    pub fn mark_synced(&self, id: i64) -> SyncResult<()> {
        self.update(id, |entry| {
            if entry.synced_at.is_none() {
                entry.synced_at = Some(Utc::now());
            }
            entry.last_error = None;
        })
    }

    /// Record a failed replay: bump the attempt counter, keep the latest
    /// error.
    pub fn mark_failed(&self, id: i64, error: &str) -> SyncResult<()> {
        self.update(id, |entry| {
            entry.attempts += 1;
            entry.last_error = Some(truncate_error(error));
        })
    }

    fn update(&self, id: i64, mutate: impl FnOnce(&mut QueueEntry)) -> SyncResult<()> {
        let key = vec![Value::from(id)];
        let record =
            self.store
                .get(QUEUE_TABLE, &key)?
                .ok_or_else(|| SyncError::CorruptedQueueRow {
                    id,
                    reason: "row not found".to_string(),
                })?;

        let mut entry = QueueEntry::from_record(&record)?;
        mutate(&mut entry);

        self.store.apply_batch(vec![WriteOp::Upsert {
            entity_type: QUEUE_TABLE.to_string(),
            key,
            fields: entry.to_row(),
        }])?;
        Ok(())
    }
}
