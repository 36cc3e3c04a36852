//! Store seam consumed by the dual-write session.
//!
//! A store holds rows addressed by `(entity type, primary key)` at the
//! transport level; the typed view lives in the entity layer. The only
//! write path is [`EntityStore::apply_batch`], which commits a whole batch
//! or nothing, so the session's change set and any queue rows appended to
//! it land atomically.

pub mod keys;
pub mod memory;

use serde_json::{Map, Value};

use crate::error::SyncResult;

/// Transport-level column map of one row.
pub type Row = Map<String, Value>;

/// Transport-level row: primary-key components plus the column map.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: Vec<Value>,
    pub fields: Row,
}

/// One staged write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert-or-replace. An empty key asks the store to assign generated
    /// key values.
    Upsert {
        entity_type: String,
        key: Vec<Value>,
        fields: Row,
    },
    /// Remove by key. Removing an absent row is not an error.
    Delete {
        entity_type: String,
        key: Vec<Value>,
    },
}

pub trait EntityStore: Send + Sync {
    /// Store name, used in error and log context to tell the primary from
    /// the secondary.
    fn name(&self) -> &str;

    /// Fetch a row by primary key. `None` when absent.
    fn get(&self, entity_type: &str, key: &[Value]) -> SyncResult<Option<Record>>;

    /// Commit a batch atomically. A failed batch must leave the store
    /// untouched. Returns, aligned with the batch, the persisted record
    /// for each upsert (store-generated fields included) and `None` for
    /// each delete.
    fn apply_batch(&self, batch: Vec<WriteOp>) -> SyncResult<Vec<Option<Record>>>;

    /// All rows of a table, in key order.
    fn scan(&self, entity_type: &str) -> SyncResult<Vec<Record>>;
}

pub use memory::MemoryStore;
