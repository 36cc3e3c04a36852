//! In-memory store backend.
//!
//! Tables are BTree-ordered over the binary-comparable key encoding, so
//! `scan` is deterministic and integer ids come back in insertion order,
//! the property the sync queue's FIFO discipline rests on. The `offline`
//! switch makes every operation fail the way an unreachable store would.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde_json::Value;

use super::keys::encode_key;
use super::{EntityStore, Record, Row, WriteOp};
use crate::entity::{ColumnType, EntityRegistry};
use crate::error::{SyncError, SyncResult};

#[derive(Default)]
struct Table {
    rows: BTreeMap<Vec<u8>, Record>,
    next_id: i64,
}

pub struct MemoryStore {
    name: String,
    registry: Arc<EntityRegistry>,
    tables: RwLock<HashMap<String, Table>>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new(name: impl Into<String>, registry: Arc<EntityRegistry>) -> Self {
        Self {
            name: name.into(),
            registry,
            tables: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate an outage: while offline, every operation fails with
    /// `StoreUnavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> SyncResult<()> {
        if self.is_offline() {
            return Err(SyncError::StoreUnavailable {
                store: self.name.clone(),
                reason: "store is offline".to_string(),
            });
        }
        Ok(())
    }

    /// Name of the integer primary-key column the store may assign itself,
    /// if the table has one. Tables without a registered descriptor (the
    /// queue's system table) get an implicit auto-increment `id`.
    fn auto_key_column(&self, entity_type: &str) -> Option<&'static str> {
        match self.registry.resolve(entity_type) {
            Ok(descriptor) => {
                let pk: Vec<_> = descriptor.primary_key_columns().collect();
                match pk.as_slice() {
                    [column] if column.generated && matches!(column.ty, ColumnType::Int) => {
                        Some(column.name)
                    }
                    _ => None,
                }
            }
            Err(_) => Some("id"),
        }
    }

    /// Fill server-default timestamp columns that arrived null or absent.
    /// Applied to new rows only; updates keep whatever they carry.
    fn fill_generated(&self, entity_type: &str, fields: &mut Row) {
        if let Ok(descriptor) = self.registry.resolve(entity_type) {
            for column in descriptor.columns {
                if column.generated && matches!(column.ty, ColumnType::Timestamp) {
                    let missing = fields
                        .get(column.name)
                        .map(Value::is_null)
                        .unwrap_or(true);
                    if missing {
                        fields.insert(
                            column.name.to_string(),
                            Value::String(Utc::now().to_rfc3339()),
                        );
                    }
                }
            }
        }
    }
}

impl EntityStore for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, entity_type: &str, key: &[Value]) -> SyncResult<Option<Record>> {
        self.check_online()?;
        let tables = self.tables.read().unwrap();
        Ok(tables
            .get(entity_type)
            .and_then(|table| table.rows.get(&encode_key(key)).cloned()))
    }

    fn apply_batch(&self, batch: Vec<WriteOp>) -> SyncResult<Vec<Option<Record>>> {
        self.check_online()?;

        // Validate before touching anything so a rejected batch leaves the
        // store untouched.
        for op in &batch {
            if let WriteOp::Upsert {
                entity_type, key, ..
            } = op
            {
                if key.is_empty() && self.auto_key_column(entity_type).is_none() {
                    return Err(SyncError::BatchRejected {
                        store: self.name.clone(),
                        reason: format!(
                            "upsert into '{}' has no key and the table has no generated key column",
                            entity_type
                        ),
                    });
                }
            }
        }

        let mut tables = self.tables.write().unwrap();
        let mut results = Vec::with_capacity(batch.len());

        for op in batch {
            match op {
                WriteOp::Upsert {
                    entity_type,
                    key,
                    mut fields,
                } => {
                    let auto_column = self.auto_key_column(&entity_type);
                    let table = tables.entry(entity_type.clone()).or_default();

                    let key = if key.is_empty() {
                        let column = auto_column.expect("validated above");
                        table.next_id += 1;
                        let id = table.next_id;
                        fields.insert(column.to_string(), Value::from(id));
                        vec![Value::from(id)]
                    } else {
                        // Keep the counter ahead of explicitly keyed rows.
                        if let [component] = key.as_slice() {
                            if auto_column.is_some() {
                                if let Some(id) = component.as_i64() {
                                    table.next_id = table.next_id.max(id);
                                }
                            }
                        }
                        key
                    };

                    let encoded = encode_key(&key);
                    if !table.rows.contains_key(&encoded) {
                        self.fill_generated(&entity_type, &mut fields);
                    }

                    let record = Record { key, fields };
                    table.rows.insert(encoded, record.clone());
                    results.push(Some(record));
                }
                WriteOp::Delete { entity_type, key } => {
                    if let Some(table) = tables.get_mut(&entity_type) {
                        table.rows.remove(&encode_key(&key));
                    }
                    results.push(None);
                }
            }
        }

        Ok(results)
    }

    fn scan(&self, entity_type: &str) -> SyncResult<Vec<Record>> {
        self.check_online()?;
        let tables = self.tables.read().unwrap();
        Ok(tables
            .get(entity_type)
            .map(|table| table.rows.values().cloned().collect())
            .unwrap_or_default())
    }
}
