//! Operation applier: stages a set of operations against one store,
//! commits them as a single atomic batch, and re-derives each upsert's
//! key and fields from the persisted record so store-generated values can
//! flow back to the caller.

use serde_json::Map;

use super::changeset::{OpKind, Operation};
use crate::entity::{codec, Entity, EntityDescriptor, EntityRegistry, FieldMap};
use crate::error::SyncResult;
use crate::storage::{EntityStore, Record, Row, WriteOp};

/// A batch ready for one atomic commit, plus the mapping from upsert write
/// slots back to the operations that produced them. A caller may append
/// further writes (queue rows) before committing; the mapping stays valid
/// because it indexes into the front of the batch.
pub struct Staged {
    pub writes: Vec<WriteOp>,
    /// `(operation index, write index)` for every staged upsert.
    pub upserts: Vec<(usize, usize)>,
}

impl Staged {
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Stage `ops` against `store`. Upserts resolve an existing row by key
/// when one is identified, otherwise start from a blank instance; the
/// operation's fields are decoded per column and applied on top, and the
/// full instance is re-encoded as the staged row. Deletes stage a removal
/// for identified keys and nothing otherwise. Codec and registry failures
/// surface immediately.
pub fn stage(
    store: &dyn EntityStore,
    registry: &EntityRegistry,
    ops: &[Operation],
) -> SyncResult<Staged> {
    let mut writes = Vec::with_capacity(ops.len());
    let mut upserts = Vec::new();

    for (index, op) in ops.iter().enumerate() {
        let descriptor = registry.resolve(&op.entity_type)?;
        match op.kind {
            OpKind::Upsert => {
                let existing = if op.key_is_identified() {
                    store.get(&op.entity_type, &op.primary_key)?
                } else {
                    None
                };

                let mut instance = match &existing {
                    Some(record) => materialize(descriptor, record)?,
                    None => (descriptor.new_instance)(),
                };
                if let Some(fields) = &op.fields {
                    instance.apply_fields(&decode_fields(descriptor, fields)?);
                }

                let key = existing
                    .map(|record| record.key)
                    .unwrap_or_else(|| op.primary_key.clone());

                upserts.push((index, writes.len()));
                writes.push(WriteOp::Upsert {
                    entity_type: op.entity_type.clone(),
                    key,
                    fields: encode_instance(instance.as_ref()),
                });
            }
            OpKind::Delete => {
                // Removing an absent row is fine; a row that was never
                // identified has nothing to match and stages nothing.
                if op.key_is_identified() {
                    writes.push(WriteOp::Delete {
                        entity_type: op.entity_type.clone(),
                        key: op.primary_key.clone(),
                    });
                }
            }
        }
    }

    Ok(Staged { writes, upserts })
}

/// Re-derive key and fields for every staged upsert from its persisted
/// record, capturing store-generated values.
pub fn refresh(ops: &mut [Operation], upserts: &[(usize, usize)], results: &[Option<Record>]) {
    for (op_index, write_index) in upserts {
        if let Some(Some(record)) = results.get(*write_index) {
            let op = &mut ops[*op_index];
            op.primary_key = record.key.clone();
            op.fields = Some(record.fields.clone());
        }
    }
}

/// Stage, commit, refresh. Returns the persisted record per operation
/// (`None` for deletes) so the caller can copy final values back onto the
/// originating instances if requested.
pub fn apply(
    store: &dyn EntityStore,
    registry: &EntityRegistry,
    ops: &mut [Operation],
) -> SyncResult<Vec<Option<Record>>> {
    let Staged { writes, upserts } = stage(store, registry, ops)?;
    let results = store.apply_batch(writes)?;
    refresh(ops, &upserts, &results);
    Ok(per_op_records(ops.len(), &upserts, &results))
}

/// Spread batch results back over operation indexes.
pub(crate) fn per_op_records(
    op_count: usize,
    upserts: &[(usize, usize)],
    results: &[Option<Record>],
) -> Vec<Option<Record>> {
    let mut records = vec![None; op_count];
    for (op_index, write_index) in upserts {
        records[*op_index] = results.get(*write_index).cloned().flatten();
    }
    records
}

/// Write a persisted record's values onto the instance that produced it.
pub fn copy_back(entity: &mut dyn Entity, record: &Record) -> SyncResult<()> {
    let descriptor = entity.descriptor();
    let decoded = decode_fields(descriptor, &record.fields)?;
    entity.apply_fields(&decoded);
    Ok(())
}

/// Rebuild a typed instance from a stored record.
fn materialize(descriptor: &EntityDescriptor, record: &Record) -> SyncResult<Box<dyn Entity>> {
    let mut instance = (descriptor.new_instance)();
    instance.apply_fields(&decode_fields(descriptor, &record.fields)?);
    Ok(instance)
}

/// Decode a transport row per the descriptor's column types. Field names
/// without a column are skipped, keeping replay lenient.
fn decode_fields(
    descriptor: &EntityDescriptor,
    fields: &Map<String, serde_json::Value>,
) -> SyncResult<FieldMap> {
    let mut decoded = FieldMap::new();
    for (name, raw) in fields {
        if let Some(column) = descriptor.column(name) {
            decoded.insert(name.clone(), codec::decode(raw, column.ty)?);
        }
    }
    Ok(decoded)
}

fn encode_instance(entity: &dyn Entity) -> Row {
    entity
        .fields()
        .iter()
        .map(|(name, value)| (name.clone(), codec::encode(value)))
        .collect()
}
