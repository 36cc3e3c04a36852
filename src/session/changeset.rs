//! Change-set capture: the session's pending mutations, materialized as
//! replicable operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::entity::{codec, key_is_set, Entity, EntityHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    Upsert,
    Delete,
}

/// The unit of replicated work: one write against one entity row, encoded
/// transport-safe so it can be applied to either store now or persisted in
/// the sync queue and replayed later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpKind,
    pub entity_type: String,
    /// Primary-key components, transport encoded. Empty until the row has
    /// been identified by a store.
    #[serde(default)]
    pub primary_key: Vec<Value>,
    /// Column map for upserts. `None` for deletes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Map<String, Value>>,
}

impl Operation {
    pub fn upsert_from(entity: &dyn Entity) -> Self {
        let fields = entity
            .fields()
            .iter()
            .map(|(name, value)| (name.clone(), codec::encode(value)))
            .collect();

        Self {
            kind: OpKind::Upsert,
            entity_type: entity.descriptor().entity_type.to_string(),
            primary_key: snapshot_key(entity),
            fields: Some(fields),
        }
    }

    /// Delete operation with the key captured now, before the delete is
    /// applied anywhere.
    pub fn delete_from(entity: &dyn Entity) -> Self {
        Self {
            kind: OpKind::Delete,
            entity_type: entity.descriptor().entity_type.to_string(),
            primary_key: snapshot_key(entity),
            fields: None,
        }
    }

    /// A key containing nulls is "not yet identified" and never matched
    /// against an existing row.
    pub fn key_is_identified(&self) -> bool {
        !self.primary_key.is_empty() && self.primary_key.iter().all(|c| !c.is_null())
    }
}

fn snapshot_key(entity: &dyn Entity) -> Vec<Value> {
    let key = entity.primary_key();
    if key_is_set(&key) {
        key.iter().map(codec::encode).collect()
    } else {
        Vec::new()
    }
}

/// An operation plus the in-memory instance that produced it. Lives only
/// for the duration of one commit call, so store-generated values can be
/// copied back onto the caller's object; never persisted or queued.
pub struct PendingChange {
    pub op: Operation,
    pub source: EntityHandle,
}

/// Materialize the session's tracked sets as one operation per instance.
/// Read-only with respect to the instances; ordering between distinct
/// instances is not significant, the set commits atomically.
pub fn capture(
    new: &[EntityHandle],
    dirty: &[EntityHandle],
    deleted: &[EntityHandle],
) -> Vec<PendingChange> {
    let mut changes = Vec::with_capacity(new.len() + dirty.len() + deleted.len());

    for handle in new.iter().chain(dirty) {
        let op = Operation::upsert_from(&*handle.read().unwrap());
        changes.push(PendingChange {
            op,
            source: handle.clone(),
        });
    }

    for handle in deleted {
        let op = Operation::delete_from(&*handle.read().unwrap());
        changes.push(PendingChange {
            op,
            source: handle.clone(),
        });
    }

    changes
}
