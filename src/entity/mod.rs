//! Entity introspection: typed column values, the `Entity` trait, and the
//! compile-time registry that resolves a stored type name back to a
//! descriptor when operations are replayed from the queue.

pub mod codec;
pub mod registry;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

pub use codec::{ColumnType, EnumSpec};
pub use registry::{Column, EntityDescriptor, EntityRegistry};

/// A typed column value.
///
/// This is the in-memory side of the column codec; the transport side is
/// `serde_json::Value`. Enum values carry their symbolic variant name,
/// never an ordinal.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Symbolic variant name of an enum column.
    Enum(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Field-name to typed-value mapping, as produced by [`Entity::fields`].
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Introspection surface every persisted entity type implements by hand.
///
/// `apply_fields` mutates only the fields present in the mapping and
/// ignores unknown field names, which keeps replay lenient when the queue
/// holds rows written by a newer schema.
pub trait Entity: Send + Sync {
    fn descriptor(&self) -> &'static EntityDescriptor;

    /// Primary-key values in column order. Empty until the store has
    /// assigned generated keys.
    fn primary_key(&self) -> Vec<FieldValue>;

    /// All persisted fields, primary-key columns included.
    fn fields(&self) -> FieldMap;

    fn apply_fields(&mut self, fields: &FieldMap);
}

/// Shared handle to an instance tracked by a session. The session keeps
/// one of these per pending mutation so that store-generated values can be
/// copied back onto the caller's object after a successful write.
pub type EntityHandle = Arc<RwLock<dyn Entity>>;

/// A primary key is usable for row matching only when every component is
/// set; a partially populated key means "not yet identified".
pub fn key_is_set(key: &[FieldValue]) -> bool {
    !key.is_empty() && key.iter().all(|component| !component.is_null())
}
