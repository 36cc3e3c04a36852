//! Compile-time entity registry. Each persisted type registers a static
//! descriptor at process startup; the drainer resolves the stable type
//! name stored in a queue row back to the descriptor through this map, so
//! an unknown type is a registration gap rather than a runtime parse of a
//! type name.

use std::collections::HashMap;

use super::codec::ColumnType;
use super::Entity;
use crate::error::{SyncError, SyncResult};

/// Static description of one persisted column.
#[derive(Debug)]
pub struct Column {
    pub name: &'static str,
    pub ty: ColumnType,
    pub primary_key: bool,
    /// Assigned by the store on insert: auto-increment ids and
    /// server-default timestamps.
    pub generated: bool,
}

/// Static description of one entity type: its stable name, its columns,
/// and a constructor for blank instances.
#[derive(Debug)]
pub struct EntityDescriptor {
    pub entity_type: &'static str,
    pub columns: &'static [Column],
    pub new_instance: fn() -> Box<dyn Entity>,
}

impl EntityDescriptor {
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.primary_key)
    }
}

/// Entity-type name to descriptor map, populated once at startup.
#[derive(Default)]
pub struct EntityRegistry {
    types: HashMap<&'static str, &'static EntityDescriptor>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: &'static EntityDescriptor) {
        self.types.insert(descriptor.entity_type, descriptor);
    }

    pub fn resolve(&self, entity_type: &str) -> SyncResult<&'static EntityDescriptor> {
        self.types
            .get(entity_type)
            .copied()
            .ok_or_else(|| SyncError::UnknownEntityType(entity_type.to_string()))
    }

    pub fn contains(&self, entity_type: &str) -> bool {
        self.types.contains_key(entity_type)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
