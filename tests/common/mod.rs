//! Shared integration-test fixtures: a building-monitoring schema over
//! two in-memory stores.

#![allow(dead_code)]

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use duostore::{
    Column, ColumnType, DualSession, Entity, EntityDescriptor, EntityHandle, EntityRegistry,
    EnumSpec, FieldMap, FieldValue, MemoryStore,
};

pub static BATTERY_STATUS: EnumSpec = EnumSpec {
    name: "BatteryStatus",
    variants: &["charging", "discharging", "idle"],
};

static BATTERY_COLUMNS: [Column; 5] = [
    Column {
        name: "id",
        ty: ColumnType::Int,
        primary_key: true,
        generated: true,
    },
    Column {
        name: "name",
        ty: ColumnType::Text,
        primary_key: false,
        generated: false,
    },
    Column {
        name: "status",
        ty: ColumnType::Enum(&BATTERY_STATUS),
        primary_key: false,
        generated: false,
    },
    Column {
        name: "percentage",
        ty: ColumnType::Float,
        primary_key: false,
        generated: false,
    },
    Column {
        name: "created_at",
        ty: ColumnType::Timestamp,
        primary_key: false,
        generated: true,
    },
];

pub static BATTERY: EntityDescriptor = EntityDescriptor {
    entity_type: "battery",
    columns: &BATTERY_COLUMNS,
    new_instance: new_battery,
};

fn new_battery() -> Box<dyn Entity> {
    Box::new(Battery::default())
}

#[derive(Debug, Clone, Default)]
pub struct Battery {
    pub id: Option<i64>,
    pub name: String,
    pub status: Option<String>,
    pub percentage: f64,
    pub created_at: Option<DateTime<Utc>>,
}

impl Battery {
    pub fn named(name: &str, status: &str, percentage: f64) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            status: Some(status.to_string()),
            percentage,
            created_at: None,
        }
    }
}

impl Entity for Battery {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &BATTERY
    }

    fn primary_key(&self) -> Vec<FieldValue> {
        self.id.map(|id| vec![FieldValue::Int(id)]).unwrap_or_default()
    }

    fn fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(
            "id".to_string(),
            self.id.map(FieldValue::Int).unwrap_or(FieldValue::Null),
        );
        fields.insert("name".to_string(), FieldValue::Text(self.name.clone()));
        fields.insert(
            "status".to_string(),
            self.status
                .clone()
                .map(FieldValue::Enum)
                .unwrap_or(FieldValue::Null),
        );
        fields.insert("percentage".to_string(), FieldValue::Float(self.percentage));
        fields.insert(
            "created_at".to_string(),
            self.created_at
                .map(FieldValue::Timestamp)
                .unwrap_or(FieldValue::Null),
        );
        fields
    }

    fn apply_fields(&mut self, fields: &FieldMap) {
        for (name, value) in fields {
            match (name.as_str(), value) {
                ("id", FieldValue::Int(id)) => self.id = Some(*id),
                ("id", FieldValue::Null) => self.id = None,
                ("name", FieldValue::Text(name)) => self.name = name.clone(),
                ("status", FieldValue::Enum(status)) => self.status = Some(status.clone()),
                ("status", FieldValue::Null) => self.status = None,
                ("percentage", FieldValue::Float(p)) => self.percentage = *p,
                ("created_at", FieldValue::Timestamp(ts)) => self.created_at = Some(*ts),
                ("created_at", FieldValue::Null) => self.created_at = None,
                _ => {}
            }
        }
    }
}

pub fn registry() -> Arc<EntityRegistry> {
    let mut registry = EntityRegistry::new();
    registry.register(&BATTERY);
    Arc::new(registry)
}

pub struct TestRig {
    pub primary: Arc<MemoryStore>,
    pub secondary: Arc<MemoryStore>,
    pub registry: Arc<EntityRegistry>,
}

impl TestRig {
    pub fn new() -> Self {
        let registry = registry();
        Self {
            primary: Arc::new(MemoryStore::new("cloud", registry.clone())),
            secondary: Arc::new(MemoryStore::new("local", registry.clone())),
            registry,
        }
    }

    pub fn session(&self) -> DualSession {
        DualSession::new(
            self.primary.clone(),
            self.secondary.clone(),
            self.registry.clone(),
        )
    }
}

/// Wrap a battery in the shared-handle form the session tracks, keeping a
/// typed handle for assertions.
pub fn tracked(battery: Battery) -> (Arc<RwLock<Battery>>, EntityHandle) {
    let typed = Arc::new(RwLock::new(battery));
    let handle: EntityHandle = typed.clone();
    (typed, handle)
}
