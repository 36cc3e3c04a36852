//! Shared unit-test fixtures: a small building-monitoring schema with
//! hand-written introspection impls.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

use crate::entity::{
    Column, ColumnType, Entity, EntityDescriptor, EntityHandle, EntityRegistry, EnumSpec,
    FieldMap, FieldValue,
};

pub static BATTERY_STATUS: EnumSpec = EnumSpec {
    name: "BatteryStatus",
    variants: &["charging", "discharging", "idle"],
};

pub static ALERT_LEVEL: EnumSpec = EnumSpec {
    name: "AlertLevel",
    variants: &["info", "warning", "critical"],
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

static ALERT_COLUMNS: [Column; 4] = [
    Column {
        name: "id",
        ty: ColumnType::Int,
        primary_key: true,
        generated: true,
    },
    Column {
        name: "title",
        ty: ColumnType::Text,
        primary_key: false,
        generated: false,
    },
    Column {
        name: "level",
        ty: ColumnType::Enum(&ALERT_LEVEL),
        primary_key: false,
        generated: false,
    },
    Column {
        name: "detected_at",
        ty: ColumnType::Timestamp,
        primary_key: false,
        generated: false,
    },
];

pub static ALERT: EntityDescriptor = EntityDescriptor {
    entity_type: "alert",
    columns: &ALERT_COLUMNS,
    new_instance: new_alert,
};

fn new_alert() -> Box<dyn Entity> {
    Box::new(Alert::default())
}

#[derive(Debug, Clone, Default)]
pub struct Alert {
    pub id: Option<i64>,
    pub title: String,
    pub level: Option<String>,
    pub detected_at: Option<DateTime<Utc>>,
}

impl Entity for Alert {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &ALERT
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
        fields.insert("title".to_string(), FieldValue::Text(self.title.clone()));
        fields.insert(
            "level".to_string(),
            self.level
                .clone()
                .map(FieldValue::Enum)
                .unwrap_or(FieldValue::Null),
        );
        fields.insert(
            "detected_at".to_string(),
            self.detected_at
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
                ("title", FieldValue::Text(title)) => self.title = title.clone(),
                ("level", FieldValue::Enum(level)) => self.level = Some(level.clone()),
                ("level", FieldValue::Null) => self.level = None,
                ("detected_at", FieldValue::Timestamp(ts)) => self.detected_at = Some(*ts),
                ("detected_at", FieldValue::Null) => self.detected_at = None,
                _ => {}
            }
        }
    }
}

// Natural text key, nothing store-generated; exercises the non-generated
// primary-key paths.
static BUILDING_COLUMNS: [Column; 2] = [
    Column {
        name: "code",
        ty: ColumnType::Text,
        primary_key: true,
        generated: false,
    },
    Column {
        name: "floors",
        ty: ColumnType::Int,
        primary_key: false,
        generated: false,
    },
];

pub static BUILDING: EntityDescriptor = EntityDescriptor {
    entity_type: "building",
    columns: &BUILDING_COLUMNS,
    new_instance: new_building,
};

fn new_building() -> Box<dyn Entity> {
    Box::new(Building::default())
}

#[derive(Debug, Clone, Default)]
pub struct Building {
    pub code: Option<String>,
    pub floors: i64,
}

impl Entity for Building {
    fn descriptor(&self) -> &'static EntityDescriptor {
        &BUILDING
    }

    fn primary_key(&self) -> Vec<FieldValue> {
        self.code
            .clone()
            .map(|code| vec![FieldValue::Text(code)])
            .unwrap_or_default()
    }

    fn fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(
            "code".to_string(),
            self.code
                .clone()
                .map(FieldValue::Text)
                .unwrap_or(FieldValue::Null),
        );
        fields.insert("floors".to_string(), FieldValue::Int(self.floors));
        fields
    }

    fn apply_fields(&mut self, fields: &FieldMap) {
        for (name, value) in fields {
            match (name.as_str(), value) {
                ("code", FieldValue::Text(code)) => self.code = Some(code.clone()),
                ("code", FieldValue::Null) => self.code = None,
                ("floors", FieldValue::Int(floors)) => self.floors = *floors,
                _ => {}
            }
        }
    }
}

/// Registry with the battery and alert fixtures registered.
pub fn registry() -> Arc<EntityRegistry> {
    let mut registry = EntityRegistry::new();
    registry.register(&BATTERY);
    registry.register(&ALERT);
    Arc::new(registry)
}

/// Wrap a fixture in the shared-handle form the session tracks, keeping a
/// typed handle for assertions.
pub fn handle(battery: Battery) -> (Arc<RwLock<Battery>>, EntityHandle) {
    let typed = Arc::new(RwLock::new(battery));
    let tracked: EntityHandle = typed.clone();
    (typed, tracked)
}
