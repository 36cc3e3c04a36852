use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Unknown enum value {value} for enum '{name}'")]
    UnknownEnumValue { name: &'static str, value: String },

    #[error("Malformed timestamp: {0}")]
    MalformedTimestamp(String),

    #[error("Invalid {expected} value: {value}")]
    InvalidScalar { expected: &'static str, value: String },

    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Store '{store}' unavailable: {reason}")]
    StoreUnavailable { store: String, reason: String },

    #[error("Store '{store}' rejected batch: {reason}")]
    BatchRejected { store: String, reason: String },

    #[error("Corrupted queue row {id}: {reason}")]
    CorruptedQueueRow { id: i64, reason: String },

    #[error("Session is closed")]
    SessionClosed,

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// True for failures of the store round-trip itself. These are the
    /// errors the coordinator recovers from by falling back to the
    /// secondary store; everything else (codec, registry, corruption)
    /// would fail identically against either store and propagates.
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. } | Self::BatchRejected { .. }
        )
    }
}
