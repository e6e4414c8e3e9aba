use thiserror::Error;

use crate::validation::NameError;

/// Errors that can arise while managing quests, regions, and their records.
#[derive(Debug, Error)]
pub enum QuestError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A quest or region name failed validation at the call boundary.
    #[error("invalid name: {0}")]
    InvalidName(#[from] NameError),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },
}
