use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Migration cycle: version {version} revisited while resolving a chain from version {from}")]
    MigrationCycle { from: u32, version: u32 },

    #[error("Record '{collection}:{id}' was written at schema version {stored}, newer than the declared version {current}")]
    FutureSchemaVersion {
        collection: String,
        id: String,
        stored: u32,
        current: u32,
    },

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
