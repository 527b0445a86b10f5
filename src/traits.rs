use crate::model::EntityDescriptor;
use async_trait::async_trait;
use thiserror::Error;

/// Failures raised while reaching the metadata source, before any filtering runs.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Unsupported connection: {0}")]
    UnsupportedConnection(String),
    #[error("Failed to read metadata from '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed metadata document '{path}': {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Returns an identifier for logging (e.g., the snapshot path).
    fn source_id(&self) -> &str;

    /// Retrieves every entity together with its attributes in one round trip.
    async fn retrieve_all_entities(&self) -> Result<Vec<EntityDescriptor>, SourceError>;
}
