use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("durable store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("distributed cache error: {0}")]
    Cache(String),

    #[error("provider error: {0}")]
    Provider(#[from] parley_providers::ProviderError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, MemoryError>;
