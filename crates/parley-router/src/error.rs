use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    #[error("provider error: {0}")]
    Provider(#[from] parley_providers::ProviderError),

    #[error("memory error: {0}")]
    Memory(#[from] parley_memory::MemoryError),

    #[error("conversation graph error: {0}")]
    Graph(#[from] parley_graph::error::GraphError),

    #[error("unknown ai_backend: {0}")]
    UnknownBackend(String),

    #[error("user '{0}' could not be resolved")]
    UnresolvedUser(String),
}

pub type Result<T> = std::result::Result<T, RouterError>;
