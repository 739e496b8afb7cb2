use thiserror::Error;

/// Top-level error type. Most call sites deal in a crate-local error
/// (`ProviderError`, `GraphError`, `MemoryError`, `RouterError`) and only
/// convert into this one at the binary's outermost boundary.
#[derive(Debug, Error)]
pub enum ParleyError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("provider error: {0}")]
    Provider(String),

    #[error("conversation graph error: {0}")]
    Graph(String),

    #[error("memory error: {0}")]
    Memory(String),

    #[error("router error: {0}")]
    Router(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Short error code attached to tracing spans and surfaced to callers
    /// that want a stable identifier instead of a formatted string.
    pub fn code(&self) -> &'static str {
        match self {
            ParleyError::Config(_) => "CONFIG_ERROR",
            ParleyError::Provider(_) => "PROVIDER_ERROR",
            ParleyError::Graph(_) => "GRAPH_ERROR",
            ParleyError::Memory(_) => "MEMORY_ERROR",
            ParleyError::Router(_) => "ROUTER_ERROR",
            ParleyError::Serialization(_) => "SERIALIZATION_ERROR",
            ParleyError::Io(_) => "IO_ERROR",
            ParleyError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, ParleyError>;
