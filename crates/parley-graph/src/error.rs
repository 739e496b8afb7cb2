use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("chat adapter error: {0}")]
    Adapter(String),
}

pub type Result<T> = std::result::Result<T, GraphError>;
