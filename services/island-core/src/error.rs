use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("storage error: {0}")]
    Storage(#[from] island_storage::StorageError),

    #[error("chain provider error: {0}")]
    Chain(#[from] island_chain::ChainError),

    #[error("content store error: {0}")]
    Content(#[from] island_chain::ContentError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
