use loyalty_engine::{LoyaltyError, LoyaltyStoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}

impl From<LoyaltyStoreError> for ServerError {
    fn from(e: LoyaltyStoreError) -> Self {
        Self::BackendError(e.to_string())
    }
}

impl From<LoyaltyError> for ServerError {
    fn from(e: LoyaltyError) -> Self {
        Self::BackendError(e.to_string())
    }
}
