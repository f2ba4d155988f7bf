// Error types shared by the entity services.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Client configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    // Remote-reported failure; the backend message is surfaced as-is.
    #[error("{0}")]
    Remote(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field: {0}")]
    InvalidField(&'static str),

    #[error("Failed to {op} {entity}")]
    OperationFailed {
        op: &'static str,
        entity: &'static str,
    },

    #[error("{0} is handled by the hosted platform UI")]
    Unsupported(&'static str),
}

impl ServiceError {
    // Not-found must stay distinguishable from a transport failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
