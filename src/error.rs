use thiserror::Error;

use crate::remote::RemoteError;

/// Result alias for every data-access operation. Remote failures are caught at
/// the service boundary and returned as values; nothing past it throws.
pub type ServiceResult<T> = Result<T, ServiceError>;

pub const CONNECTIVITY_MESSAGE: &str =
    "Cannot connect to the notes service. Check your network connection or the service status.";

#[derive(Error, Debug)]
pub enum ServiceError {
    /// The remote collaborator is unreachable (connect/timeout class failures).
    #[error("{CONNECTIVITY_MESSAGE}")]
    Connectivity,

    /// The remote accepted the request but the operation failed.
    #[error("{operation}: {message}")]
    Remote { operation: String, message: String },

    /// Local input validation; never sent to the network.
    #[error("invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("could not decode remote response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not signed in; run `secretkeeper login` first")]
    NotAuthenticated,
}

impl ServiceError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Normalize a remote-layer error under a per-operation description,
    /// keeping connectivity failures distinct and user-actionable.
    pub fn from_remote(operation: &str, err: RemoteError) -> Self {
        match err {
            RemoteError::Connectivity(_) => ServiceError::Connectivity,
            RemoteError::Api { message, .. } => ServiceError::Remote {
                operation: operation.to_string(),
                message,
            },
            RemoteError::Decode(err) => ServiceError::Decode(err),
        }
    }

    pub fn is_connectivity(&self) -> bool {
        matches!(self, ServiceError::Connectivity)
    }
}
