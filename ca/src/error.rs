use mir_db::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum CaError {
    #[error("Suggested ID is not available")]
    IdentifierUnavailable,

    #[error("No key pair stored for certificate {fingerprint}")]
    KeyNotFound { fingerprint: String },

    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    #[error("Signing failed: {0}")]
    SigningFailure(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Invalid subject: {0}")]
    InvalidSubject(String),

    #[error("Organization not found: {0}")]
    OrganizationNotFound(String),

    #[error("Key sealing error: {0}")]
    KeySealing(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CaError {
    pub(crate) fn malformed(err: impl std::fmt::Display) -> Self {
        CaError::MalformedRequest(err.to_string())
    }

    pub(crate) fn signing(err: impl std::fmt::Display) -> Self {
        CaError::SigningFailure(err.to_string())
    }
}
