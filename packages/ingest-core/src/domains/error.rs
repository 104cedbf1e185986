use thiserror::Error;

/// Error kinds surfaced by the service layer.
///
/// The HTTP surface (out of scope here) maps these onto status codes:
/// Validation 400, Auth 401, TenantMismatch 403, NotFound 404,
/// LimitExceeded 429, Internal 500. Background jobs never return these
/// to the request path; they record terminal state on their own rows.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("resource belongs to another tenant")]
    TenantMismatch,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    LimitExceeded(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
