use domain::{AuthError, DomainError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("domain error: {0}")]
    Domain(#[from] DomainError),
    #[error("authentication failed: {0}")]
    Authentication(#[from] AuthError),
}
