use thiserror::Error;

use crate::util::crypto::SasError;
use crate::util::http::{ClientError, InvalidUriError, StatusCode};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid service request URI: {0}")]
    InvalidUri(#[from] InvalidUriError),

    #[error("failed to sign service credentials: {0}")]
    Credentials(#[from] SasError),

    #[error("twin was modified concurrently: {0}")]
    PreconditionFailed(String),

    #[error("twin has no etag, cannot update it conditionally")]
    MissingEtag,

    #[error(transparent)]
    Http(ClientError),
}

impl From<ClientError> for ServiceError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Response(StatusCode::PRECONDITION_FAILED, body) => {
                ServiceError::PreconditionFailed(body)
            }
            err => ServiceError::Http(err),
        }
    }
}
