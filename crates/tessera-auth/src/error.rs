//! Authentication error types.

use tessera_core::error::TesseraError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not authorized")]
    NotAuthorized,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for TesseraError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotAuthorized => TesseraError::Unauthorized,
            AuthError::Crypto(msg) => TesseraError::Crypto(msg),
        }
    }
}
