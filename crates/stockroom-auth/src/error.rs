//! Authentication error types.

use stockroom_core::error::StockroomError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is blocked")]
    AccountBlocked,

    #[error("password must be at least {min_length} characters")]
    WeakPassword { min_length: usize },

    #[error("invalid username: {0}")]
    InvalidUsername(String),

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid token: {0}")]
    TokenInvalid(String),

    #[error("cryptography error: {0}")]
    Crypto(String),
}

impl From<AuthError> for StockroomError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials
            | AuthError::AccountBlocked
            | AuthError::TokenExpired
            | AuthError::TokenInvalid(_) => StockroomError::AuthenticationFailed {
                reason: err.to_string(),
            },
            AuthError::WeakPassword { .. } | AuthError::InvalidUsername(_) => {
                StockroomError::Validation {
                    message: err.to_string(),
                }
            }
            AuthError::Crypto(msg) => StockroomError::Crypto(msg),
        }
    }
}
