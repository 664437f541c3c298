//! Stockroom Auth: password verification, JWT issuance/validation and
//! resolution of bearer tokens to a [`Principal`].
//!
//! [`Principal`]: stockroom_core::access::Principal

pub mod config;
pub mod error;
pub mod password;
pub mod service;
pub mod token;

pub use config::AuthConfig;
pub use error::AuthError;
pub use service::{AuthService, LoginInput, LoginOutput, RegisterInput};
pub use token::AccessTokenClaims;
