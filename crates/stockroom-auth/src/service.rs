//! Authentication service: registration, login and bearer token
//! resolution.

use stockroom_core::access::Principal;
use stockroom_core::error::{StockroomError, StockroomResult};
use stockroom_core::models::user::{CreateUser, User};
use stockroom_core::repository::UserRepository;
use tracing::{info, warn};

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::password;
use crate::token;

/// Input for self-registration.
#[derive(Debug)]
pub struct RegisterInput {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

/// Input for the login flow.
#[derive(Debug)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Successful login result.
#[derive(Debug)]
pub struct LoginOutput {
    /// Signed JWT access token.
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
    pub principal: Principal,
}

/// Authentication service.
///
/// Generic over the user repository so that the auth layer has no
/// dependency on the database crate.
pub struct AuthService<U: UserRepository> {
    user_repo: U,
    config: AuthConfig,
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::InvalidUsername("must not be empty".into()));
    }
    if username.trim() != username {
        return Err(AuthError::InvalidUsername(
            "must not start or end with whitespace".into(),
        ));
    }
    Ok(())
}

impl<U: UserRepository> AuthService<U> {
    pub fn new(user_repo: U, config: AuthConfig) -> Self {
        Self { user_repo, config }
    }

    /// Create an account with the configured default role.
    pub async fn register(&self, input: RegisterInput) -> StockroomResult<User> {
        validate_username(&input.username)?;
        password::check_policy(&input.password, self.config.min_password_length)?;

        let user = self
            .user_repo
            .create(CreateUser {
                username: input.username,
                email: input.email,
                password: input.password,
                role: Some(self.config.default_role),
            })
            .await?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Verify username + password and issue an access token.
    pub async fn login(&self, input: LoginInput) -> StockroomResult<LoginOutput> {
        let user = match self.user_repo.get_by_username(&input.username).await {
            Ok(u) => u,
            Err(StockroomError::NotFound { .. }) => {
                return Err(AuthError::InvalidCredentials.into());
            }
            Err(e) => return Err(e),
        };

        let valid = password::verify_password(
            &input.password,
            &user.password_hash,
            self.config.pepper.as_deref(),
        )?;
        if !valid {
            warn!(username = %input.username, "Rejected login: bad password");
            return Err(AuthError::InvalidCredentials.into());
        }

        if user.blocked {
            warn!(user_id = %user.id, "Rejected login: account blocked");
            return Err(AuthError::AccountBlocked.into());
        }

        let access_token = token::issue_access_token(user.id, &user.username, &self.config)?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginOutput {
            access_token,
            expires_in: self.config.access_token_lifetime_secs,
            principal: Principal::from(&user),
        })
    }

    /// Resolve a bearer token to the current state of its user.
    ///
    /// The user is reloaded so that blocking or deleting an account
    /// invalidates its outstanding tokens.
    pub async fn authenticate(&self, access_token: &str) -> StockroomResult<Principal> {
        let claims = token::decode_access_token(access_token, &self.config)?;
        let user_id = claims.user_id()?;

        let user = match self.user_repo.get_by_id(user_id).await {
            Ok(u) => u,
            Err(StockroomError::NotFound { .. }) => {
                return Err(AuthError::TokenInvalid("unknown subject".into()).into());
            }
            Err(e) => return Err(e),
        };

        if user.blocked {
            return Err(AuthError::AccountBlocked.into());
        }

        Ok(Principal::from(&user))
    }
}
