use std::sync::Arc;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use metrics::counter;
use password_hash::rand_core::OsRng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::application::mail::{Mailer, OutgoingMail};
use crate::application::repos::{CreateUserParams, RepoError, UsersRepo};
use crate::domain::entities::UserRecord;
use crate::domain::error::DomainError;
use crate::domain::types::UserRole;
use crate::domain::users::{NewAccount, normalize_email};

/// Where anonymous visitors of protected pages are sent.
pub const LOGIN_VIEW: &str = "/auth/login";
pub const LOGIN_MESSAGE: &str = "Please log in to access this page.";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("an account with this email or username already exists")]
    AccountExists,
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("password hashing failed: {0}")]
    Hashing(String),
    #[error(transparent)]
    Repo(RepoError),
}

impl From<RepoError> for AuthError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate { .. } => AuthError::AccountExists,
            other => AuthError::Repo(other),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UsersRepo>,
    mailer: Arc<dyn Mailer>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UsersRepo>, mailer: Arc<dyn Mailer>) -> Self {
        Self { users, mailer }
    }

    /// Resolve the principal stored in a session.
    ///
    /// Malformed identifiers and unknown users both resolve to `None`; only
    /// persistence failures surface as errors.
    pub async fn load_user(&self, user_id: &str) -> Result<Option<UserRecord>, RepoError> {
        let Ok(id) = user_id.trim().parse::<i64>() else {
            debug!(
                target = "storefront::auth",
                user_id, "ignoring malformed session user id"
            );
            return Ok(None);
        };
        self.users.find_user(id).await
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> Result<UserRecord, AuthError> {
        let Ok(email) = normalize_email(email) else {
            counter!("storefront_login_failure_total").increment(1);
            return Err(AuthError::InvalidCredentials);
        };

        let Some(user) = self.users.find_user_by_email(&email).await? else {
            counter!("storefront_login_failure_total").increment(1);
            return Err(AuthError::InvalidCredentials);
        };

        if verify_password(password, &user.password_hash)? {
            counter!("storefront_login_success_total").increment(1);
            Ok(user)
        } else {
            counter!("storefront_login_failure_total").increment(1);
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Create a customer account and send the welcome mail.
    ///
    /// Mail delivery failures are logged and do not fail the registration.
    pub async fn register(&self, account: NewAccount) -> Result<UserRecord, AuthError> {
        let password_hash = hash_password(&account.password)?;
        let user = self
            .users
            .create_user(CreateUserParams {
                username: account.username,
                email: account.email,
                password_hash,
                role: UserRole::Customer,
            })
            .await?;

        let welcome = OutgoingMail::new(
            user.email.clone(),
            "Welcome to the shop",
            format!(
                "Hello {},\n\nyour account is ready. Happy shopping!\n",
                user.username
            ),
        );
        if let Err(err) = self.mailer.send(welcome).await {
            warn!(
                target = "storefront::auth",
                user_id = user.id,
                error = %err,
                "welcome mail could not be sent"
            );
        }

        Ok(user)
    }

    pub fn users(&self) -> &Arc<dyn UsersRepo> {
        &self.users
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthError::Hashing(err.to_string()))
}

fn verify_password(password: &str, stored: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(stored).map_err(|err| AuthError::Hashing(err.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Accept only same-origin relative paths as post-login destinations.
pub fn safe_next_path(next: Option<&str>) -> Option<String> {
    let next = next?.trim();
    let is_local = next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.contains("://");
    is_local.then(|| next.to_string())
}
