//! Driving port for account use-cases.
//!
//! Inbound adapters (HTTP handlers and the admin CLI) register, authenticate
//! and maintain accounts through [`Accounts`] without touching persistence.

use async_trait::async_trait;

use crate::domain::{EmailAddress, Error, LoginCredentials, Registration, Role, User, UserId};

/// Account use-cases.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Accounts: Send + Sync {
    /// Self-service registration. The requested role is honoured except for
    /// `admin`, which only approved emails receive.
    async fn register(&self, registration: Registration) -> Result<User, Error>;

    /// Check credentials against the canonical account for the email.
    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<User, Error>;

    /// Load the signed-in user.
    async fn current_user(&self, id: &UserId) -> Result<User, Error>;

    /// Operator account creation; any role may be assigned.
    async fn create_user(&self, registration: Registration, role: Role) -> Result<User, Error>;

    /// Replace the password of the canonical account for `email`.
    async fn reset_password(&self, email: &EmailAddress, password: &str) -> Result<User, Error>;
}
