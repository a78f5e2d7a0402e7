//! Port abstraction for user persistence adapters and their errors.
use async_trait::async_trait;

use crate::domain::{DisplayName, EmailAddress, Role, User, UserId};

use super::define_port_error;

define_port_error! {
    /// Persistence errors raised by user repository adapters.
    pub enum UserPersistenceError {
        /// Repository connection could not be established.
        Connection { message: String } => "user repository connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } => "user repository query failed: {message}",
        /// An account already uses the canonical email.
        DuplicateEmail { email: String } => "an account already exists for {email}",
    }
}

/// A user together with the stored password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Insert request for a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: EmailAddress,
    pub display_name: DisplayName,
    pub role: Role,
    pub password_hash: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fetch a user by identifier.
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserPersistenceError>;

    /// Fetch the canonical account for an email.
    ///
    /// Several legacy rows may share an email. Active accounts win, then the
    /// earliest created.
    async fn find_credentials(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<StoredCredentials>, UserPersistenceError>;

    /// Insert a new account.
    async fn create(&self, user: &NewUser) -> Result<User, UserPersistenceError>;

    /// Replace the password hash on an account.
    async fn update_password(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<(), UserPersistenceError>;
}

/// Fixture repository that stores nothing.
///
/// Lookups return `None` and created users are echoed back with a fresh id.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUserRepository;

#[async_trait]
impl UserRepository for FixtureUserRepository {
    async fn find_by_id(&self, _id: &UserId) -> Result<Option<User>, UserPersistenceError> {
        Ok(None)
    }

    async fn find_credentials(
        &self,
        _email: &EmailAddress,
    ) -> Result<Option<StoredCredentials>, UserPersistenceError> {
        Ok(None)
    }

    async fn create(&self, user: &NewUser) -> Result<User, UserPersistenceError> {
        Ok(User {
            id: UserId::random(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            role: user.role,
            active: true,
            created_at: chrono::Utc::now(),
        })
    }

    async fn update_password(
        &self,
        _id: &UserId,
        _password_hash: &str,
    ) -> Result<(), UserPersistenceError> {
        Ok(())
    }
}
