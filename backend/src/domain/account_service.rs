//! Account domain service.
//!
//! Implements the [`Accounts`] driving port over a [`UserRepository`].
//! Passwords are hashed with Argon2id; login failures never reveal whether
//! the email or the password was wrong.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::domain::auth::{PASSWORD_MIN_LEN, hash_password, verify_password};
use crate::domain::ports::{Accounts, NewUser, UserPersistenceError, UserRepository};
use crate::domain::{EmailAddress, Error, LoginCredentials, Registration, Role, User, UserId};

const INVALID_CREDENTIALS: &str = "invalid email or password";

fn map_user_error(error: UserPersistenceError) -> Error {
    match error {
        UserPersistenceError::Connection { message } => {
            Error::service_unavailable(format!("user repository unavailable: {message}"))
        }
        UserPersistenceError::Query { message } => {
            Error::internal(format!("user repository error: {message}"))
        }
        UserPersistenceError::DuplicateEmail { email } => {
            Error::conflict(format!("an account already exists for {email}"))
        }
    }
}

/// Account service implementing the [`Accounts`] port.
#[derive(Clone)]
pub struct AccountService<U> {
    users: Arc<U>,
    approved_admins: Arc<[EmailAddress]>,
}

impl<U> AccountService<U> {
    /// Create a service. Emails in `approved_admins` receive the admin role
    /// when they register.
    pub fn new(users: Arc<U>, approved_admins: Vec<EmailAddress>) -> Self {
        Self {
            users,
            approved_admins: approved_admins.into(),
        }
    }

    fn registration_role(&self, registration: &Registration) -> Role {
        if self.approved_admins.contains(&registration.email) {
            Role::Admin
        } else if registration.requested_role.is_admin() {
            Role::User
        } else {
            registration.requested_role
        }
    }
}

impl<U> AccountService<U>
where
    U: UserRepository,
{
    async fn insert(&self, registration: Registration, role: Role) -> Result<User, Error> {
        let existing = self
            .users
            .find_credentials(&registration.email)
            .await
            .map_err(map_user_error)?;
        if existing.is_some() {
            return Err(Error::conflict(format!(
                "an account already exists for {}",
                registration.email
            )));
        }

        let password_hash = hash_password(registration.password.as_str())
            .map_err(|err| Error::internal(err.to_string()))?;
        self.users
            .create(&NewUser {
                email: registration.email,
                display_name: registration.display_name,
                role,
                password_hash,
            })
            .await
            .map_err(map_user_error)
    }
}

#[async_trait]
impl<U> Accounts for AccountService<U>
where
    U: UserRepository,
{
    async fn register(&self, registration: Registration) -> Result<User, Error> {
        let role = self.registration_role(&registration);
        self.insert(registration, role).await
    }

    async fn authenticate(&self, credentials: &LoginCredentials) -> Result<User, Error> {
        let Some(stored) = self
            .users
            .find_credentials(credentials.email())
            .await
            .map_err(map_user_error)?
        else {
            return Err(Error::unauthorized(INVALID_CREDENTIALS));
        };

        let verified = match verify_password(credentials.password(), &stored.password_hash) {
            Ok(verified) => verified,
            Err(err) => {
                warn!(user_id = %stored.user.id, error = %err, "stored password hash rejected");
                false
            }
        };
        if verified && stored.user.active {
            Ok(stored.user)
        } else {
            Err(Error::unauthorized(INVALID_CREDENTIALS))
        }
    }

    async fn current_user(&self, id: &UserId) -> Result<User, Error> {
        self.users
            .find_by_id(id)
            .await
            .map_err(map_user_error)?
            .ok_or_else(|| Error::unauthorized("session user no longer exists"))
    }

    async fn create_user(&self, registration: Registration, role: Role) -> Result<User, Error> {
        self.insert(registration, role).await
    }

    async fn reset_password(&self, email: &EmailAddress, password: &str) -> Result<User, Error> {
        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(Error::invalid_request(format!(
                "password must be at least {PASSWORD_MIN_LEN} characters"
            )));
        }
        let stored = self
            .users
            .find_credentials(email)
            .await
            .map_err(map_user_error)?
            .ok_or_else(|| Error::not_found(format!("no account for {email}")))?;
        let password_hash =
            hash_password(password).map_err(|err| Error::internal(err.to_string()))?;
        self.users
            .update_password(&stored.user.id, &password_hash)
            .await
            .map_err(map_user_error)?;
        Ok(stored.user)
    }
}
