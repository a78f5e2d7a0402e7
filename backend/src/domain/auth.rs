//! Authentication primitives such as login credentials and password hashes.
//!
//! Keep inbound payload parsing outside the domain by exposing constructors
//! that validate string inputs before a handler talks to a port or service.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use zeroize::Zeroizing;

use super::user::{DisplayName, EmailAddress, Role, UserValidationError};

/// Minimum password length accepted at registration.
pub const PASSWORD_MIN_LEN: usize = 8;

/// Domain error returned when login or registration payloads are invalid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginValidationError {
    /// Email was missing or malformed.
    #[error("{0}")]
    Email(UserValidationError),
    /// Password was blank.
    #[error("password must not be empty")]
    EmptyPassword,
    /// Password is shorter than [`PASSWORD_MIN_LEN`].
    #[error("password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    /// Display name was missing or too long.
    #[error("{0}")]
    DisplayName(UserValidationError),
}

/// Validated login credentials used by authentication services.
///
/// ## Invariants
/// - `email` is canonical.
/// - `password` is non-empty and retains caller-provided whitespace.
///
/// # Examples
/// ```
/// use ait_backend::domain::LoginCredentials;
///
/// let creds = LoginCredentials::try_from_parts("Admin@AIT.co.za", "password").unwrap();
/// assert_eq!(creds.email().as_ref(), "admin@ait.co.za");
/// assert_eq!(creds.password(), "password");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    email: EmailAddress,
    password: Zeroizing<String>,
}

impl LoginCredentials {
    /// Construct credentials from raw email/password inputs.
    pub fn try_from_parts(email: &str, password: &str) -> Result<Self, LoginValidationError> {
        let email = EmailAddress::parse(email).map_err(LoginValidationError::Email)?;
        if password.is_empty() {
            return Err(LoginValidationError::EmptyPassword);
        }
        Ok(Self {
            email,
            password: Zeroizing::new(password.to_owned()),
        })
    }

    /// Canonical email used for user lookups.
    pub fn email(&self) -> &EmailAddress {
        &self.email
    }

    /// Password string provided by the caller.
    pub fn password(&self) -> &str {
        self.password.as_str()
    }
}

/// Validated self-service registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub email: EmailAddress,
    pub password: Zeroizing<String>,
    pub display_name: DisplayName,
    pub requested_role: Role,
}

impl Registration {
    /// Validate raw registration inputs.
    ///
    /// A missing name falls back to the local part of the email.
    pub fn try_from_parts(
        email: &str,
        password: &str,
        display_name: Option<&str>,
        role: Option<&str>,
    ) -> Result<Self, LoginValidationError> {
        let email = EmailAddress::parse(email).map_err(LoginValidationError::Email)?;
        if password.is_empty() {
            return Err(LoginValidationError::EmptyPassword);
        }
        if password.chars().count() < PASSWORD_MIN_LEN {
            return Err(LoginValidationError::PasswordTooShort {
                min: PASSWORD_MIN_LEN,
            });
        }
        let name = match display_name.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => name.to_owned(),
            None => email
                .as_ref()
                .split('@')
                .next()
                .unwrap_or_default()
                .to_owned(),
        };
        let display_name = DisplayName::new(name).map_err(LoginValidationError::DisplayName)?;
        Ok(Self {
            email,
            password: Zeroizing::new(password.to_owned()),
            display_name,
            requested_role: role.map_or(Role::User, Role::normalise),
        })
    }
}

/// Errors raised while hashing or verifying passwords.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PasswordHashError {
    #[error("failed to hash password: {message}")]
    Hash { message: String },
    #[error("stored password hash is malformed: {message}")]
    Malformed { message: String },
}

/// Hash a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String, PasswordHashError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| PasswordHashError::Hash {
            message: err.to_string(),
        })
}

/// Verify a password against a stored PHC string.
///
/// Returns `Ok(false)` for a wrong password and an error only when the stored
/// hash cannot be parsed.
pub fn verify_password(password: &str, stored: &str) -> Result<bool, PasswordHashError> {
    let parsed = PasswordHash::new(stored).map_err(|err| PasswordHashError::Malformed {
        message: err.to_string(),
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "pw", LoginValidationError::Email(UserValidationError::EmptyEmail))]
    #[case("nobody", "pw", LoginValidationError::Email(UserValidationError::InvalidEmail))]
    #[case("user@example.com", "", LoginValidationError::EmptyPassword)]
    fn invalid_credentials(
        #[case] email: &str,
        #[case] password: &str,
        #[case] expected: LoginValidationError,
    ) {
        let err = LoginCredentials::try_from_parts(email, password)
            .expect_err("invalid inputs must fail");
        assert_eq!(err, expected);
    }

    #[rstest]
    fn password_whitespace_is_preserved() {
        let creds = LoginCredentials::try_from_parts("a@b.co", " secret ").expect("valid");
        assert_eq!(creds.password(), " secret ");
    }

    #[rstest]
    fn registration_defaults_name_and_role() {
        let reg = Registration::try_from_parts("thandi@example.com", "longenough", None, None)
            .expect("valid registration");
        assert_eq!(reg.display_name.as_ref(), "thandi");
        assert_eq!(reg.requested_role, Role::User);
    }

    #[rstest]
    fn registration_rejects_short_passwords() {
        let err = Registration::try_from_parts("a@b.co", "short", Some("A"), None)
            .expect_err("short password");
        assert_eq!(
            err,
            LoginValidationError::PasswordTooShort {
                min: PASSWORD_MIN_LEN
            }
        );
    }

    #[rstest]
    fn registration_normalises_requested_role() {
        let reg =
            Registration::try_from_parts("a@b.co", "longenough", Some("Sipho"), Some("student"))
                .expect("valid");
        assert_eq!(reg.requested_role, Role::Learner);
    }

    #[rstest]
    fn hashed_password_verifies() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(hash.starts_with("$argon2"));
        assert_eq!(verify_password("correct horse", &hash), Ok(true));
        assert_eq!(verify_password("wrong horse", &hash), Ok(false));
    }

    #[rstest]
    fn malformed_hash_is_reported() {
        let result = verify_password("pw", "not-a-phc-string");
        assert!(matches!(result, Err(PasswordHashError::Malformed { .. })));
    }
}
