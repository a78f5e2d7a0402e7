//! User data model.
//!
//! Emails are canonicalised on the way in so that one person maps to one
//! account no matter how the address was typed. Roles accept the legacy
//! spellings found in older sign-up forms.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validation errors returned by user value constructors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserValidationError {
    #[error("user id must not be empty")]
    EmptyId,
    #[error("user id must be a valid UUID")]
    InvalidId,
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("email must contain a local part and a domain")]
    InvalidEmail,
    #[error("display name must not be empty")]
    EmptyDisplayName,
    #[error("display name must be at most {max} characters")]
    DisplayNameTooLong { max: usize },
}

/// Stable user identifier stored as a UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(Uuid);

impl UserId {
    /// Validate and construct a [`UserId`] from string input.
    pub fn new(id: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let raw = id.as_ref();
        if raw.is_empty() {
            return Err(UserValidationError::EmptyId);
        }
        if raw.trim() != raw {
            return Err(UserValidationError::InvalidId);
        }
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|_| UserValidationError::InvalidId)
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a new random [`UserId`].
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<UserId> for String {
    fn from(value: UserId) -> Self {
        value.0.to_string()
    }
}

impl TryFrom<String> for UserId {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Canonical email address.
///
/// ## Invariants
/// - Lowercase, no whitespace, commas replaced by dots.
/// - Exactly one `@` with non-empty local and domain parts.
///
/// # Examples
/// ```
/// use ait_backend::domain::EmailAddress;
///
/// let email = EmailAddress::parse(" Jane.Doe@Example,com ").unwrap();
/// assert_eq!(email.as_ref(), "jane.doe@example.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Canonicalise and validate a raw email string.
    pub fn parse(raw: &str) -> Result<Self, UserValidationError> {
        let canonical: String = raw
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| if ch == ',' { '.' } else { ch })
            .collect::<String>()
            .to_lowercase();
        if canonical.is_empty() {
            return Err(UserValidationError::EmptyEmail);
        }
        let mut parts = canonical.split('@');
        let local = parts.next().unwrap_or_default();
        let domain = parts.next().unwrap_or_default();
        if local.is_empty() || domain.is_empty() || parts.next().is_some() {
            return Err(UserValidationError::InvalidEmail);
        }
        Ok(Self(canonical))
    }
}

impl AsRef<str> for EmailAddress {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

/// Maximum length of a display name.
pub const DISPLAY_NAME_MAX: usize = 120;

/// Human readable name for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validate and construct a [`DisplayName`]; surrounding whitespace is trimmed.
    pub fn new(display_name: impl AsRef<str>) -> Result<Self, UserValidationError> {
        let trimmed = display_name.as_ref().trim();
        if trimmed.is_empty() {
            return Err(UserValidationError::EmptyDisplayName);
        }
        if trimmed.chars().count() > DISPLAY_NAME_MAX {
            return Err(UserValidationError::DisplayNameTooLong {
                max: DISPLAY_NAME_MAX,
            });
        }
        Ok(Self(trimmed.to_owned()))
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<DisplayName> for String {
    fn from(value: DisplayName) -> Self {
        value.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = UserValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// Access role attached to a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Learner,
    Tutor,
    Manager,
    User,
}

impl Role {
    /// Map free-form role input onto a known role.
    ///
    /// Prefixed spellings such as `auth_learner` keep their suffix, and
    /// legacy aliases are folded in. Anything unrecognised becomes
    /// [`Role::User`].
    pub fn normalise(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        let suffix = lowered.rsplit('_').next().unwrap_or_default();
        match suffix {
            "admin" => Self::Admin,
            "learner" | "student" => Self::Learner,
            "tutor" => Self::Tutor,
            "manager" | "mgr" | "pm" => Self::Manager,
            _ => Self::User,
        }
    }

    /// Stable lowercase name stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Learner => "learner",
            Self::Tutor => "tutor",
            Self::Manager => "manager",
            Self::User => "user",
        }
    }

    /// Whether the role may use the admin back-office.
    pub fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::normalise(s))
    }
}

/// Application user.
///
/// ## Invariants
/// - `email` is canonical (see [`EmailAddress`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub display_name: DisplayName,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("Jane@Example.com", "jane@example.com")]
    #[case("  jane @ example.com ", "jane@example.com")]
    #[case("jane@example,co,za", "jane@example.co.za")]
    fn email_is_canonicalised(#[case] raw: &str, #[case] expected: &str) {
        let email = EmailAddress::parse(raw).expect("valid email");
        assert_eq!(email.as_ref(), expected);
    }

    #[rstest]
    #[case("", UserValidationError::EmptyEmail)]
    #[case("   ", UserValidationError::EmptyEmail)]
    #[case("jane", UserValidationError::InvalidEmail)]
    #[case("@example.com", UserValidationError::InvalidEmail)]
    #[case("jane@", UserValidationError::InvalidEmail)]
    #[case("a@b@c", UserValidationError::InvalidEmail)]
    fn invalid_emails_are_rejected(#[case] raw: &str, #[case] expected: UserValidationError) {
        assert_eq!(EmailAddress::parse(raw), Err(expected));
    }

    #[rstest]
    #[case("admin", Role::Admin)]
    #[case("auth_learner", Role::Learner)]
    #[case("Student", Role::Learner)]
    #[case("reading_tutor", Role::Tutor)]
    #[case("pm", Role::Manager)]
    #[case("mgr", Role::Manager)]
    #[case("", Role::User)]
    #[case("wizard", Role::User)]
    fn roles_are_normalised(#[case] raw: &str, #[case] expected: Role) {
        assert_eq!(Role::normalise(raw), expected);
    }

    #[rstest]
    fn user_id_rejects_padded_input() {
        assert_eq!(
            UserId::new(" 3fa85f64-5717-4562-b3fc-2c963f66afa6"),
            Err(UserValidationError::InvalidId)
        );
    }

    #[rstest]
    fn user_id_round_trips_through_serde() {
        let id = UserId::random();
        let json = serde_json::to_string(&id).expect("serialise");
        let back: UserId = serde_json::from_str(&json).expect("deserialise");
        assert_eq!(back, id);
    }

    #[rstest]
    fn display_name_is_trimmed_and_bounded() {
        assert_eq!(
            DisplayName::new("  Thandi  ").expect("valid").as_ref(),
            "Thandi"
        );
        let long = "x".repeat(DISPLAY_NAME_MAX + 1);
        assert_eq!(
            DisplayName::new(long),
            Err(UserValidationError::DisplayNameTooLong {
                max: DISPLAY_NAME_MAX
            })
        );
    }
}
