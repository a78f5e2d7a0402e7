//! PostgreSQL-backed `UserRepository` implementation.
//!
//! Emails are not unique at the database level. Lookups by email prefer
//! active accounts, then the oldest row.

use async_trait::async_trait;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use uuid::Uuid;

use crate::domain::ports::{NewUser, StoredCredentials, UserPersistenceError, UserRepository};
use crate::domain::{DisplayName, EmailAddress, Role, User, UserId};

use super::diesel_helpers::{DbFailure, classify_diesel_error, pool_error_message};
use super::models::{NewUserRow, UserRow};
use super::pool::{DbPool, PoolError};
use super::schema::users;

/// Diesel-backed implementation of the [`UserRepository`] port.
#[derive(Clone)]
pub struct DieselUserRepository {
    pool: DbPool,
}

impl DieselUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn map_pool_error(error: PoolError) -> UserPersistenceError {
    UserPersistenceError::connection(pool_error_message(error))
}

fn map_diesel_error(error: diesel::result::Error, email: Option<&EmailAddress>) -> UserPersistenceError {
    match classify_diesel_error(error, "users") {
        DbFailure::Connection(message) => UserPersistenceError::connection(message),
        DbFailure::UniqueViolation { .. } => UserPersistenceError::duplicate_email(
            email.map(ToString::to_string).unwrap_or_default(),
        ),
        DbFailure::ForeignKeyViolation { .. } => UserPersistenceError::query("invalid reference"),
        DbFailure::Contention(message) | DbFailure::Other(message) => {
            UserPersistenceError::query(message)
        }
    }
}

fn row_to_user(row: UserRow) -> Result<StoredCredentials, String> {
    let email = EmailAddress::parse(&row.email)
        .map_err(|err| format!("user {} has an invalid email: {err}", row.id))?;
    let display_name = DisplayName::new(&row.display_name)
        .map_err(|err| format!("user {} has an invalid display name: {err}", row.id))?;
    Ok(StoredCredentials {
        user: User {
            id: UserId::from_uuid(row.id),
            email,
            display_name,
            role: Role::normalise(&row.role),
            active: row.active,
            created_at: row.created_at,
        },
        password_hash: row.password_hash,
    })
}

#[async_trait]
impl UserRepository for DieselUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::id.eq(id.as_uuid()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, None))?;

        row.map(row_to_user)
            .transpose()
            .map(|stored| stored.map(|credentials| credentials.user))
            .map_err(UserPersistenceError::query)
    }

    async fn find_credentials(
        &self,
        email: &EmailAddress,
    ) -> Result<Option<StoredCredentials>, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let row: Option<UserRow> = users::table
            .filter(users::email.eq(email.as_ref()))
            .order((users::active.desc(), users::created_at.asc()))
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| map_diesel_error(err, Some(email)))?;

        row.map(row_to_user)
            .transpose()
            .map_err(UserPersistenceError::query)
    }

    async fn create(&self, user: &NewUser) -> Result<User, UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let new_row = NewUserRow {
            id: Uuid::new_v4(),
            email: user.email.as_ref(),
            display_name: user.display_name.as_ref(),
            role: user.role.as_str(),
            password_hash: &user.password_hash,
        };

        let row: UserRow = diesel::insert_into(users::table)
            .values(&new_row)
            .returning(UserRow::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, Some(&user.email)))?;

        row_to_user(row)
            .map(|stored| stored.user)
            .map_err(UserPersistenceError::query)
    }

    async fn update_password(
        &self,
        id: &UserId,
        password_hash: &str,
    ) -> Result<(), UserPersistenceError> {
        let mut conn = self.pool.get().await.map_err(map_pool_error)?;
        let updated = diesel::update(users::table.filter(users::id.eq(id.as_uuid())))
            .set((
                users::password_hash.eq(password_hash),
                users::updated_at.eq(Utc::now()),
            ))
            .execute(&mut conn)
            .await
            .map_err(|err| map_diesel_error(err, None))?;

        if updated == 0 {
            return Err(UserPersistenceError::query(format!("user {id} not found")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(email: &str, role: &str) -> UserRow {
        UserRow {
            id: Uuid::nil(),
            email: email.to_owned(),
            display_name: "Ada".to_owned(),
            role: role.to_owned(),
            password_hash: "$argon2id$stub".to_owned(),
            active: true,
            created_at: Utc::now(),
        }
    }

    #[rstest]
    #[case("teacher", Role::User)]
    #[case("Admin", Role::Admin)]
    #[case("learner", Role::Learner)]
    fn rows_normalise_roles(#[case] raw: &str, #[case] expected: Role) {
        let stored = row_to_user(row("ada@example.com", raw)).expect("valid row");
        assert_eq!(stored.user.role, expected);
        assert_eq!(stored.password_hash, "$argon2id$stub");
    }

    #[rstest]
    fn corrupt_emails_are_reported() {
        let err = row_to_user(row("not-an-email", "user")).expect_err("invalid");
        assert!(err.contains("invalid email"));
    }
}
