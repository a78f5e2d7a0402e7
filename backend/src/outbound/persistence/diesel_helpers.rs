//! Shared error classification for Diesel repository implementations.
//!
//! Each repository maps [`DbFailure`] onto its own port error so that
//! constraint names stay an adapter concern.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;

/// Coarse category of a failed database call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DbFailure {
    /// The connection dropped or could not be used.
    Connection(String),
    /// A unique constraint rejected the write.
    UniqueViolation { constraint: Option<String> },
    /// A foreign key pointed at a missing row.
    ForeignKeyViolation { constraint: Option<String> },
    /// Serialisation failure or deadlock; the transaction may be retried.
    Contention(String),
    /// Anything else.
    Other(String),
}

/// Extract a readable message from a pool error.
pub(crate) fn pool_error_message(error: PoolError) -> String {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => message,
    }
}

fn is_lock_message(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("deadlock detected") || lower.contains("database is locked")
}

/// Classify a Diesel error and emit debug context for `operation`.
pub(crate) fn classify_diesel_error(error: DieselError, operation: &str) -> DbFailure {
    match &error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), %operation, "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(&error),
            %operation,
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::DatabaseError(kind, info) => {
            let constraint = info.constraint_name().map(str::to_owned);
            match kind {
                DatabaseErrorKind::UniqueViolation => DbFailure::UniqueViolation { constraint },
                DatabaseErrorKind::ForeignKeyViolation => {
                    DbFailure::ForeignKeyViolation { constraint }
                }
                DatabaseErrorKind::SerializationFailure => {
                    DbFailure::Contention(info.message().to_owned())
                }
                DatabaseErrorKind::ClosedConnection | DatabaseErrorKind::UnableToSendCommand => {
                    DbFailure::Connection("database connection error".to_owned())
                }
                _ if is_lock_message(info.message()) => {
                    DbFailure::Contention(info.message().to_owned())
                }
                _ => DbFailure::Other(format!("{operation}: database error")),
            }
        }
        DieselError::NotFound => DbFailure::Other(format!("{operation}: record not found")),
        DieselError::QueryBuilderError(_) => {
            DbFailure::Other(format!("{operation}: database query error"))
        }
        _ => DbFailure::Other(format!("{operation}: database error")),
    }
}

/// Collect row conversion results, mapping the first error through `map_err`.
pub(crate) fn collect_rows<T, E>(
    results: impl Iterator<Item = Result<T, String>>,
    map_err: impl FnOnce(String) -> E,
) -> Result<Vec<T>, E> {
    results.collect::<Result<Vec<_>, _>>().map_err(map_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::DatabaseErrorInformation;
    use rstest::rstest;

    #[derive(Debug)]
    struct Info {
        message: &'static str,
        constraint: Option<&'static str>,
    }

    impl DatabaseErrorInformation for Info {
        fn message(&self) -> &str {
            self.message
        }
        fn details(&self) -> Option<&str> {
            None
        }
        fn hint(&self) -> Option<&str> {
            None
        }
        fn table_name(&self) -> Option<&str> {
            None
        }
        fn column_name(&self) -> Option<&str> {
            None
        }
        fn constraint_name(&self) -> Option<&str> {
            self.constraint
        }
        fn statement_position(&self) -> Option<i32> {
            None
        }
    }

    fn db_error(kind: DatabaseErrorKind, message: &'static str, constraint: Option<&'static str>) -> DieselError {
        DieselError::DatabaseError(kind, Box::new(Info { message, constraint }))
    }

    #[rstest]
    fn unique_violations_keep_the_constraint() {
        let failure = classify_diesel_error(
            db_error(
                DatabaseErrorKind::UniqueViolation,
                "duplicate key value",
                Some("fee_account_learner_year_key"),
            ),
            "open account",
        );
        assert_eq!(
            failure,
            DbFailure::UniqueViolation {
                constraint: Some("fee_account_learner_year_key".to_owned())
            }
        );
    }

    #[rstest]
    #[case(db_error(DatabaseErrorKind::SerializationFailure, "could not serialize access", None))]
    #[case(db_error(DatabaseErrorKind::Unknown, "deadlock detected", None))]
    #[case(db_error(DatabaseErrorKind::Unknown, "Database is locked", None))]
    fn lock_failures_are_contention(#[case] error: DieselError) {
        assert!(matches!(
            classify_diesel_error(error, "record answer"),
            DbFailure::Contention(_)
        ));
    }

    #[rstest]
    fn closed_connections_are_connection_failures() {
        let failure = classify_diesel_error(
            db_error(DatabaseErrorKind::ClosedConnection, "server closed", None),
            "list",
        );
        assert!(matches!(failure, DbFailure::Connection(_)));
    }

    #[rstest]
    fn other_errors_name_the_operation() {
        let failure = classify_diesel_error(DieselError::NotFound, "find run");
        assert_eq!(failure, DbFailure::Other("find run: record not found".to_owned()));
    }
}
