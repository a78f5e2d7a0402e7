//! Driving port for the subject catalogue.

use async_trait::async_trait;

use crate::domain::{Error, Subject};

/// Read access to the subjects learners can enrol in.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Subjects: Send + Sync {
    /// Active subjects ordered for display.
    async fn list_active(&self) -> Result<Vec<Subject>, Error>;

    /// Resolve a slug or name; unknown keys yield `None`.
    async fn find(&self, key: &str) -> Result<Option<Subject>, Error>;
}
