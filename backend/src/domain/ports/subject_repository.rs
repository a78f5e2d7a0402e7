//! Port for the subject catalogue.
use async_trait::async_trait;

use crate::domain::{Subject, SubjectId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by subject repository adapters.
    pub enum SubjectRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } => "subject repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } => "subject repository query failed: {message}",
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Active subjects ordered by `sort_order`, then name.
    async fn list_active(&self) -> Result<Vec<Subject>, SubjectRepositoryError>;

    /// Look a subject up by slug, falling back to its name. Both comparisons
    /// ignore case.
    async fn find_by_key(&self, key: &str) -> Result<Option<Subject>, SubjectRepositoryError>;

    /// Look a subject up by identifier.
    async fn find_by_id(&self, id: SubjectId) -> Result<Option<Subject>, SubjectRepositoryError>;
}

/// In-memory catalogue with the platform's two launch subjects.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureSubjectRepository;

impl FixtureSubjectRepository {
    fn subjects() -> Vec<Subject> {
        vec![
            Subject {
                id: 1,
                slug: "loss".to_owned(),
                name: "Loss and Adaptation".to_owned(),
                active: true,
                sort_order: 1,
            },
            Subject {
                id: 2,
                slug: "reading".to_owned(),
                name: "Reading".to_owned(),
                active: true,
                sort_order: 2,
            },
        ]
    }
}

#[async_trait]
impl SubjectRepository for FixtureSubjectRepository {
    async fn list_active(&self) -> Result<Vec<Subject>, SubjectRepositoryError> {
        Ok(Self::subjects())
    }

    async fn find_by_key(&self, key: &str) -> Result<Option<Subject>, SubjectRepositoryError> {
        let subjects = Self::subjects();
        let by_slug = subjects
            .iter()
            .find(|subject| subject.slug.eq_ignore_ascii_case(key.trim()))
            .cloned();
        Ok(by_slug.or_else(|| subjects.into_iter().find(|subject| subject.matches_key(key))))
    }

    async fn find_by_id(&self, id: SubjectId) -> Result<Option<Subject>, SubjectRepositoryError> {
        Ok(Self::subjects().into_iter().find(|subject| subject.id == id))
    }
}
