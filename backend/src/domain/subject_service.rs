//! Subject catalogue service.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::ports::{SubjectRepository, SubjectRepositoryError, Subjects};
use crate::domain::subject::normalise_subject_key;
use crate::domain::{Error, Subject};

pub(crate) fn map_subject_error(error: SubjectRepositoryError) -> Error {
    match error {
        SubjectRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("subject repository unavailable: {message}"))
        }
        SubjectRepositoryError::Query { message } => {
            Error::internal(format!("subject repository error: {message}"))
        }
    }
}

/// Look up a subject by key, treating blank keys as unknown.
pub(crate) async fn resolve_subject<S>(subjects: &S, key: &str) -> Result<Option<Subject>, Error>
where
    S: SubjectRepository + ?Sized,
{
    let Some(key) = normalise_subject_key(key) else {
        return Ok(None);
    };
    subjects
        .find_by_key(&key)
        .await
        .map_err(map_subject_error)
        .map(|found| found.filter(|subject| subject.active))
}

/// Look up a subject by key, failing with `not_found`.
pub(crate) async fn require_subject<S>(subjects: &S, key: &str) -> Result<Subject, Error>
where
    S: SubjectRepository + ?Sized,
{
    resolve_subject(subjects, key)
        .await?
        .ok_or_else(|| Error::not_found(format!("unknown subject: {}", key.trim())))
}

/// Subject service implementing the [`Subjects`] port.
#[derive(Clone)]
pub struct SubjectService<S> {
    subjects: Arc<S>,
}

impl<S> SubjectService<S> {
    pub fn new(subjects: Arc<S>) -> Self {
        Self { subjects }
    }
}

#[async_trait]
impl<S> Subjects for SubjectService<S>
where
    S: SubjectRepository,
{
    async fn list_active(&self) -> Result<Vec<Subject>, Error> {
        let mut subjects = self
            .subjects
            .list_active()
            .await
            .map_err(map_subject_error)?;
        subjects.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
        });
        Ok(subjects)
    }

    async fn find(&self, key: &str) -> Result<Option<Subject>, Error> {
        resolve_subject(self.subjects.as_ref(), key).await
    }
}
