//! Shared error types for the services crate.

use thiserror::Error;

use quiz_core::model::{AttemptError, AttemptStatus, QuestionId, QuizId};
use storage::repository::StorageError;

/// Errors emitted by the attempt engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AttemptEngineError {
    #[error("question {0} is not part of this attempt")]
    InvalidQuestion(QuestionId),

    #[error("attempt can no longer be edited (status: {0})")]
    ExpiredSession(AttemptStatus),

    #[error("submission failed: {0}")]
    Network(#[source] StorageError),

    #[error("a submission is already in flight")]
    DuplicateSubmission,

    #[error("store opened quiz {actual}, expected {expected}")]
    DefinitionMismatch { expected: QuizId, actual: QuizId },

    #[error("attempt is not awaiting a retry (status: {0})")]
    NotPendingRetry(AttemptStatus),

    #[error(transparent)]
    Attempt(AttemptError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("finalization task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<AttemptError> for AttemptEngineError {
    fn from(err: AttemptError) -> Self {
        match err {
            AttemptError::InvalidQuestion(id) => Self::InvalidQuestion(id),
            AttemptError::ExpiredSession(status) => Self::ExpiredSession(status),
            other => Self::Attempt(other),
        }
    }
}
