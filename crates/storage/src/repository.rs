use async_trait::async_trait;
use quiz_core::model::{
    AnswerSnapshot, AssessmentDefinition, AttemptId, AttemptStatus, Question, QuizId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("network error: {0}")]
    Network(String),
}

/// Everything the engine needs to open an attempt.
///
/// `previous_answers` holds the last autosave of a resumed attempt and may
/// reference questions that no longer exist. `time_remaining_secs` is `None`
/// for untimed quizzes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptStart {
    pub attempt_id: AttemptId,
    pub quiz_id: QuizId,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub previous_answers: Vec<AnswerSnapshot>,
    #[serde(default)]
    pub time_remaining_secs: Option<u32>,
}

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub attempt_id: AttemptId,
    pub result_ref: String,
}

/// Persistence and submission contract for attempts.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    /// Open (or resume) an attempt for a quiz.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz does not exist, or other storage errors.
    async fn start(&self, quiz_id: QuizId) -> Result<AttemptStart, StorageError>;

    /// Persist in-progress answers. Later calls overwrite earlier ones.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` once the attempt is closed, or other storage errors.
    async fn save_progress(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
    ) -> Result<(), StorageError>;

    /// Submit final answers for grading.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the attempt was already submitted,
    /// `StorageError::NotFound` if unknown, or other storage errors.
    async fn submit(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
        is_auto_submit: bool,
    ) -> Result<SubmissionReceipt, StorageError>;
}

/// Read-only lookup of quiz definitions.
#[async_trait]
pub trait QuizDefinitionRepository: Send + Sync {
    /// Fetch a quiz definition by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_by_id(&self, quiz_id: QuizId) -> Result<AssessmentDefinition, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone)]
struct AttemptRow {
    quiz_id: QuizId,
    status: AttemptStatus,
    answers: Vec<AnswerSnapshot>,
    time_remaining_secs: Option<u32>,
    receipt: Option<SubmissionReceipt>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    quizzes: HashMap<QuizId, AssessmentDefinition>,
    attempts: HashMap<AttemptId, AttemptRow>,
    next_attempt_id: u64,
}

/// Simple in-memory backend implementation for testing and prototyping.
///
/// `start` resumes the newest open attempt of a quiz, returning its saved
/// answers and the time it was opened with.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }

    /// Persist or replace a quiz definition.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Connection` if the state lock is poisoned.
    pub fn upsert_quiz(&self, definition: AssessmentDefinition) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.quizzes.insert(definition.quiz_id(), definition);
        Ok(())
    }

    /// Opens an attempt with pre-existing answers, as a previous session would have left it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the quiz is unknown.
    pub fn seed_attempt(
        &self,
        quiz_id: QuizId,
        answers: Vec<AnswerSnapshot>,
        time_remaining_secs: Option<u32>,
    ) -> Result<AttemptId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.quizzes.contains_key(&quiz_id) {
            return Err(StorageError::NotFound);
        }
        Ok(insert_attempt(&mut guard, quiz_id, answers, time_remaining_secs))
    }

    /// Last autosaved answers of an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt is unknown.
    pub fn saved_answers(&self, attempt_id: AttemptId) -> Result<Vec<AnswerSnapshot>, StorageError> {
        let guard = self.lock()?;
        guard
            .attempts
            .get(&attempt_id)
            .map(|row| row.answers.clone())
            .ok_or(StorageError::NotFound)
    }

    /// Server-side status of an attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt is unknown.
    pub fn attempt_status(&self, attempt_id: AttemptId) -> Result<AttemptStatus, StorageError> {
        let guard = self.lock()?;
        guard
            .attempts
            .get(&attempt_id)
            .map(|row| row.status)
            .ok_or(StorageError::NotFound)
    }

    /// Receipt issued when the attempt was submitted, if it was.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt is unknown.
    pub fn receipt(&self, attempt_id: AttemptId) -> Result<Option<SubmissionReceipt>, StorageError> {
        let guard = self.lock()?;
        guard
            .attempts
            .get(&attempt_id)
            .map(|row| row.receipt.clone())
            .ok_or(StorageError::NotFound)
    }
}

fn insert_attempt(
    state: &mut InMemoryState,
    quiz_id: QuizId,
    answers: Vec<AnswerSnapshot>,
    time_remaining_secs: Option<u32>,
) -> AttemptId {
    state.next_attempt_id += 1;
    let attempt_id = AttemptId::new(state.next_attempt_id);
    state.attempts.insert(
        attempt_id,
        AttemptRow {
            quiz_id,
            status: AttemptStatus::InProgress,
            answers,
            time_remaining_secs,
            receipt: None,
        },
    );
    attempt_id
}

#[async_trait]
impl AttemptStore for InMemoryRepository {
    async fn start(&self, quiz_id: QuizId) -> Result<AttemptStart, StorageError> {
        let mut guard = self.lock()?;
        let definition = guard
            .quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or(StorageError::NotFound)?;

        let open = guard
            .attempts
            .iter()
            .filter(|(_, row)| row.quiz_id == quiz_id && row.status == AttemptStatus::InProgress)
            .max_by_key(|(id, _)| **id)
            .map(|(id, row)| (*id, row.answers.clone(), row.time_remaining_secs));

        let (attempt_id, previous_answers, time_remaining_secs) = match open {
            Some(found) => found,
            None => {
                let limit = definition.time_limit_secs();
                let id = insert_attempt(&mut guard, quiz_id, Vec::new(), limit);
                (id, Vec::new(), limit)
            }
        };

        Ok(AttemptStart {
            attempt_id,
            quiz_id,
            questions: definition.questions().to_vec(),
            previous_answers,
            time_remaining_secs,
        })
    }

    async fn save_progress(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let row = guard
            .attempts
            .get_mut(&attempt_id)
            .ok_or(StorageError::NotFound)?;
        if row.status != AttemptStatus::InProgress {
            return Err(StorageError::Conflict);
        }
        row.answers = answers.to_vec();
        Ok(())
    }

    async fn submit(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
        is_auto_submit: bool,
    ) -> Result<SubmissionReceipt, StorageError> {
        let mut guard = self.lock()?;
        let row = guard
            .attempts
            .get_mut(&attempt_id)
            .ok_or(StorageError::NotFound)?;
        if row.status != AttemptStatus::InProgress {
            return Err(StorageError::Conflict);
        }

        let receipt = SubmissionReceipt {
            attempt_id,
            result_ref: format!("result-{attempt_id}"),
        };
        row.status = if is_auto_submit {
            AttemptStatus::AutoSubmitted
        } else {
            AttemptStatus::Submitted
        };
        row.answers = answers.to_vec();
        row.receipt = Some(receipt.clone());
        Ok(receipt)
    }
}

#[async_trait]
impl QuizDefinitionRepository for InMemoryRepository {
    async fn get_by_id(&self, quiz_id: QuizId) -> Result<AssessmentDefinition, StorageError> {
        let guard = self.lock()?;
        guard
            .quizzes
            .get(&quiz_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}

/// Aggregates the collaborator contracts behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub attempts: Arc<dyn AttemptStore>,
    pub quizzes: Arc<dyn QuizDefinitionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_in_memory(&InMemoryRepository::new())
    }

    #[must_use]
    pub fn from_in_memory(repo: &InMemoryRepository) -> Self {
        let attempts: Arc<dyn AttemptStore> = Arc::new(repo.clone());
        let quizzes: Arc<dyn QuizDefinitionRepository> = Arc::new(repo.clone());
        Self { attempts, quizzes }
    }
}
