use std::sync::Arc;

use quiz_core::model::{AttemptSession, EngineSettings, QuizId};
use storage::repository::{AttemptStore, QuizDefinitionRepository, Storage};
use tracing::info;

use super::handle::AttemptHandle;
use crate::Clock;
use crate::error::AttemptEngineError;

/// Opens attempts and wires their timers to the store.
#[derive(Clone)]
pub struct AttemptLoopService {
    clock: Clock,
    attempts: Arc<dyn AttemptStore>,
    quizzes: Arc<dyn QuizDefinitionRepository>,
    settings: EngineSettings,
}

impl AttemptLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        attempts: Arc<dyn AttemptStore>,
        quizzes: Arc<dyn QuizDefinitionRepository>,
    ) -> Self {
        Self {
            clock,
            attempts,
            quizzes,
            settings: EngineSettings::standard(),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.attempts),
            Arc::clone(&storage.quizzes),
        )
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Open or resume an attempt and start its countdown and autosave.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `Storage` when the store or definition lookup fails and
    /// `DefinitionMismatch` when they disagree on the quiz.
    pub async fn start_attempt(&self, quiz_id: QuizId) -> Result<AttemptHandle, AttemptEngineError> {
        let start = self.attempts.start(quiz_id).await?;
        if start.quiz_id != quiz_id {
            return Err(AttemptEngineError::DefinitionMismatch {
                expected: quiz_id,
                actual: start.quiz_id,
            });
        }
        let definition = self.quizzes.get_by_id(quiz_id).await?;
        if definition.quiz_id() != start.quiz_id {
            return Err(AttemptEngineError::DefinitionMismatch {
                expected: start.quiz_id,
                actual: definition.quiz_id(),
            });
        }

        let session = AttemptSession::initialize(
            start.attempt_id,
            start.quiz_id,
            start.questions,
            &start.previous_answers,
            start.time_remaining_secs,
        );
        let started_at = self.clock.now();
        info!(
            attempt_id = %start.attempt_id,
            %quiz_id,
            remaining = ?start.time_remaining_secs,
            resumed_answers = start.previous_answers.len(),
            "attempt started"
        );

        Ok(AttemptHandle::launch(
            session,
            definition.title().to_owned(),
            started_at,
            Arc::clone(&self.attempts),
            &self.settings,
        ))
    }
}
