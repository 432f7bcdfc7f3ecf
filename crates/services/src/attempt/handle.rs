use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use quiz_core::model::{
    Answer, AnswerPatch, AnswerSnapshot, AttemptId, AttemptSession, AttemptStatus,
    AttemptSummary, EngineSettings, OptionId, Question, QuestionId, QuizId, WarningLatches,
};
use storage::repository::AttemptStore;
use tokio::sync::broadcast;

use super::autosave::Autosave;
use super::coordinator::{SubmissionCoordinator, SubmitOutcome};
use super::countdown::Countdown;
use super::events::{AttemptEvent, EventBus};
use super::{SharedSession, lock};
use crate::error::AttemptEngineError;

/// A running attempt.
///
/// Owns the countdown and autosave tasks. Dropping the handle without
/// submitting stops both and expires the attempt, like [`Self::abandon`].
pub struct AttemptHandle {
    attempt_id: AttemptId,
    quiz_id: QuizId,
    title: String,
    started_at: DateTime<Utc>,
    session: SharedSession,
    coordinator: Arc<SubmissionCoordinator>,
}

impl AttemptHandle {
    /// Wraps the session and spawns its tasks on the current runtime.
    pub(crate) fn launch(
        session: AttemptSession,
        title: String,
        started_at: DateTime<Utc>,
        store: Arc<dyn AttemptStore>,
        settings: &EngineSettings,
    ) -> Self {
        let attempt_id = session.attempt_id();
        let quiz_id = session.quiz_id();
        let timed = session.time_remaining().is_some();
        let session: SharedSession = Arc::new(Mutex::new(session));
        let events = EventBus::new();

        let autosave = Autosave::spawn(
            attempt_id,
            Arc::clone(&session),
            Arc::clone(&store),
            events.clone(),
            settings.autosave_period(),
        );
        let countdown = Countdown::new();
        let coordinator = Arc::new(SubmissionCoordinator::new(
            attempt_id,
            Arc::clone(&session),
            store,
            events,
            countdown.clone(),
            autosave,
        ));
        if timed {
            countdown.spawn(
                Arc::clone(&coordinator),
                settings.tick_interval(),
                WarningLatches::new(settings.warning_thresholds_secs()),
            );
        }

        Self {
            attempt_id,
            quiz_id,
            title,
            started_at,
            session,
            coordinator,
        }
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn quiz_id(&self) -> QuizId {
        self.quiz_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    // ─── Editing ───────────────────────────────────────────────────────────

    /// Merges text and/or a selection into one answer.
    ///
    /// # Errors
    ///
    /// Returns `ExpiredSession` once the attempt is sealed or finished,
    /// `InvalidQuestion` for unknown ids, and `Attempt` for option violations.
    pub fn update_answer(
        &self,
        question_id: QuestionId,
        patch: AnswerPatch,
    ) -> Result<Answer, AttemptEngineError> {
        let mut session = lock(&self.session);
        Ok(session.update_answer(question_id, patch)?.clone())
    }

    /// Toggles one option; single-select questions always replace.
    ///
    /// # Errors
    ///
    /// See [`Self::update_answer`].
    pub fn toggle_option(
        &self,
        question_id: QuestionId,
        option_id: OptionId,
        is_multiple: bool,
    ) -> Result<Answer, AttemptEngineError> {
        let mut session = lock(&self.session);
        Ok(session
            .toggle_option(question_id, option_id, is_multiple)?
            .clone())
    }

    /// Returns whether the question is now flagged.
    ///
    /// # Errors
    ///
    /// Returns `ExpiredSession` or `InvalidQuestion`.
    pub fn toggle_flag(&self, question_id: QuestionId) -> Result<bool, AttemptEngineError> {
        Ok(lock(&self.session).toggle_flag(question_id)?)
    }

    // ─── Finalization ──────────────────────────────────────────────────────

    /// Submits the attempt on the user's behalf.
    ///
    /// Dropping the returned future does not cancel a submission already
    /// under way; watch [`AttemptEvent::StatusChanged`] or [`Self::status`].
    ///
    /// # Errors
    ///
    /// Returns `Network` when the store rejects the submission (the attempt is
    /// then awaiting [`Self::retry_submission`]) and `ExpiredSession` after
    /// abandonment.
    pub async fn submit(&self) -> Result<SubmitOutcome, AttemptEngineError> {
        self.coordinator.submit().await
    }

    /// Resends the frozen snapshot of a failed submission.
    ///
    /// # Errors
    ///
    /// Returns `NotPendingRetry` unless a submission failed,
    /// `DuplicateSubmission` while another retry is in flight and `Network`
    /// if the store fails again.
    pub async fn retry_submission(&self) -> Result<SubmitOutcome, AttemptEngineError> {
        self.coordinator.retry_submission().await
    }

    /// Stops the timers and expires an unsubmitted attempt. Returns the
    /// resulting status; finished attempts are left untouched.
    pub async fn abandon(&self) -> AttemptStatus {
        self.coordinator.abandon().await
    }

    // ─── Reads ─────────────────────────────────────────────────────────────

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        lock(&self.session).status()
    }

    #[must_use]
    pub fn time_remaining(&self) -> Option<u32> {
        lock(&self.session).time_remaining()
    }

    #[must_use]
    pub fn summary(&self) -> AttemptSummary {
        lock(&self.session).summary()
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<AnswerSnapshot> {
        lock(&self.session).snapshot()
    }

    #[must_use]
    pub fn questions(&self) -> Vec<Question> {
        lock(&self.session).questions().to_vec()
    }

    #[must_use]
    pub fn answer(&self, question_id: QuestionId) -> Option<Answer> {
        lock(&self.session).answer(question_id).cloned()
    }

    #[must_use]
    pub fn is_flagged(&self, question_id: QuestionId) -> bool {
        lock(&self.session).is_flagged(question_id)
    }

    #[must_use]
    pub fn flagged(&self) -> Vec<QuestionId> {
        lock(&self.session).flagged()
    }

    /// Reference returned by the store once the attempt is submitted.
    #[must_use]
    pub fn result_ref(&self) -> Option<String> {
        self.coordinator.result_ref()
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.coordinator.events().subscribe()
    }
}

impl std::fmt::Debug for AttemptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttemptHandle")
            .field("attempt_id", &self.attempt_id)
            .field("quiz_id", &self.quiz_id)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Drop for AttemptHandle {
    fn drop(&mut self) {
        self.coordinator.teardown_now();
    }
}
