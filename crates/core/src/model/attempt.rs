use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use thiserror::Error;

use crate::model::answer::{Answer, AnswerPatch, AnswerSnapshot};
use crate::model::ids::{AttemptId, OptionId, QuestionId, QuizId};
use crate::model::question::Question;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("question {0} is not part of this attempt")]
    InvalidQuestion(QuestionId),

    #[error("option {option} does not belong to question {question}")]
    InvalidOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("question {0} accepts at most one option")]
    TooManySelections(QuestionId),

    #[error("question {0} does not take a written answer")]
    TextNotAccepted(QuestionId),

    #[error("attempt can no longer be edited (status: {0})")]
    ExpiredSession(AttemptStatus),

    #[error("cannot move attempt from {from} to {to}")]
    InvalidTransition {
        from: AttemptStatus,
        to: AttemptStatus,
    },
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle status of an attempt.
///
/// `InProgress` moves at most once into a terminal status, optionally via
/// `SubmissionPendingRetry`. Nothing ever moves back to `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    AutoSubmitted,
    Expired,
    SubmissionPendingRetry,
}

impl AttemptStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "in_progress",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::AutoSubmitted => "auto_submitted",
            AttemptStatus::Expired => "expired",
            AttemptStatus::SubmissionPendingRetry => "submission_pending_retry",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "in_progress" => Some(AttemptStatus::InProgress),
            "submitted" => Some(AttemptStatus::Submitted),
            "auto_submitted" => Some(AttemptStatus::AutoSubmitted),
            "expired" => Some(AttemptStatus::Expired),
            "submission_pending_retry" => Some(AttemptStatus::SubmissionPendingRetry),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            AttemptStatus::Submitted | AttemptStatus::AutoSubmitted | AttemptStatus::Expired
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side initiated finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeKind {
    User,
    Auto,
}

impl FinalizeKind {
    #[must_use]
    pub fn is_auto(self) -> bool {
        matches!(self, FinalizeKind::Auto)
    }

    /// Terminal status reached once the store accepts the submission.
    #[must_use]
    pub fn terminal_status(self) -> AttemptStatus {
        match self {
            FinalizeKind::User => AttemptStatus::Submitted,
            FinalizeKind::Auto => AttemptStatus::AutoSubmitted,
        }
    }
}

/// Answer/flag counters for progress displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttemptSummary {
    pub total: usize,
    pub answered: usize,
    pub unanswered: usize,
    pub flagged: usize,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Canonical in-memory state of one quiz attempt.
///
/// Every question owns exactly one [`Answer`] from construction onward. Once
/// the final snapshot has been taken the session is *sealed*: it still reports
/// `InProgress` until the store answers, but rejects edits and ticks.
#[derive(Debug, Clone)]
pub struct AttemptSession {
    attempt_id: AttemptId,
    quiz_id: QuizId,
    questions: Vec<Question>,
    answers: HashMap<QuestionId, Answer>,
    flagged: BTreeSet<QuestionId>,
    status: AttemptStatus,
    time_remaining_secs: Option<u32>,
    sealed: bool,
}

impl AttemptSession {
    /// Builds a session, reconciling previously autosaved answers.
    ///
    /// Saved answers for questions still present are kept (minus options the
    /// question no longer offers); unknown question ids are ignored and new
    /// questions start empty. A repeated question id keeps its first occurrence.
    /// `None` time means the quiz is untimed.
    #[must_use]
    pub fn initialize(
        attempt_id: AttemptId,
        quiz_id: QuizId,
        questions: Vec<Question>,
        previous_answers: &[AnswerSnapshot],
        time_remaining_secs: Option<u32>,
    ) -> Self {
        let mut unique: Vec<Question> = Vec::with_capacity(questions.len());
        for question in questions {
            if !unique.iter().any(|q| q.id() == question.id()) {
                unique.push(question);
            }
        }

        let mut answers: HashMap<QuestionId, Answer> = unique
            .iter()
            .map(|q| (q.id(), Answer::empty()))
            .collect();

        for saved in previous_answers {
            let Some(question) = unique.iter().find(|q| q.id() == saved.question_id) else {
                continue;
            };
            if let Some(answer) = answers.get_mut(&saved.question_id) {
                *answer = reconcile(question, saved);
            }
        }

        Self {
            attempt_id,
            quiz_id,
            questions: unique,
            answers,
            flagged: BTreeSet::new(),
            status: AttemptStatus::InProgress,
            time_remaining_secs,
            sealed: false,
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
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    #[must_use]
    pub fn time_remaining(&self) -> Option<u32> {
        self.time_remaining_secs
    }

    #[must_use]
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.status == AttemptStatus::InProgress && !self.sealed
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question_ids(&self) -> Vec<QuestionId> {
        self.questions.iter().map(Question::id).collect()
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    #[must_use]
    pub fn answer(&self, id: QuestionId) -> Option<&Answer> {
        self.answers.get(&id)
    }

    #[must_use]
    pub fn is_flagged(&self, id: QuestionId) -> bool {
        self.flagged.contains(&id)
    }

    /// Flagged question ids in question order.
    #[must_use]
    pub fn flagged(&self) -> Vec<QuestionId> {
        self.questions
            .iter()
            .map(Question::id)
            .filter(|id| self.flagged.contains(id))
            .collect()
    }

    /// Merges the provided fields into the question's answer.
    ///
    /// # Errors
    ///
    /// Returns `ExpiredSession` when the attempt is no longer editable,
    /// `InvalidQuestion` for unknown ids, `InvalidOption` for options the
    /// question does not offer, `TooManySelections` when a single-select
    /// question receives more than one option and `TextNotAccepted` for text
    /// on a choice question. The answer is untouched on error.
    pub fn update_answer(
        &mut self,
        question_id: QuestionId,
        patch: AnswerPatch,
    ) -> Result<&Answer, AttemptError> {
        self.ensure_editable()?;
        let question = self
            .question(question_id)
            .ok_or(AttemptError::InvalidQuestion(question_id))?;

        if let Some(selected) = patch.selected_option_ids.as_ref() {
            if let Some(unknown) = selected.iter().find(|id| !question.has_option(**id)) {
                return Err(AttemptError::InvalidOption {
                    question: question_id,
                    option: *unknown,
                });
            }
            if question.kind().is_single_select() && selected.len() > 1 {
                return Err(AttemptError::TooManySelections(question_id));
            }
        }
        if patch.written_text.is_some() && !question.kind().is_text() {
            return Err(AttemptError::TextNotAccepted(question_id));
        }

        let answer = self
            .answers
            .get_mut(&question_id)
            .ok_or(AttemptError::InvalidQuestion(question_id))?;
        if let Some(selected) = patch.selected_option_ids {
            answer.set_selected(selected);
        }
        if let Some(text) = patch.written_text {
            answer.set_written_text(text);
        }
        Ok(answer)
    }

    /// Toggles one option.
    ///
    /// Single-select questions always use replace semantics, whatever
    /// `is_multiple` says: selecting replaces the current option and selecting
    /// the sole member again clears it.
    ///
    /// # Errors
    ///
    /// Returns `ExpiredSession`, `InvalidQuestion` or `InvalidOption`.
    pub fn toggle_option(
        &mut self,
        question_id: QuestionId,
        option_id: OptionId,
        is_multiple: bool,
    ) -> Result<&Answer, AttemptError> {
        self.ensure_editable()?;
        let question = self
            .question(question_id)
            .ok_or(AttemptError::InvalidQuestion(question_id))?;
        if !question.has_option(option_id) {
            return Err(AttemptError::InvalidOption {
                question: question_id,
                option: option_id,
            });
        }
        let multiple = is_multiple && !question.kind().is_single_select();

        let answer = self
            .answers
            .get_mut(&question_id)
            .ok_or(AttemptError::InvalidQuestion(question_id))?;
        let selected = answer.selected_mut();
        if multiple {
            if !selected.remove(&option_id) {
                selected.insert(option_id);
            }
        } else if selected.len() == 1 && selected.contains(&option_id) {
            selected.clear();
        } else {
            selected.clear();
            selected.insert(option_id);
        }
        Ok(answer)
    }

    /// Flags or unflags a question for review; returns the new flag state.
    ///
    /// # Errors
    ///
    /// Returns `ExpiredSession` or `InvalidQuestion`.
    pub fn toggle_flag(&mut self, question_id: QuestionId) -> Result<bool, AttemptError> {
        self.ensure_editable()?;
        if self.question(question_id).is_none() {
            return Err(AttemptError::InvalidQuestion(question_id));
        }
        if self.flagged.remove(&question_id) {
            Ok(false)
        } else {
            self.flagged.insert(question_id);
            Ok(true)
        }
    }

    /// Every answer in question order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AnswerSnapshot> {
        self.questions
            .iter()
            .map(|q| {
                self.answers
                    .get(&q.id())
                    .map_or_else(|| AnswerSnapshot::empty(q.id()), |a| a.to_snapshot(q.id()))
            })
            .collect()
    }

    #[must_use]
    pub fn summary(&self) -> AttemptSummary {
        let total = self.questions.len();
        let answered = self.answers.values().filter(|a| a.is_answered()).count();
        AttemptSummary {
            total,
            answered,
            unanswered: total.saturating_sub(answered),
            flagged: self.flagged.len(),
        }
    }

    /// Consumes one second of the countdown.
    ///
    /// Returns the new remaining time, or `None` when the session is untimed,
    /// sealed or no longer in progress.
    pub fn tick(&mut self) -> Option<u32> {
        if !self.is_editable() {
            return None;
        }
        let remaining = self.time_remaining_secs.as_mut()?;
        *remaining = remaining.saturating_sub(1);
        Some(*remaining)
    }

    /// Freezes the session and returns the final snapshot.
    ///
    /// # Errors
    ///
    /// Returns `ExpiredSession` if the session is already sealed or finished.
    pub fn seal(&mut self) -> Result<Vec<AnswerSnapshot>, AttemptError> {
        self.ensure_editable()?;
        self.sealed = true;
        Ok(self.snapshot())
    }

    /// Records the store's acceptance of the submission.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the session is sealed or awaiting a retry.
    pub fn complete(&mut self, kind: FinalizeKind) -> Result<AttemptStatus, AttemptError> {
        let to = kind.terminal_status();
        let allowed = match self.status {
            AttemptStatus::InProgress => self.sealed,
            AttemptStatus::SubmissionPendingRetry => true,
            _ => false,
        };
        if !allowed {
            return Err(AttemptError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(to)
    }

    /// Records a failed submission. Repeated failures keep the retry state.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` unless the session is sealed or already awaiting a retry.
    pub fn mark_pending_retry(&mut self) -> Result<(), AttemptError> {
        let allowed = match self.status {
            AttemptStatus::InProgress => self.sealed,
            AttemptStatus::SubmissionPendingRetry => true,
            _ => false,
        };
        if !allowed {
            return Err(AttemptError::InvalidTransition {
                from: self.status,
                to: AttemptStatus::SubmissionPendingRetry,
            });
        }
        self.status = AttemptStatus::SubmissionPendingRetry;
        Ok(())
    }

    /// Ends an abandoned, unsubmitted session.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTransition` once finalization has begun.
    pub fn expire(&mut self) -> Result<(), AttemptError> {
        if !self.is_editable() {
            return Err(AttemptError::InvalidTransition {
                from: self.status,
                to: AttemptStatus::Expired,
            });
        }
        self.status = AttemptStatus::Expired;
        Ok(())
    }

    fn ensure_editable(&self) -> Result<(), AttemptError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(AttemptError::ExpiredSession(self.status))
        }
    }
}

/// Rebuilds a saved answer, dropping anything the current question cannot hold.
fn reconcile(question: &Question, saved: &AnswerSnapshot) -> Answer {
    let mut answer = Answer::empty();
    let kind = question.kind();
    if kind.is_text() {
        answer.set_written_text(saved.written_text.clone());
        return answer;
    }

    let mut selected: BTreeSet<OptionId> = BTreeSet::new();
    for option in &saved.selected_option_ids {
        if !question.has_option(*option) {
            continue;
        }
        if kind.is_single_select() && !selected.is_empty() {
            break;
        }
        selected.insert(*option);
    }
    answer.set_selected(selected);
    answer
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::question::{ChoiceOption, QuestionBody};

    fn opt(id: u64) -> OptionId {
        OptionId::new(id)
    }

    fn qid(id: u64) -> QuestionId {
        QuestionId::new(id)
    }

    fn single(id: u64) -> Question {
        Question::new(
            qid(id),
            format!("Single {id}"),
            1,
            QuestionBody::SingleChoice {
                options: vec![
                    ChoiceOption::new(opt(1), "A"),
                    ChoiceOption::new(opt(2), "B"),
                    ChoiceOption::new(opt(3), "C"),
                ],
            },
        )
        .unwrap()
    }

    fn multi(id: u64) -> Question {
        Question::new(
            qid(id),
            format!("Multi {id}"),
            2,
            QuestionBody::MultiChoice {
                options: vec![
                    ChoiceOption::new(opt(1), "A"),
                    ChoiceOption::new(opt(2), "B"),
                    ChoiceOption::new(opt(3), "C"),
                ],
            },
        )
        .unwrap()
    }

    fn text(id: u64) -> Question {
        Question::new(qid(id), format!("Text {id}"), 3, QuestionBody::ShortText).unwrap()
    }

    fn true_false(id: u64) -> Question {
        Question::new(
            qid(id),
            format!("TF {id}"),
            1,
            QuestionBody::true_false(opt(1), opt(2)),
        )
        .unwrap()
    }

    fn session(questions: Vec<Question>) -> AttemptSession {
        AttemptSession::initialize(
            AttemptId::new(1),
            QuizId::new(1),
            questions,
            &[],
            Some(120),
        )
    }

    #[test]
    fn initialize_keeps_known_answers_and_fills_new_questions() {
        let previous = vec![
            AnswerSnapshot {
                question_id: qid(1),
                selected_option_ids: vec![opt(2)],
                written_text: String::new(),
            },
            AnswerSnapshot {
                question_id: qid(2),
                selected_option_ids: vec![],
                written_text: "mitochondria".into(),
            },
            AnswerSnapshot {
                question_id: qid(99),
                selected_option_ids: vec![opt(1)],
                written_text: String::new(),
            },
        ];

        let session = AttemptSession::initialize(
            AttemptId::new(5),
            QuizId::new(2),
            vec![single(1), text(2), multi(3)],
            &previous,
            Some(600),
        );

        let snapshot = session.snapshot();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0], previous[0]);
        assert_eq!(snapshot[1], previous[1]);
        assert_eq!(snapshot[2], AnswerSnapshot::empty(qid(3)));
        assert!(session.answer(qid(99)).is_none());
        assert_eq!(session.status(), AttemptStatus::InProgress);
        assert_eq!(session.time_remaining(), Some(600));
    }

    #[test]
    fn initialize_drops_options_the_question_no_longer_offers() {
        let previous = vec![AnswerSnapshot {
            question_id: qid(1),
            selected_option_ids: vec![opt(7), opt(2), opt(3)],
            written_text: "stray".into(),
        }];
        let session = AttemptSession::initialize(
            AttemptId::new(1),
            QuizId::new(1),
            vec![single(1)],
            &previous,
            None,
        );

        let answer = session.answer(qid(1)).unwrap();
        assert_eq!(answer.selected_option_ids().len(), 1);
        assert!(answer.selected_option_ids().contains(&opt(2)));
        assert_eq!(answer.written_text(), "");
    }

    #[test]
    fn repeated_question_ids_keep_one_answer() {
        let session = session(vec![single(1), single(1), text(2)]);
        assert_eq!(session.questions().len(), 2);
        assert_eq!(session.snapshot().len(), 2);
    }

    #[test]
    fn single_choice_replaces_selection() {
        let mut session = session(vec![single(1)]);
        session.toggle_option(qid(1), opt(1), false).unwrap();
        let answer = session.toggle_option(qid(1), opt(2), false).unwrap();

        let selected: Vec<_> = answer.selected_option_ids().iter().copied().collect();
        assert_eq!(selected, vec![opt(2)]);
    }

    #[test]
    fn single_choice_toggle_off_clears_selection() {
        let mut session = session(vec![single(1)]);
        session.toggle_option(qid(1), opt(3), false).unwrap();
        let answer = session.toggle_option(qid(1), opt(3), false).unwrap();
        assert!(answer.selected_option_ids().is_empty());
    }

    #[test]
    fn single_select_never_exceeds_one_option() {
        let mut session = session(vec![single(1), true_false(2)]);
        let sequence = [
            (1, true),
            (2, true),
            (2, false),
            (3, true),
            (1, false),
            (1, false),
            (3, true),
            (2, true),
        ];
        for (option, hint) in sequence {
            let answer = session.toggle_option(qid(1), opt(option), hint).unwrap();
            assert!(answer.selected_option_ids().len() <= 1);
        }
        for (option, hint) in [(1, true), (2, true), (2, true), (1, false)] {
            let answer = session.toggle_option(qid(2), opt(option), hint).unwrap();
            assert!(answer.selected_option_ids().len() <= 1);
        }
    }

    #[test]
    fn multi_choice_adds_and_removes() {
        let mut session = session(vec![multi(1)]);
        session.toggle_option(qid(1), opt(1), true).unwrap();
        session.toggle_option(qid(1), opt(3), true).unwrap();
        let answer = session.toggle_option(qid(1), opt(1), true).unwrap();

        let selected: Vec<_> = answer.selected_option_ids().iter().copied().collect();
        assert_eq!(selected, vec![opt(3)]);
    }

    #[test]
    fn toggle_option_rejects_foreign_options() {
        let mut session = session(vec![single(1)]);
        let err = session.toggle_option(qid(1), opt(42), false).unwrap_err();
        assert_eq!(
            err,
            AttemptError::InvalidOption {
                question: qid(1),
                option: opt(42)
            }
        );
    }

    #[test]
    fn update_answer_merges_fields() {
        let mut session = session(vec![text(1), multi(2)]);
        session
            .update_answer(qid(1), AnswerPatch::text("first draft"))
            .unwrap();
        session
            .update_answer(qid(1), AnswerPatch::text("final"))
            .unwrap();
        assert_eq!(session.answer(qid(1)).unwrap().written_text(), "final");

        session
            .update_answer(qid(2), AnswerPatch::selection([opt(1), opt(2)]))
            .unwrap();
        session
            .update_answer(qid(2), AnswerPatch::selection([opt(2)]))
            .unwrap();
        let answer = session.answer(qid(2)).unwrap();
        assert_eq!(answer.selected_option_ids().len(), 1);
        assert!(answer.written_text().is_empty());
    }

    #[test]
    fn choice_questions_reject_text_so_resume_matches_live_state() {
        let mut session = session(vec![multi(1), text(2)]);
        session
            .update_answer(qid(1), AnswerPatch::selection([opt(1)]))
            .unwrap();
        assert_eq!(
            session
                .update_answer(qid(1), AnswerPatch::text("note"))
                .unwrap_err(),
            AttemptError::TextNotAccepted(qid(1))
        );
        session
            .update_answer(qid(2), AnswerPatch::text("kept"))
            .unwrap();

        let saved = session.snapshot();
        assert!(saved[0].written_text.is_empty());
        let resumed = AttemptSession::initialize(
            session.attempt_id(),
            session.quiz_id(),
            vec![multi(1), text(2)],
            &saved,
            None,
        );
        assert_eq!(resumed.snapshot(), saved);
    }

    #[test]
    fn update_answer_validates_input() {
        let mut session = session(vec![single(1)]);
        assert_eq!(
            session
                .update_answer(qid(9), AnswerPatch::text("x"))
                .unwrap_err(),
            AttemptError::InvalidQuestion(qid(9))
        );
        assert_eq!(
            session
                .update_answer(qid(1), AnswerPatch::selection([opt(1), opt(2)]))
                .unwrap_err(),
            AttemptError::TooManySelections(qid(1))
        );
        assert!(session.answer(qid(1)).unwrap().selected_option_ids().is_empty());
    }

    #[test]
    fn flags_toggle_and_count() {
        let mut session = session(vec![single(1), text(2)]);
        assert!(session.toggle_flag(qid(2)).unwrap());
        assert!(session.toggle_flag(qid(1)).unwrap());
        assert!(!session.toggle_flag(qid(2)).unwrap());
        assert_eq!(session.flagged(), vec![qid(1)]);
        assert_eq!(
            session.toggle_flag(qid(5)).unwrap_err(),
            AttemptError::InvalidQuestion(qid(5))
        );
    }

    #[test]
    fn summary_counts_answered_and_flagged() {
        let mut session = session(vec![single(1), text(2), multi(3)]);
        session.toggle_option(qid(1), opt(1), false).unwrap();
        session.update_answer(qid(2), AnswerPatch::text("  ")).unwrap();
        session.toggle_flag(qid(3)).unwrap();

        let summary = session.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.answered, 1);
        assert_eq!(summary.unanswered, 2);
        assert_eq!(summary.flagged, 1);
    }

    #[test]
    fn tick_floors_at_zero() {
        let mut session = AttemptSession::initialize(
            AttemptId::new(1),
            QuizId::new(1),
            vec![text(1)],
            &[],
            Some(2),
        );
        assert_eq!(session.tick(), Some(1));
        assert_eq!(session.tick(), Some(0));
        assert_eq!(session.tick(), Some(0));
    }

    #[test]
    fn untimed_session_never_ticks() {
        let mut session = AttemptSession::initialize(
            AttemptId::new(1),
            QuizId::new(1),
            vec![text(1)],
            &[],
            None,
        );
        assert_eq!(session.tick(), None);
    }

    #[test]
    fn sealed_session_rejects_edits_and_ticks() {
        let mut session = session(vec![single(1)]);
        session.toggle_option(qid(1), opt(1), false).unwrap();
        let frozen = session.seal().unwrap();
        assert_eq!(frozen[0].selected_option_ids, vec![opt(1)]);

        assert_eq!(session.tick(), None);
        assert_eq!(
            session.toggle_option(qid(1), opt(2), false).unwrap_err(),
            AttemptError::ExpiredSession(AttemptStatus::InProgress)
        );
        assert!(session.seal().is_err());
        assert_eq!(session.time_remaining(), Some(120));
    }

    #[test]
    fn completion_requires_a_sealed_session() {
        let mut session = session(vec![single(1)]);
        assert!(session.complete(FinalizeKind::User).is_err());

        session.seal().unwrap();
        assert_eq!(
            session.complete(FinalizeKind::Auto).unwrap(),
            AttemptStatus::AutoSubmitted
        );
        assert!(session.complete(FinalizeKind::User).is_err());
        assert!(session.mark_pending_retry().is_err());
        assert_eq!(session.status(), AttemptStatus::AutoSubmitted);
    }

    #[test]
    fn pending_retry_resolves_forward_only() {
        let mut session = session(vec![single(1)]);
        session.seal().unwrap();
        session.mark_pending_retry().unwrap();
        session.mark_pending_retry().unwrap();
        assert_eq!(session.status(), AttemptStatus::SubmissionPendingRetry);
        assert!(session.expire().is_err());
        assert!(matches!(
            session.toggle_flag(qid(1)),
            Err(AttemptError::ExpiredSession(AttemptStatus::SubmissionPendingRetry))
        ));

        session.complete(FinalizeKind::User).unwrap();
        assert_eq!(session.status(), AttemptStatus::Submitted);
    }

    #[test]
    fn expired_session_rejects_edits() {
        let mut session = session(vec![text(1)]);
        session.expire().unwrap();
        assert_eq!(
            session
                .update_answer(qid(1), AnswerPatch::text("late"))
                .unwrap_err(),
            AttemptError::ExpiredSession(AttemptStatus::Expired)
        );
        assert_eq!(session.answer(qid(1)).unwrap().written_text(), "");
        assert!(session.status().is_terminal());
    }

    #[test]
    fn status_round_trips_through_storage_string() {
        for status in [
            AttemptStatus::InProgress,
            AttemptStatus::Submitted,
            AttemptStatus::AutoSubmitted,
            AttemptStatus::Expired,
            AttemptStatus::SubmissionPendingRetry,
        ] {
            assert_eq!(AttemptStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(AttemptStatus::parse("graded"), None);
    }
}
