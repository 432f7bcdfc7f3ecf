use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};
use crate::model::question::{Question, QuestionError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("assessment title cannot be empty")]
    EmptyTitle,

    #[error("assessment must contain at least one question")]
    NoQuestions,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("time limit must be > 0 when set")]
    InvalidTimeLimit,

    #[error(transparent)]
    Question(#[from] QuestionError),
}

/// Read-only quiz metadata used for display while an attempt runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssessmentDefinition {
    quiz_id: QuizId,
    title: String,
    questions: Vec<Question>,
    time_limit_secs: Option<u32>,
}

impl AssessmentDefinition {
    /// Creates a validated definition.
    ///
    /// # Errors
    ///
    /// Returns `AssessmentError` for an empty title, no questions, repeated
    /// question ids, a zero time limit, or an invalid question.
    pub fn new(
        quiz_id: QuizId,
        title: impl Into<String>,
        questions: Vec<Question>,
        time_limit_secs: Option<u32>,
    ) -> Result<Self, AssessmentError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(AssessmentError::EmptyTitle);
        }
        if questions.is_empty() {
            return Err(AssessmentError::NoQuestions);
        }
        if time_limit_secs == Some(0) {
            return Err(AssessmentError::InvalidTimeLimit);
        }

        let mut seen = HashSet::with_capacity(questions.len());
        for question in &questions {
            question.validate()?;
            if !seen.insert(question.id()) {
                return Err(AssessmentError::DuplicateQuestion(question.id()));
            }
        }

        Ok(Self {
            quiz_id,
            title: title.trim().to_owned(),
            questions,
            time_limit_secs,
        })
    }

    /// Re-validates a definition received over the wire.
    ///
    /// # Errors
    ///
    /// See [`AssessmentDefinition::new`].
    pub fn validated(self) -> Result<Self, AssessmentError> {
        Self::new(self.quiz_id, self.title, self.questions, self.time_limit_secs)
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
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u32> {
        self.time_limit_secs
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id() == id)
    }

    /// Point value of a question, or `None` if it is not part of this quiz.
    #[must_use]
    pub fn points_for(&self, id: QuestionId) -> Option<u32> {
        self.question(id).map(Question::points)
    }

    #[must_use]
    pub fn total_points(&self) -> u32 {
        self.questions
            .iter()
            .fold(0_u32, |acc, q| acc.saturating_add(q.points()))
    }
}
