use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{OptionId, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("choice question {0} has no options")]
    NoOptions(QuestionId),

    #[error("question {question} lists option {option} more than once")]
    DuplicateOption {
        question: QuestionId,
        option: OptionId,
    },

    #[error("true/false question {0} must have exactly two options")]
    TrueFalseArity(QuestionId),

    #[error("unknown question kind: {0}")]
    UnknownKind(String),
}

//
// ─── KIND ──────────────────────────────────────────────────────────────────────
//

/// Flat discriminant of a question body, used by storage and summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    MultiChoice,
    TrueFalse,
    ShortText,
    LongText,
}

impl QuestionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QuestionKind::SingleChoice => "single_choice",
            QuestionKind::MultiChoice => "multi_choice",
            QuestionKind::TrueFalse => "true_false",
            QuestionKind::ShortText => "short_text",
            QuestionKind::LongText => "long_text",
        }
    }

    /// Parses the storage representation produced by [`QuestionKind::as_str`].
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnknownKind` for unrecognized values.
    pub fn parse(raw: &str) -> Result<Self, QuestionError> {
        match raw {
            "single_choice" => Ok(QuestionKind::SingleChoice),
            "multi_choice" => Ok(QuestionKind::MultiChoice),
            "true_false" => Ok(QuestionKind::TrueFalse),
            "short_text" => Ok(QuestionKind::ShortText),
            "long_text" => Ok(QuestionKind::LongText),
            other => Err(QuestionError::UnknownKind(other.to_owned())),
        }
    }

    /// True when at most one option may be selected.
    #[must_use]
    pub fn is_single_select(self) -> bool {
        matches!(self, QuestionKind::SingleChoice | QuestionKind::TrueFalse)
    }

    #[must_use]
    pub fn is_multiple(self) -> bool {
        matches!(self, QuestionKind::MultiChoice)
    }

    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, QuestionKind::ShortText | QuestionKind::LongText)
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── BODY ──────────────────────────────────────────────────────────────────────
//

/// A selectable option of a choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: OptionId,
    pub label: String,
}

impl ChoiceOption {
    #[must_use]
    pub fn new(id: OptionId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }
}

/// Variant-specific payload of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionBody {
    SingleChoice { options: Vec<ChoiceOption> },
    MultiChoice { options: Vec<ChoiceOption> },
    TrueFalse { options: Vec<ChoiceOption> },
    ShortText,
    LongText,
}

impl QuestionBody {
    /// Builds a true/false body with the conventional labels.
    #[must_use]
    pub fn true_false(true_id: OptionId, false_id: OptionId) -> Self {
        QuestionBody::TrueFalse {
            options: vec![
                ChoiceOption::new(true_id, "True"),
                ChoiceOption::new(false_id, "False"),
            ],
        }
    }

    /// Rebuilds a body from its flat kind and option list.
    #[must_use]
    pub fn from_parts(kind: QuestionKind, options: Vec<ChoiceOption>) -> Self {
        match kind {
            QuestionKind::SingleChoice => QuestionBody::SingleChoice { options },
            QuestionKind::MultiChoice => QuestionBody::MultiChoice { options },
            QuestionKind::TrueFalse => QuestionBody::TrueFalse { options },
            QuestionKind::ShortText => QuestionBody::ShortText,
            QuestionKind::LongText => QuestionBody::LongText,
        }
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self {
            QuestionBody::SingleChoice { .. } => QuestionKind::SingleChoice,
            QuestionBody::MultiChoice { .. } => QuestionKind::MultiChoice,
            QuestionBody::TrueFalse { .. } => QuestionKind::TrueFalse,
            QuestionBody::ShortText => QuestionKind::ShortText,
            QuestionBody::LongText => QuestionKind::LongText,
        }
    }

    /// Options in display order; empty for text questions.
    #[must_use]
    pub fn options(&self) -> &[ChoiceOption] {
        match self {
            QuestionBody::SingleChoice { options }
            | QuestionBody::MultiChoice { options }
            | QuestionBody::TrueFalse { options } => options,
            QuestionBody::ShortText | QuestionBody::LongText => &[],
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// A single question of an assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    points: u32,
    #[serde(flatten)]
    body: QuestionBody,
}

impl Question {
    /// Creates a validated question.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError` when a choice question has no options, repeats an
    /// option id, or a true/false question does not have exactly two options.
    pub fn new(
        id: QuestionId,
        prompt: impl Into<String>,
        points: u32,
        body: QuestionBody,
    ) -> Result<Self, QuestionError> {
        let question = Self {
            id,
            prompt: prompt.into().trim().to_owned(),
            points,
            body,
        };
        question.validate()?;
        Ok(question)
    }

    /// Re-checks structural rules; used after deserializing untrusted payloads.
    ///
    /// # Errors
    ///
    /// See [`Question::new`].
    pub fn validate(&self) -> Result<(), QuestionError> {
        let kind = self.kind();
        if kind.is_text() {
            return Ok(());
        }

        let options = self.body.options();
        if options.is_empty() {
            return Err(QuestionError::NoOptions(self.id));
        }
        if kind == QuestionKind::TrueFalse && options.len() != 2 {
            return Err(QuestionError::TrueFalseArity(self.id));
        }

        let mut seen = HashSet::with_capacity(options.len());
        for option in options {
            if !seen.insert(option.id) {
                return Err(QuestionError::DuplicateOption {
                    question: self.id,
                    option: option.id,
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn points(&self) -> u32 {
        self.points
    }

    #[must_use]
    pub fn body(&self) -> &QuestionBody {
        &self.body
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.body.kind()
    }

    #[must_use]
    pub fn options(&self) -> &[ChoiceOption] {
        self.body.options()
    }

    #[must_use]
    pub fn has_option(&self, option_id: OptionId) -> bool {
        self.options().iter().any(|o| o.id == option_id)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
