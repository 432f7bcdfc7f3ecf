use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::model::ids::{OptionId, QuestionId};

/// Current response to a single question.
///
/// `selected_option_ids` is only meaningful for choice questions and
/// `written_text` only for text questions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    selected_option_ids: BTreeSet<OptionId>,
    written_text: String,
}

impl Answer {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn selected_option_ids(&self) -> &BTreeSet<OptionId> {
        &self.selected_option_ids
    }

    #[must_use]
    pub fn written_text(&self) -> &str {
        &self.written_text
    }

    /// True when the student has selected something or typed non-blank text.
    #[must_use]
    pub fn is_answered(&self) -> bool {
        !self.selected_option_ids.is_empty() || !self.written_text.trim().is_empty()
    }

    pub(crate) fn selected_mut(&mut self) -> &mut BTreeSet<OptionId> {
        &mut self.selected_option_ids
    }

    pub(crate) fn set_selected(&mut self, selected: BTreeSet<OptionId>) {
        self.selected_option_ids = selected;
    }

    pub(crate) fn set_written_text(&mut self, text: String) {
        self.written_text = text;
    }

    pub(crate) fn to_snapshot(&self, question_id: QuestionId) -> AnswerSnapshot {
        AnswerSnapshot {
            question_id,
            selected_option_ids: self.selected_option_ids.iter().copied().collect(),
            written_text: self.written_text.clone(),
        }
    }
}

/// Partial update merged into an existing [`Answer`]; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerPatch {
    pub written_text: Option<String>,
    pub selected_option_ids: Option<BTreeSet<OptionId>>,
}

impl AnswerPatch {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            written_text: Some(text.into()),
            selected_option_ids: None,
        }
    }

    #[must_use]
    pub fn selection(ids: impl IntoIterator<Item = OptionId>) -> Self {
        Self {
            written_text: None,
            selected_option_ids: Some(ids.into_iter().collect()),
        }
    }
}

/// Wire and persistence shape of one answer; option ids are ascending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSnapshot {
    pub question_id: QuestionId,
    #[serde(default)]
    pub selected_option_ids: Vec<OptionId>,
    #[serde(default)]
    pub written_text: String,
}

impl AnswerSnapshot {
    #[must_use]
    pub fn empty(question_id: QuestionId) -> Self {
        Self {
            question_id,
            selected_option_ids: Vec::new(),
            written_text: String::new(),
        }
    }
}
