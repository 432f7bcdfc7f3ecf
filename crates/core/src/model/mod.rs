mod answer;
mod assessment;
mod attempt;
mod ids;
mod question;
mod settings;
mod warning;

pub use answer::{Answer, AnswerPatch, AnswerSnapshot};
pub use assessment::{AssessmentDefinition, AssessmentError};
pub use attempt::{
    AttemptError, AttemptSession, AttemptStatus, AttemptSummary, FinalizeKind,
};
pub use ids::{AttemptId, OptionId, ParseIdError, QuestionId, QuizId};
pub use question::{ChoiceOption, Question, QuestionBody, QuestionError, QuestionKind};
pub use settings::{EngineSettings, SettingsError};
pub use warning::{TimeWarning, WarningLatches};
