use quiz_core::model::{
    AnswerSnapshot, AttemptId, ChoiceOption, Question, QuestionBody, QuestionId, QuestionKind,
    QuizId,
};
use sqlx::Row;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn quiz_id_from_i64(v: i64) -> Result<QuizId, StorageError> {
    Ok(QuizId::new(i64_to_u64("quiz_id", v)?))
}

pub(crate) fn attempt_id_from_i64(v: i64) -> Result<AttemptId, StorageError> {
    Ok(AttemptId::new(i64_to_u64("attempt_id", v)?))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn answers_to_json(answers: &[AnswerSnapshot]) -> Result<String, StorageError> {
    serde_json::to_string(answers).map_err(ser)
}

pub(crate) fn answers_from_json(raw: &str) -> Result<Vec<AnswerSnapshot>, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

pub(crate) fn options_to_json(question: &Question) -> Result<String, StorageError> {
    serde_json::to_string(question.options()).map_err(ser)
}

pub(crate) fn map_question_row(row: &sqlx::sqlite::SqliteRow) -> Result<Question, StorageError> {
    let id = QuestionId::new(i64_to_u64("question_id", row.try_get("id").map_err(ser)?)?);
    let kind = QuestionKind::parse(&row.try_get::<String, _>("kind").map_err(ser)?).map_err(ser)?;
    let prompt: String = row.try_get("prompt").map_err(ser)?;
    let points = u32_from_i64("points", row.try_get("points").map_err(ser)?)?;
    let options: Vec<ChoiceOption> =
        serde_json::from_str(&row.try_get::<String, _>("options_json").map_err(ser)?)
            .map_err(ser)?;

    Question::new(id, prompt, points, QuestionBody::from_parts(kind, options)).map_err(ser)
}
