use chrono::{DateTime, Duration, Utc};
use quiz_core::model::{AnswerSnapshot, AttemptId, AttemptStatus, QuizId};
use sqlx::Row;
use tracing::{debug, info};
use uuid::Uuid;

use super::SqliteRepository;
use super::mapping::{answers_from_json, answers_to_json, attempt_id_from_i64, conn, id_i64, ser};
use crate::repository::{
    AttemptStart, AttemptStore, QuizDefinitionRepository, StorageError, SubmissionReceipt,
};

/// Server-side view of a stored attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,
    pub quiz_id: QuizId,
    pub status: AttemptStatus,
    pub answers: Vec<AnswerSnapshot>,
    pub is_auto_submit: Option<bool>,
    pub result_ref: Option<String>,
}

fn parse_status(raw: &str) -> Result<AttemptStatus, StorageError> {
    AttemptStatus::parse(raw)
        .ok_or_else(|| StorageError::Serialization(format!("invalid status: {raw}")))
}

impl SqliteRepository {
    /// Fetch a stored attempt.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the attempt is unknown, or other storage errors.
    pub async fn attempt_record(&self, attempt_id: AttemptId) -> Result<AttemptRecord, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, quiz_id, status, answers_json, is_auto_submit, result_ref
            FROM attempts
            WHERE id = ?1
            ",
        )
        .bind(id_i64("attempt_id", attempt_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        let quiz_id: i64 = row.try_get("quiz_id").map_err(ser)?;
        Ok(AttemptRecord {
            attempt_id: attempt_id_from_i64(row.try_get("id").map_err(ser)?)?,
            quiz_id: super::mapping::quiz_id_from_i64(quiz_id)?,
            status: parse_status(&row.try_get::<String, _>("status").map_err(ser)?)?,
            answers: answers_from_json(&row.try_get::<String, _>("answers_json").map_err(ser)?)?,
            is_auto_submit: row
                .try_get::<Option<i64>, _>("is_auto_submit")
                .map_err(ser)?
                .map(|v| v != 0),
            result_ref: row.try_get("result_ref").map_err(ser)?,
        })
    }

    async fn attempt_status(&self, attempt_id: i64) -> Result<AttemptStatus, StorageError> {
        let status: String = sqlx::query_scalar("SELECT status FROM attempts WHERE id = ?1")
            .bind(attempt_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;
        parse_status(&status)
    }
}

#[async_trait::async_trait]
impl AttemptStore for SqliteRepository {
    async fn start(&self, quiz_id: QuizId) -> Result<AttemptStart, StorageError> {
        let definition = self.get_by_id(quiz_id).await?;
        let quiz = id_i64("quiz_id", quiz_id.value())?;
        let now = self.clock.now();

        let open = sqlx::query(
            r"
            SELECT id, deadline_at, answers_json
            FROM attempts
            WHERE quiz_id = ?1 AND status = ?2
            ORDER BY id DESC
            LIMIT 1
            ",
        )
        .bind(quiz)
        .bind(AttemptStatus::InProgress.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        if let Some(row) = open {
            let attempt_id = attempt_id_from_i64(row.try_get("id").map_err(ser)?)?;
            let deadline: Option<DateTime<Utc>> = row.try_get("deadline_at").map_err(ser)?;
            let previous_answers =
                answers_from_json(&row.try_get::<String, _>("answers_json").map_err(ser)?)?;
            let time_remaining_secs = deadline.map(|d| self.clock.seconds_until(d));
            info!(%attempt_id, %quiz_id, ?time_remaining_secs, "resuming open attempt");
            return Ok(AttemptStart {
                attempt_id,
                quiz_id,
                questions: definition.questions().to_vec(),
                previous_answers,
                time_remaining_secs,
            });
        }

        let deadline = definition
            .time_limit_secs()
            .map(|secs| now + Duration::seconds(i64::from(secs)));
        let res = sqlx::query(
            r"
            INSERT INTO attempts (quiz_id, status, started_at, deadline_at, answers_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(quiz)
        .bind(AttemptStatus::InProgress.as_str())
        .bind(now)
        .bind(deadline)
        .bind(answers_to_json(&[])?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        let attempt_id = attempt_id_from_i64(res.last_insert_rowid())?;
        info!(%attempt_id, %quiz_id, "attempt opened");
        Ok(AttemptStart {
            attempt_id,
            quiz_id,
            questions: definition.questions().to_vec(),
            previous_answers: Vec::new(),
            time_remaining_secs: definition.time_limit_secs(),
        })
    }

    async fn save_progress(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
    ) -> Result<(), StorageError> {
        let id = id_i64("attempt_id", attempt_id.value())?;
        let res = sqlx::query(
            r"
            UPDATE attempts
            SET answers_json = ?1, saved_at = ?2
            WHERE id = ?3 AND status = ?4
            ",
        )
        .bind(answers_to_json(answers)?)
        .bind(self.clock.now())
        .bind(id)
        .bind(AttemptStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            // Distinguish a closed attempt from a missing one.
            self.attempt_status(id).await?;
            return Err(StorageError::Conflict);
        }
        debug!(%attempt_id, answers = answers.len(), "progress saved");
        Ok(())
    }

    async fn submit(
        &self,
        attempt_id: AttemptId,
        answers: &[AnswerSnapshot],
        is_auto_submit: bool,
    ) -> Result<SubmissionReceipt, StorageError> {
        let id = id_i64("attempt_id", attempt_id.value())?;
        let status = if is_auto_submit {
            AttemptStatus::AutoSubmitted
        } else {
            AttemptStatus::Submitted
        };
        let result_ref = Uuid::new_v4().to_string();

        let res = sqlx::query(
            r"
            UPDATE attempts
            SET status = ?1, answers_json = ?2, submitted_at = ?3,
                is_auto_submit = ?4, result_ref = ?5
            WHERE id = ?6 AND status = ?7
            ",
        )
        .bind(status.as_str())
        .bind(answers_to_json(answers)?)
        .bind(self.clock.now())
        .bind(i64::from(is_auto_submit))
        .bind(&result_ref)
        .bind(id)
        .bind(AttemptStatus::InProgress.as_str())
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            self.attempt_status(id).await?;
            return Err(StorageError::Conflict);
        }

        info!(%attempt_id, is_auto_submit, %result_ref, "attempt submitted");
        Ok(SubmissionReceipt {
            attempt_id,
            result_ref,
        })
    }
}
