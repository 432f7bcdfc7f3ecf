use quiz_core::model::{AssessmentDefinition, Question, QuizId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_question_row, options_to_json, quiz_id_from_i64, ser, u32_from_i64};
use crate::repository::{QuizDefinitionRepository, StorageError};

impl SqliteRepository {
    /// Persist or replace a quiz definition together with its questions.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; the transaction is rolled back.
    pub async fn upsert_quiz(&self, definition: &AssessmentDefinition) -> Result<(), StorageError> {
        let quiz_id = id_i64("quiz_id", definition.quiz_id().value())?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query(
            r"
            INSERT INTO quizzes (id, title, time_limit_secs)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                time_limit_secs = excluded.time_limit_secs
            ",
        )
        .bind(quiz_id)
        .bind(definition.title())
        .bind(definition.time_limit_secs().map(i64::from))
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        sqlx::query("DELETE FROM questions WHERE quiz_id = ?1")
            .bind(quiz_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for (position, question) in definition.questions().iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                INSERT INTO questions (quiz_id, id, position, kind, prompt, points, options_json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(quiz_id)
            .bind(id_i64("question_id", question.id().value())?)
            .bind(position)
            .bind(question.kind().as_str())
            .bind(question.prompt())
            .bind(i64::from(question.points()))
            .bind(options_to_json(question)?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    pub(crate) async fn load_questions(&self, quiz_id: QuizId) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, kind, prompt, points, options_json
            FROM questions
            WHERE quiz_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(id_i64("quiz_id", quiz_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_question_row).collect()
    }
}

#[async_trait::async_trait]
impl QuizDefinitionRepository for SqliteRepository {
    async fn get_by_id(&self, quiz_id: QuizId) -> Result<AssessmentDefinition, StorageError> {
        let row = sqlx::query("SELECT id, title, time_limit_secs FROM quizzes WHERE id = ?1")
            .bind(id_i64("quiz_id", quiz_id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let id = quiz_id_from_i64(row.try_get("id").map_err(ser)?)?;
        let title: String = row.try_get("title").map_err(ser)?;
        let time_limit_secs = row
            .try_get::<Option<i64>, _>("time_limit_secs")
            .map_err(ser)?
            .map(|v| u32_from_i64("time_limit_secs", v))
            .transpose()?;
        let questions = self.load_questions(quiz_id).await?;

        AssessmentDefinition::new(id, title, questions, time_limit_secs).map_err(ser)
    }
}
