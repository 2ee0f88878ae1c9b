// src/kiosk/store.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{exam::Exam, question::Question},
};

/// Data access boundary for the kiosk core. Injected into the session
/// registry so tests can substitute an in-memory implementation; the
/// core depends on nothing else: exam-by-id, questions-by-exam,
/// submission existence and the single submission insert.
#[async_trait]
pub trait KioskStore: Send + Sync {
    async fn fetch_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, AppError>;

    async fn fetch_questions(&self, exam_id: Uuid) -> Result<Vec<Question>, AppError>;

    async fn fetch_student_level(&self, student_id: Uuid) -> Result<Option<i32>, AppError>;

    async fn has_submission(&self, exam_id: Uuid, student_id: Uuid) -> Result<bool, AppError>;

    async fn insert_submission(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
        score: f64,
    ) -> Result<(), AppError>;
}

/// Postgres-backed store used by the running service.
pub struct PgKioskStore {
    pool: PgPool,
}

impl PgKioskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KioskStore for PgKioskStore {
    async fn fetch_exam(&self, exam_id: Uuid) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, Exam>(
            r#"
            SELECT id, title, course, lecturer_id, level, duration_minutes,
                   total_marks, is_active, created_at
            FROM exams
            WHERE id = $1
            "#,
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(exam)
    }

    async fn fetch_questions(&self, exam_id: Uuid) -> Result<Vec<Question>, AppError> {
        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT id, exam_id, question_text, options, correct_index, marks
            FROM questions
            WHERE exam_id = $1
            ORDER BY id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(questions)
    }

    async fn fetch_student_level(&self, student_id: Uuid) -> Result<Option<i32>, AppError> {
        let level = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT level FROM profiles WHERE id = $1",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(level.flatten())
    }

    async fn has_submission(&self, exam_id: Uuid, student_id: Uuid) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM submissions WHERE exam_id = $1 AND student_id = $2)",
        )
        .bind(exam_id)
        .bind(student_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn insert_submission(
        &self,
        exam_id: Uuid,
        student_id: Uuid,
        score: f64,
    ) -> Result<(), AppError> {
        sqlx::query("INSERT INTO submissions (exam_id, student_id, score) VALUES ($1, $2, $3)")
            .bind(exam_id)
            .bind(student_id)
            .bind(score)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert submission: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(())
    }
}
