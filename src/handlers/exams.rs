// src/handlers/exams.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        exam::{CreateExamRequest, Exam, ExamListParams, SetActiveRequest},
        profile::is_valid_level,
    },
    utils::jwt::Claims,
};

/// Publishes a new exam together with its question list.
/// Staff only. The exam and all questions are inserted in one
/// transaction so a half-published exam can never be sat.
pub async fn create_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if !is_valid_level(payload.level) {
        return Err(AppError::BadRequest(
            "Level must be one of 100, 200, 300 or 400".to_string(),
        ));
    }

    let lecturer_id = claims.user_id()?;

    let mut tx = pool.begin().await?;

    let exam_id = sqlx::query_scalar::<_, Uuid>(
        r#"
        INSERT INTO exams (title, course, lecturer_id, level, duration_minutes, total_marks, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        RETURNING id
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.course)
    .bind(lecturer_id)
    .bind(payload.level)
    .bind(payload.duration_minutes)
    .bind(payload.total_marks)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to insert exam: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for q in &payload.questions {
        sqlx::query(
            r#"
            INSERT INTO questions (exam_id, question_text, options, correct_index, marks)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(exam_id)
        .bind(&q.question_text)
        .bind(sqlx::types::Json(&q.options))
        .bind(q.correct_index)
        .bind(q.marks)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    tx.commit().await?;

    tracing::info!(
        "Exam {} published by lecturer {} ({} questions)",
        exam_id,
        lecturer_id,
        payload.questions.len()
    );

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": exam_id }))))
}

/// Lists the calling lecturer's exams, optionally scoped to a level.
/// Staff only.
pub async fn list_exams(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ExamListParams>,
) -> Result<impl IntoResponse, AppError> {
    let lecturer_id = claims.user_id()?;

    let exams = sqlx::query_as::<_, Exam>(
        r#"
        SELECT id, title, course, lecturer_id, level, duration_minutes,
               total_marks, is_active, created_at
        FROM exams
        WHERE lecturer_id = $1
          AND ($2::INT IS NULL OR level = $2)
        ORDER BY created_at DESC
        "#,
    )
    .bind(lecturer_id)
    .bind(params.level)
    .fetch_all(&pool)
    .await?;

    Ok(Json(exams))
}

/// Toggles an exam's active flag. Staff only, own exams only.
pub async fn set_active(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
    Json(payload): Json<SetActiveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let lecturer_id = claims.user_id()?;

    let result = sqlx::query("UPDATE exams SET is_active = $1 WHERE id = $2 AND lecturer_id = $3")
        .bind(payload.is_active)
        .bind(exam_id)
        .bind(lecturer_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes an exam and, via cascade, its questions and submissions.
/// Staff only, own exams only.
pub async fn delete_exam(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let lecturer_id = claims.user_id()?;

    let result = sqlx::query("DELETE FROM exams WHERE id = $1 AND lecturer_id = $2")
        .bind(exam_id)
        .bind(lecturer_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    tracing::info!("Exam {} deleted by lecturer {}", exam_id, lecturer_id);

    Ok(StatusCode::OK)
}

/// Lists active exams for the calling student's level that they have
/// not yet submitted. Student only.
pub async fn available_exams(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let exams = sqlx::query_as::<_, Exam>(
        r#"
        SELECT e.id, e.title, e.course, e.lecturer_id, e.level, e.duration_minutes,
               e.total_marks, e.is_active, e.created_at
        FROM exams e
        WHERE e.is_active
          AND e.level = (SELECT level FROM profiles WHERE id = $1)
          AND NOT EXISTS (
              SELECT 1 FROM submissions s
              WHERE s.exam_id = e.id AND s.student_id = $1
          )
        ORDER BY e.created_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(exams))
}
