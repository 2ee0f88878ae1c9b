// src/handlers/results.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        question::{Question, ReviewQuestion},
        submission::{ExamResultRow, MyResultRow, ResultsParams},
    },
    utils::jwt::Claims,
};

/// Lists the calling student's submissions with the exams they belong
/// to, newest first. Student only.
pub async fn my_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let rows = sqlx::query_as::<_, MyResultRow>(
        r#"
        SELECT e.id AS exam_id, e.title, e.course, s.score, e.total_marks, s.submitted_at
        FROM submissions s
        JOIN exams e ON s.exam_id = e.id
        WHERE s.student_id = $1
        ORDER BY s.submitted_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// Returns an exam's questions with their correct answers so a
/// student can review their paper. Only available once the student
/// has a submission for the exam. Student only.
pub async fn review(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let submitted = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS(SELECT 1 FROM submissions WHERE exam_id = $1 AND student_id = $2)",
    )
    .bind(exam_id)
    .bind(student_id)
    .fetch_one(&pool)
    .await?;

    if !submitted {
        return Err(AppError::Forbidden(
            "Submit this exam before reviewing it".to_string(),
        ));
    }

    let title = sqlx::query_scalar::<_, String>("SELECT title FROM exams WHERE id = $1")
        .bind(exam_id)
        .fetch_optional(&pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT id, exam_id, question_text, options, correct_index, marks
        FROM questions
        WHERE exam_id = $1
        ORDER BY id
        "#,
    )
    .bind(exam_id)
    .fetch_all(&pool)
    .await?;

    let questions: Vec<ReviewQuestion> = questions
        .into_iter()
        .map(|q| ReviewQuestion {
            id: q.id,
            question_text: q.question_text,
            options: q.options.0,
            correct_index: q.correct_index,
            marks: q.marks,
        })
        .collect();

    Ok(Json(serde_json::json!({
        "title": title,
        "questions": questions,
    })))
}

/// Fetches an exam owned by the calling lecturer, or 404.
async fn owned_exam(pool: &PgPool, exam_id: Uuid, lecturer_id: Uuid) -> Result<Exam, AppError> {
    sqlx::query_as::<_, Exam>(
        r#"
        SELECT id, title, course, lecturer_id, level, duration_minutes,
               total_marks, is_active, created_at
        FROM exams
        WHERE id = $1 AND lecturer_id = $2
        "#,
    )
    .bind(exam_id)
    .bind(lecturer_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))
}

/// Lists every submission for one of the calling lecturer's exams,
/// joined with the student profiles. Staff only.
pub async fn exam_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ResultsParams>,
) -> Result<impl IntoResponse, AppError> {
    let lecturer_id = claims.user_id()?;
    let exam = owned_exam(&pool, params.exam_id, lecturer_id).await?;

    let rows = sqlx::query_as::<_, ExamResultRow>(
        r#"
        SELECT p.full_name, p.index_number, s.score, s.submitted_at
        FROM submissions s
        JOIN profiles p ON s.student_id = p.id
        WHERE s.exam_id = $1
        ORDER BY s.submitted_at DESC
        "#,
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "exam": { "id": exam.id, "title": exam.title, "course": exam.course, "level": exam.level },
        "results": rows,
    })))
}

/// Exports an exam's results as CSV with header `Index Number,Score`,
/// one row per submission. The filename encodes course and level.
/// Staff only.
pub async fn export_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ResultsParams>,
) -> Result<impl IntoResponse, AppError> {
    let lecturer_id = claims.user_id()?;
    let exam = owned_exam(&pool, params.exam_id, lecturer_id).await?;

    let rows = sqlx::query_as::<_, ExamResultRow>(
        r#"
        SELECT p.full_name, p.index_number, s.score, s.submitted_at
        FROM submissions s
        JOIN profiles p ON s.student_id = p.id
        WHERE s.exam_id = $1
        ORDER BY p.index_number
        "#,
    )
    .bind(exam.id)
    .fetch_all(&pool)
    .await?;

    let csv = render_results_csv(&rows);
    let filename = export_filename(&exam.course, exam.level);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        csv,
    ))
}

fn render_results_csv(rows: &[ExamResultRow]) -> String {
    let mut out = String::from("Index Number,Score\n");
    for row in rows {
        out.push_str(row.index_number.as_deref().unwrap_or("N/A"));
        out.push(',');
        out.push_str(&row.score.to_string());
        out.push('\n');
    }
    out
}

fn export_filename(course: &str, level: i32) -> String {
    let course: String = course
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_L{}_Results.csv", course, level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_header_and_one_row_per_submission() {
        let rows = vec![
            ExamResultRow {
                full_name: "Ama Mensah".to_string(),
                index_number: Some("UDS/TCH/21/0001".to_string()),
                score: 18.75,
                submitted_at: None,
            },
            ExamResultRow {
                full_name: "Kofi Boateng".to_string(),
                index_number: None,
                score: 12.0,
                submitted_at: None,
            },
        ];

        let csv = render_results_csv(&rows);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Index Number,Score");
        assert_eq!(lines[1], "UDS/TCH/21/0001,18.75");
        assert_eq!(lines[2], "N/A,12");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn filename_encodes_course_and_level() {
        assert_eq!(export_filename("COM101", 100), "COM101_L100_Results.csv");
        assert_eq!(
            export_filename("Intro to ICT", 200),
            "Intro_to_ICT_L200_Results.csv"
        );
    }
}
