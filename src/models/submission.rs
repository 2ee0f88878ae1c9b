// src/models/submission.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Represents the 'submissions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    pub score: f64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A student's own result row, joined with the exam it belongs to.
#[derive(Debug, Serialize, FromRow)]
pub struct MyResultRow {
    pub exam_id: Uuid,
    pub title: String,
    pub course: String,
    pub score: f64,
    pub total_marks: f64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A result row as seen by the owning lecturer, joined with the
/// student profile.
#[derive(Debug, Serialize, FromRow)]
pub struct ExamResultRow {
    pub full_name: String,
    pub index_number: Option<String>,
    pub score: f64,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Query parameters for the staff results listing and export.
#[derive(Debug, Deserialize)]
pub struct ResultsParams {
    pub exam_id: Uuid,
}
