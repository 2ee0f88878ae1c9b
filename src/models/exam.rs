// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::question::CreateQuestionRequest;

/// Represents the 'exams' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: Uuid,
    pub title: String,

    /// Course label, used in the exported results filename.
    pub course: String,

    pub lecturer_id: Uuid,

    /// Academic level the exam is scoped to (100/200/300/400).
    pub level: i32,

    pub duration_minutes: i32,
    pub total_marks: f64,
    pub is_active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for publishing a new exam together with its question list.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(length(min = 1, max = 200, message = "Exam title is required."))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "Course label is required."))]
    pub course: String,
    pub level: i32,
    #[validate(range(min = 1, max = 480, message = "Duration must be between 1 and 480 minutes."))]
    pub duration_minutes: i32,
    #[validate(range(min = 0.0, message = "Total marks must not be negative."))]
    pub total_marks: f64,
    #[validate(length(min = 1, message = "An exam needs at least one question."), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// DTO for toggling an exam's active flag.
#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

/// Query parameters for the staff exam listing.
#[derive(Debug, Deserialize)]
pub struct ExamListParams {
    pub level: Option<i32>,
}
