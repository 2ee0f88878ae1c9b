// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use uuid::Uuid;
use validator::Validate;

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: Uuid,
    pub exam_id: Uuid,

    /// The prompt text shown to the student.
    pub question_text: String,

    /// List of options in their original (unshuffled) order.
    /// Stored as a JSON array in the database.
    pub options: Json<Vec<String>>,

    /// Index of the correct option within the *original* list. The
    /// kiosk resolves this to the option text before shuffling, so
    /// the displayed order never affects grading.
    pub correct_index: i32,

    /// Marks awarded for a correct answer.
    pub marks: f64,
}

/// DTO for a question as presented during review (answers included).
#[derive(Debug, Serialize)]
pub struct ReviewQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    pub marks: f64,
}

/// DTO for authoring a question as part of a new exam.
///
/// Duplicate option texts are rejected here: grading matches the
/// selected text against the correct text, so duplicates would make
/// grading ambiguous. This is an authoring-time rule, not a grading-
/// time one.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[validate(schema(function = validate_question))]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000, message = "Question text is required."))]
    pub question_text: String,
    pub options: Vec<String>,
    pub correct_index: i32,
    #[validate(range(min = 0.0, message = "Marks must not be negative."))]
    pub marks: f64,
}

fn validate_question(req: &CreateQuestionRequest) -> Result<(), validator::ValidationError> {
    if req.options.len() < 2 || req.options.len() > 6 {
        return Err(validator::ValidationError::new("option_count_out_of_range"));
    }
    for opt in &req.options {
        if opt.trim().is_empty() {
            return Err(validator::ValidationError::new("option_cannot_be_empty"));
        }
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    for (i, opt) in req.options.iter().enumerate() {
        if req.options[..i].contains(opt) {
            return Err(validator::ValidationError::new("duplicate_option_text"));
        }
    }
    if req.correct_index < 0 || req.correct_index as usize >= req.options.len() {
        return Err(validator::ValidationError::new("correct_index_out_of_range"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(options: Vec<&str>, correct_index: i32) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question_text: "Which year?".to_string(),
            options: options.into_iter().map(String::from).collect(),
            correct_index,
            marks: 6.25,
        }
    }

    #[test]
    fn accepts_four_distinct_options() {
        assert!(request(vec!["1957", "1960", "1966", "1979"], 0).validate().is_ok());
    }

    #[test]
    fn rejects_duplicate_option_texts() {
        assert!(request(vec!["1957", "1960", "1957", "1979"], 0).validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_correct_index() {
        assert!(request(vec!["1957", "1960", "1966", "1979"], 4).validate().is_err());
        assert!(request(vec!["1957", "1960", "1966", "1979"], -1).validate().is_err());
    }

    #[test]
    fn rejects_blank_options() {
        assert!(request(vec!["1957", " ", "1966", "1979"], 0).validate().is_err());
    }
}
