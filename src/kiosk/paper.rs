// src/kiosk/paper.rs

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{exam::Exam, question::Question},
};

/// One question as it appears on a generated paper: options already
/// shuffled, with the correct option retained by *text*. Shuffling can
/// therefore never desynchronize grading.
#[derive(Debug, Clone)]
pub struct PaperQuestion {
    pub id: Uuid,
    pub question_text: String,
    /// Options in display order.
    pub options: Vec<String>,
    /// The grading key: the text that sat at `correct_index` before
    /// the shuffle. Never serialized toward the student.
    correct_text: String,
    pub marks: f64,
}

impl PaperQuestion {
    pub fn is_correct(&self, selected: &str) -> bool {
        selected == self.correct_text
    }

    pub fn correct_text(&self) -> &str {
        &self.correct_text
    }
}

/// A fully materialized, shuffled paper for one sitting. Assembling a
/// fresh paper re-shuffles; a paper is never restartable.
#[derive(Debug, Clone)]
pub struct ExamPaper {
    pub exam_id: Uuid,
    pub title: String,
    pub duration_minutes: i32,
    pub total_marks: f64,
    pub questions: Vec<PaperQuestion>,
}

/// Question view sent to the student: no grading key, no marks.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPaperQuestion {
    pub id: Uuid,
    pub question_text: String,
    pub options: Vec<String>,
}

impl ExamPaper {
    /// Builds a paper from an exam and its question rows. Each
    /// question's option list is independently permuted with an
    /// unbiased Fisher-Yates shuffle; the previously-correct option
    /// text is retained as the grading key first.
    ///
    /// Questions with an empty option list or an out-of-range correct
    /// index are exam data errors and fail the whole load.
    pub fn assemble<R: Rng>(
        exam: &Exam,
        questions: Vec<Question>,
        rng: &mut R,
    ) -> Result<Self, AppError> {
        let mut paper_questions = Vec::with_capacity(questions.len());

        for q in questions {
            let mut options = q.options.0;
            if options.is_empty() {
                return Err(AppError::InternalServerError(format!(
                    "Question {} has no options",
                    q.id
                )));
            }

            let correct_text = options
                .get(usize::try_from(q.correct_index).unwrap_or(usize::MAX))
                .cloned()
                .ok_or_else(|| {
                    AppError::InternalServerError(format!(
                        "Question {} has an out-of-range correct index",
                        q.id
                    ))
                })?;

            options.shuffle(rng);

            // Absent or invalid marks count for nothing rather than
            // poisoning the total.
            let marks = if q.marks.is_finite() && q.marks > 0.0 {
                q.marks
            } else {
                0.0
            };

            paper_questions.push(PaperQuestion {
                id: q.id,
                question_text: q.question_text,
                options,
                correct_text,
                marks,
            });
        }

        Ok(Self {
            exam_id: exam.id,
            title: exam.title.clone(),
            duration_minutes: exam.duration_minutes,
            total_marks: exam.total_marks,
            questions: paper_questions,
        })
    }

    pub fn public_view(&self) -> Vec<PublicPaperQuestion> {
        self.questions
            .iter()
            .map(|q| PublicPaperQuestion {
                id: q.id,
                question_text: q.question_text.clone(),
                options: q.options.clone(),
            })
            .collect()
    }
}
