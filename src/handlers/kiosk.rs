// src/handlers/kiosk.rs
//
// HTTP surface of the kiosk session core. Every route resolves the
// caller from the JWT claims first; an unauthenticated or malformed
// identity is a hard 401 before any session state is touched.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::{error::AppError, kiosk::SessionRegistry, utils::jwt::Claims};

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub exam_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct FullscreenRequest {
    pub granted: bool,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub question_id: Uuid,
    pub option: String,
}

/// Opens a kiosk sitting for an exam: loads the exam and questions,
/// shuffles each option list, and returns the paper without its
/// grading keys. Refused when the student has already submitted or is
/// already sitting this exam elsewhere.
pub async fn start(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let started = sessions.start(payload.exam_id, student_id).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

/// The student acknowledges the lockdown notice.
pub async fn acknowledge(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    sessions.acknowledge(session_id, student_id)?;
    Ok(StatusCode::OK)
}

/// Reports the outcome of the fullscreen request. Granted arms the
/// countdown and the watchdog; denied returns to the gate.
pub async fn fullscreen(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<FullscreenRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    sessions.fullscreen(session_id, student_id, payload.granted)?;
    Ok(StatusCode::OK)
}

/// Records an answer selection (last-write-wins per question).
pub async fn answer(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    sessions.select_answer(session_id, student_id, payload.question_id, &payload.option)?;
    Ok(StatusCode::OK)
}

/// Reports pointer/key activity; resets the watchdog deadlines.
pub async fn activity(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    sessions.activity(session_id, student_id)?;
    Ok(StatusCode::OK)
}

/// Acknowledges the presence warning modal.
pub async fn presence(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    sessions.confirm_presence(session_id, student_id)?;
    Ok(StatusCode::OK)
}

/// Explicit submission. Idempotent: a duplicate request while a prior
/// one is in flight or complete changes nothing.
pub async fn submit(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    match sessions.submit(session_id, student_id).await? {
        Some(outcome) => Ok(Json(json!({
            "score": outcome.score,
            "auto": outcome.auto,
            "message": "Exam submitted successfully.",
        }))),
        None => Ok(Json(json!({
            "message": "Submission already in flight or complete.",
        }))),
    }
}

/// Current session snapshot: phase, remaining seconds, urgency and
/// warning flags, and the final score once submitted.
pub async fn view(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let view = sessions.view(session_id, student_id)?;
    Ok(Json(view))
}

/// Leaves the kiosk. Clears the session so no stale tick can fire an
/// auto-submit afterward.
pub async fn abandon(
    State(sessions): State<Arc<SessionRegistry>>,
    Extension(claims): Extension<Claims>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    sessions.abandon(session_id, student_id)?;
    Ok(StatusCode::NO_CONTENT)
}
