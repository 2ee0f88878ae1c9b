// src/kiosk/registry.rs

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    kiosk::{
        paper::{ExamPaper, PublicPaperQuestion},
        session::{ExamSession, Phase, SessionView, SubmitTrigger},
        store::KioskStore,
    },
};

/// Response for a freshly started sitting.
#[derive(Debug, Serialize)]
pub struct StartedSession {
    pub session_id: Uuid,
    pub exam_id: Uuid,
    pub title: String,
    pub duration_secs: u32,
    pub total_marks: f64,
    pub questions: Vec<PublicPaperQuestion>,
}

/// Outcome of a persisted submission.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SubmitOutcome {
    pub score: f64,
    pub auto: bool,
}

/// Hosts every in-progress sitting and coordinates submission against
/// the injected store. All session state lives behind one mutex which
/// is never held across an await, so timer ticks, client events and
/// the network insert interleave but never overlap: the session's
/// phase guard alone is enough to make submission single-fire.
pub struct SessionRegistry {
    store: Arc<dyn KioskStore>,
    sessions: Mutex<HashMap<Uuid, ExamSession>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<dyn KioskStore>) -> Self {
        Self {
            store,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, ExamSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn with_session<T>(
        &self,
        session_id: Uuid,
        student_id: Uuid,
        f: impl FnOnce(&mut ExamSession) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(&session_id)
            .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
        if session.student_id != student_id {
            return Err(AppError::Forbidden(
                "Session belongs to another student".to_string(),
            ));
        }
        f(session)
    }

    /// Opens a new sitting. Preconditions, in order: the exam exists
    /// and is active, the student's level matches, the student has no
    /// persisted submission for it, and no locked-down session for the
    /// same (student, exam) pair exists. The last check is what stops
    /// a second tab from producing a second scored submission; a
    /// session still at the gate is replaced, not defended.
    pub async fn start(&self, exam_id: Uuid, student_id: Uuid) -> Result<StartedSession, AppError> {
        let exam = self
            .store
            .fetch_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Exam not found".to_string()))?;

        if !exam.is_active {
            return Err(AppError::Forbidden("Exam is not active".to_string()));
        }

        let level = self.store.fetch_student_level(student_id).await?;
        if level != Some(exam.level) {
            return Err(AppError::Forbidden(
                "Exam is not available for your level".to_string(),
            ));
        }

        if self.store.has_submission(exam_id, student_id).await? {
            return Err(AppError::Conflict(
                "You have already submitted this exam".to_string(),
            ));
        }

        let questions = self.store.fetch_questions(exam_id).await?;
        if questions.is_empty() {
            return Err(AppError::NotFound(
                "No questions found for this exam".to_string(),
            ));
        }

        let paper = ExamPaper::assemble(&exam, questions, &mut rand::thread_rng())?;
        let session = ExamSession::new(exam_id, student_id, paper);

        let mut sessions = self.lock();
        // A sitting still at the gate holds no answers and no running
        // timer, so a fresh start simply replaces it (the old tab is
        // usually dead). Only a session that entered lockdown blocks.
        let mut stale_gate_session = None;
        for (id, s) in sessions.iter() {
            if s.exam_id != exam_id || s.student_id != student_id {
                continue;
            }
            match s.phase() {
                Phase::Idle | Phase::RequestingFullscreen => stale_gate_session = Some(*id),
                Phase::Submitted => {}
                _ => {
                    return Err(AppError::Conflict(
                        "This exam is already in progress in another session".to_string(),
                    ));
                }
            }
        }
        if let Some(id) = stale_gate_session {
            tracing::info!("Kiosk session {} replaced before lockdown", id);
            sessions.remove(&id);
        }

        let started = StartedSession {
            session_id: session.id,
            exam_id,
            title: session.paper().title.clone(),
            duration_secs: session.view().remaining_secs,
            total_marks: session.paper().total_marks,
            questions: session.paper().public_view(),
        };
        tracing::info!(
            "Kiosk session {} opened for exam {} by student {}",
            session.id,
            exam_id,
            student_id
        );
        sessions.insert(session.id, session);

        Ok(started)
    }

    pub fn acknowledge(&self, session_id: Uuid, student_id: Uuid) -> Result<(), AppError> {
        self.with_session(session_id, student_id, |s| s.acknowledge())
    }

    pub fn fullscreen(
        &self,
        session_id: Uuid,
        student_id: Uuid,
        granted: bool,
    ) -> Result<(), AppError> {
        self.with_session(session_id, student_id, |s| {
            if granted {
                s.fullscreen_granted()
            } else {
                s.fullscreen_denied()
            }
        })
    }

    pub fn select_answer(
        &self,
        session_id: Uuid,
        student_id: Uuid,
        question_id: Uuid,
        option: &str,
    ) -> Result<(), AppError> {
        self.with_session(session_id, student_id, |s| s.select(question_id, option))
    }

    pub fn activity(&self, session_id: Uuid, student_id: Uuid) -> Result<(), AppError> {
        self.with_session(session_id, student_id, |s| {
            s.input();
            Ok(())
        })
    }

    pub fn confirm_presence(&self, session_id: Uuid, student_id: Uuid) -> Result<(), AppError> {
        self.with_session(session_id, student_id, |s| {
            s.confirm_presence();
            Ok(())
        })
    }

    pub fn view(&self, session_id: Uuid, student_id: Uuid) -> Result<SessionView, AppError> {
        self.with_session(session_id, student_id, |s| Ok(s.view()))
    }

    /// Removes a sitting outright. This is the cleanup contract for
    /// navigating away from the kiosk: once removed, no stale tick can
    /// fire an auto-submit against it. Idempotent.
    pub fn abandon(&self, session_id: Uuid, student_id: Uuid) -> Result<(), AppError> {
        let mut sessions = self.lock();
        if let Some(session) = sessions.get(&session_id) {
            if session.student_id != student_id {
                return Err(AppError::Forbidden(
                    "Session belongs to another student".to_string(),
                ));
            }
            tracing::info!("Kiosk session {} abandoned", session_id);
            sessions.remove(&session_id);
        }
        Ok(())
    }

    /// Explicit, student-initiated submission.
    pub async fn submit(
        &self,
        session_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<SubmitOutcome>, AppError> {
        // Ownership and phase checks up front; finalize itself is
        // identity-blind.
        self.with_session(session_id, student_id, |s| {
            match s.phase() {
                Phase::Idle | Phase::RequestingFullscreen => Err(AppError::BadRequest(
                    "Session has not entered lockdown".to_string(),
                )),
                _ => Ok(()),
            }
        })?;
        self.finalize(session_id, false).await
    }

    /// Runs one submission attempt end to end. Acquires the session's
    /// single-fire guard and computes the score under the lock, then
    /// performs exactly one insert against the store. `Ok(None)` means
    /// another attempt was already in flight or complete (a no-op by
    /// contract). On a store failure the guard is released so the
    /// student can retry; the error is surfaced, never swallowed.
    async fn finalize(
        &self,
        session_id: Uuid,
        auto: bool,
    ) -> Result<Option<SubmitOutcome>, AppError> {
        let (exam_id, student_id, score) = {
            let mut sessions = self.lock();
            let session = sessions
                .get_mut(&session_id)
                .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;
            if !session.begin_submission() {
                return Ok(None);
            }
            (session.exam_id, session.student_id, session.score())
        };

        match self
            .store
            .insert_submission(exam_id, student_id, score)
            .await
        {
            Ok(()) => {
                let mut sessions = self.lock();
                if let Some(session) = sessions.get_mut(&session_id) {
                    session.complete(score, auto);
                }
                tracing::info!(
                    "Submission recorded for exam {} by student {} (score {}, auto: {})",
                    exam_id,
                    student_id,
                    score,
                    auto
                );
                Ok(Some(SubmitOutcome { score, auto }))
            }
            Err(e) => {
                let mut sessions = self.lock();
                if let Some(session) = sessions.get_mut(&session_id) {
                    session.submission_failed();
                }
                tracing::error!(
                    "Submission failed for exam {} by student {}: {}",
                    exam_id,
                    student_id,
                    e
                );
                Err(e)
            }
        }
    }

    /// Advances every sitting by one second, then finalizes whichever
    /// sessions had a deadline fire. Triggers are collected under the
    /// lock but the inserts run after it is released. A failed
    /// auto-submit leaves the session locked with its countdown at
    /// zero, so the next tick retries rather than dropping the
    /// student's answers.
    pub async fn tick_all(&self) {
        let fired: Vec<(Uuid, SubmitTrigger)> = {
            let mut sessions = self.lock();
            sessions.retain(|_, s| !s.is_expired());
            sessions
                .iter_mut()
                .filter_map(|(id, s)| s.tick().map(|trigger| (*id, trigger)))
                .collect()
        };

        for (session_id, trigger) in fired {
            match self.finalize(session_id, true).await {
                Ok(Some(outcome)) => {
                    tracing::info!(
                        "Auto-submitted session {} ({:?}, score {})",
                        session_id,
                        trigger,
                        outcome.score
                    );
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Auto-submit for session {} failed: {}", session_id, e);
                }
            }
        }
    }

    /// Number of live sittings, pruned or not.
    pub fn session_count(&self) -> usize {
        self.lock().len()
    }
}

/// One-second heartbeat driving every session's countdown and
/// watchdog. Spawned once at startup.
pub async fn run_ticker(registry: Arc<SessionRegistry>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    loop {
        interval.tick().await;
        registry.tick_all().await;
    }
}
