// src/kiosk/session.rs

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::{error::AppError, kiosk::paper::ExamPaper};

/// Idle seconds before the presence warning is raised.
pub const WARNING_IDLE_SECS: u32 = 4 * 60;
/// Idle seconds before the watchdog force-submits.
pub const HARD_IDLE_SECS: u32 = 5 * 60;
/// Remaining seconds under which the countdown is flagged urgent.
pub const URGENT_REMAINING_SECS: u32 = 5 * 60;
/// How long a submitted session lingers before the registry prunes it.
pub const SUBMITTED_LINGER_SECS: u32 = 60;
/// Seconds a session may wait at the lockdown gate before it counts as
/// orphaned. Without this, a browser that dies between `start` and
/// `fullscreen_granted` would leave an immortal session behind.
pub const GATE_GRACE_SECS: u32 = 10 * 60;

/// Session lifecycle. The only irreversible user action is entering
/// lockdown: once `Locked` there is no path back to `Idle` except
/// through submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    RequestingFullscreen,
    Locked,
    Warned,
    Submitting,
    Submitted,
}

/// Which of the two independent deadlines fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Timeout,
    Inactivity,
}

/// Snapshot of a session for the client.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub exam_id: Uuid,
    pub phase: Phase,
    pub remaining_secs: u32,
    pub urgent: bool,
    pub warned: bool,
    pub answered: usize,
    pub question_count: usize,
    pub score: Option<f64>,
    pub message: Option<String>,
}

/// One student's in-progress sitting: the shuffled paper, the answer
/// store, the countdown and the watchdog counters, all advanced by
/// events only. Time enters exclusively through `tick()`, so tests
/// drive the machine with synthetic seconds.
#[derive(Debug)]
pub struct ExamSession {
    pub id: Uuid,
    pub exam_id: Uuid,
    pub student_id: Uuid,
    paper: ExamPaper,
    /// question id -> selected option text. Mutated only by explicit
    /// selection, never by the timer or the watchdog.
    answers: HashMap<Uuid, String>,
    remaining_secs: u32,
    idle_secs: u32,
    phase: Phase,
    auto_submitted: bool,
    final_score: Option<f64>,
    submitted_for_secs: u32,
    /// Seconds spent at the gate (`Idle`/`RequestingFullscreen`).
    gate_secs: u32,
}

impl ExamSession {
    pub fn new(exam_id: Uuid, student_id: Uuid, paper: ExamPaper) -> Self {
        let remaining_secs = paper.duration_minutes.max(0) as u32 * 60;
        Self {
            id: Uuid::new_v4(),
            exam_id,
            student_id,
            paper,
            answers: HashMap::new(),
            remaining_secs,
            idle_secs: 0,
            phase: Phase::Idle,
            auto_submitted: false,
            final_score: None,
            submitted_for_secs: 0,
            gate_secs: 0,
        }
    }

    pub fn paper(&self) -> &ExamPaper {
        &self.paper
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The student acknowledges the lockdown notice.
    pub fn acknowledge(&mut self) -> Result<(), AppError> {
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::RequestingFullscreen;
                Ok(())
            }
            _ => Err(AppError::BadRequest(
                "Session has already been acknowledged".to_string(),
            )),
        }
    }

    /// Fullscreen was granted: enter lockdown. This is what arms both
    /// the countdown timer and the inactivity watchdog.
    pub fn fullscreen_granted(&mut self) -> Result<(), AppError> {
        match self.phase {
            Phase::RequestingFullscreen => {
                self.phase = Phase::Locked;
                self.idle_secs = 0;
                Ok(())
            }
            _ => Err(AppError::BadRequest(
                "Session is not waiting for fullscreen".to_string(),
            )),
        }
    }

    /// Fullscreen denied or unsupported: back to the gate, no timer
    /// started.
    pub fn fullscreen_denied(&mut self) -> Result<(), AppError> {
        match self.phase {
            Phase::RequestingFullscreen => {
                self.phase = Phase::Idle;
                Ok(())
            }
            _ => Err(AppError::BadRequest(
                "Session is not waiting for fullscreen".to_string(),
            )),
        }
    }

    fn in_lockdown(&self) -> bool {
        matches!(self.phase, Phase::Locked | Phase::Warned)
    }

    /// Records a selection, overwriting any prior one for the same
    /// question (last-write-wins). Selecting is user activity, so it
    /// also resets the watchdog.
    pub fn select(&mut self, question_id: Uuid, option: &str) -> Result<(), AppError> {
        if !self.in_lockdown() {
            return Err(AppError::BadRequest(
                "Session is not accepting answers".to_string(),
            ));
        }

        let question = self
            .paper
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| AppError::NotFound("Question is not on this paper".to_string()))?;

        if !question.options.iter().any(|o| o == option) {
            return Err(AppError::BadRequest(
                "Option is not part of this question".to_string(),
            ));
        }

        self.answers.insert(question_id, option.to_string());
        self.input();
        Ok(())
    }

    /// Pointer-move or key-press observed. Resets both watchdog
    /// deadlines and dismisses the warning if shown.
    pub fn input(&mut self) {
        if self.in_lockdown() {
            self.idle_secs = 0;
            if self.phase == Phase::Warned {
                self.phase = Phase::Locked;
            }
        }
    }

    /// The student acknowledged the presence warning modal.
    pub fn confirm_presence(&mut self) {
        self.input();
    }

    /// Advances the session clock by one second. Only ticks while in
    /// lockdown; returns the auto-submit trigger when either deadline
    /// fires. A session already submitting (or submitted) never fires.
    pub fn tick(&mut self) -> Option<SubmitTrigger> {
        match self.phase {
            Phase::Locked | Phase::Warned => {}
            Phase::Submitted => {
                self.submitted_for_secs += 1;
                return None;
            }
            Phase::Idle | Phase::RequestingFullscreen => {
                self.gate_secs += 1;
                return None;
            }
            Phase::Submitting => return None,
        }

        // With the counter at zero the previous tick exhausted the
        // allotted time; this tick fires.
        if self.remaining_secs == 0 {
            return Some(SubmitTrigger::Timeout);
        }
        self.remaining_secs -= 1;

        self.idle_secs += 1;
        if self.idle_secs >= HARD_IDLE_SECS {
            return Some(SubmitTrigger::Inactivity);
        }
        if self.idle_secs >= WARNING_IDLE_SECS && self.phase == Phase::Locked {
            self.phase = Phase::Warned;
        }

        None
    }

    /// The single-fire submission guard. Returns true exactly once per
    /// successful attempt: while a submission is in flight or complete
    /// every further call is a no-op.
    pub fn begin_submission(&mut self) -> bool {
        if self.in_lockdown() {
            self.phase = Phase::Submitting;
            true
        } else {
            false
        }
    }

    /// Persistence failed: release the guard so a retry is possible.
    pub fn submission_failed(&mut self) {
        if self.phase == Phase::Submitting {
            self.phase = Phase::Locked;
            self.idle_secs = 0;
        }
    }

    /// Persistence succeeded.
    pub fn complete(&mut self, score: f64, auto: bool) {
        if self.phase == Phase::Submitting {
            self.phase = Phase::Submitted;
            self.final_score = Some(score);
            self.auto_submitted = auto;
            self.submitted_for_secs = 0;
        }
    }

    /// True once the registry should prune this session: submitted and
    /// past its linger window, or orphaned at the gate past the grace
    /// period. Sessions in lockdown never expire here; their deadlines
    /// fire through `tick()` instead.
    pub fn is_expired(&self) -> bool {
        match self.phase {
            Phase::Submitted => self.submitted_for_secs >= SUBMITTED_LINGER_SECS,
            Phase::Idle | Phase::RequestingFullscreen => self.gate_secs >= GATE_GRACE_SECS,
            _ => false,
        }
    }

    /// Computes the score: marks of every question whose stored
    /// selection equals its retained correct text, rounded to two
    /// decimal places.
    pub fn score(&self) -> f64 {
        let total: f64 = self
            .paper
            .questions
            .iter()
            .filter(|q| {
                self.answers
                    .get(&q.id)
                    .is_some_and(|selected| q.is_correct(selected))
            })
            .map(|q| q.marks)
            .sum();
        (total * 100.0).round() / 100.0
    }

    pub fn view(&self) -> SessionView {
        let message = match (self.phase, self.auto_submitted) {
            (Phase::Submitted, true) => {
                Some("Time or inactivity limit reached. Your exam was submitted automatically.".to_string())
            }
            (Phase::Submitted, false) => Some("Exam submitted successfully.".to_string()),
            _ => None,
        };

        SessionView {
            session_id: self.id,
            exam_id: self.exam_id,
            phase: self.phase,
            remaining_secs: self.remaining_secs,
            urgent: self.remaining_secs < URGENT_REMAINING_SECS,
            warned: self.phase == Phase::Warned,
            answered: self.answers.len(),
            question_count: self.paper.questions.len(),
            score: self.final_score,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{exam::Exam, question::Question};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use sqlx::types::Json;

    fn exam(duration_minutes: i32) -> Exam {
        Exam {
            id: Uuid::new_v4(),
            title: "African History".to_string(),
            course: "HIS204".to_string(),
            lecturer_id: Uuid::new_v4(),
            level: 200,
            duration_minutes,
            total_marks: 25.0,
            is_active: true,
            created_at: None,
        }
    }

    fn question(exam_id: Uuid, correct: &str, marks: f64) -> Question {
        Question {
            id: Uuid::new_v4(),
            exam_id,
            question_text: "Pick the marked option".to_string(),
            options: Json(vec![
                correct.to_string(),
                "wrong-1".to_string(),
                "wrong-2".to_string(),
                "wrong-3".to_string(),
            ]),
            correct_index: 0,
            marks,
        }
    }

    fn locked_session(duration_minutes: i32, question_count: usize, marks: f64) -> ExamSession {
        let exam = exam(duration_minutes);
        let questions: Vec<Question> = (0..question_count)
            .map(|_| question(exam.id, "right", marks))
            .collect();
        let mut rng = StdRng::seed_from_u64(11);
        let paper = ExamPaper::assemble(&exam, questions, &mut rng).unwrap();
        let mut session = ExamSession::new(exam.id, Uuid::new_v4(), paper);
        session.acknowledge().unwrap();
        session.fullscreen_granted().unwrap();
        session
    }

    #[test]
    fn lockdown_gate_transitions() {
        let exam = exam(45);
        let mut rng = StdRng::seed_from_u64(1);
        let paper =
            ExamPaper::assemble(&exam, vec![question(exam.id, "right", 5.0)], &mut rng).unwrap();
        let mut session = ExamSession::new(exam.id, Uuid::new_v4(), paper);

        assert_eq!(session.phase(), Phase::Idle);
        // No timer before lockdown.
        assert_eq!(session.tick(), None);
        assert_eq!(session.view().remaining_secs, 45 * 60);

        session.acknowledge().unwrap();
        assert_eq!(session.phase(), Phase::RequestingFullscreen);
        assert!(session.acknowledge().is_err());

        // Denied fullscreen drops back to the gate, still no timer.
        session.fullscreen_denied().unwrap();
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(session.tick(), None);

        session.acknowledge().unwrap();
        session.fullscreen_granted().unwrap();
        assert_eq!(session.phase(), Phase::Locked);
        assert_eq!(session.tick(), None);
        assert_eq!(session.view().remaining_secs, 45 * 60 - 1);
    }

    #[test]
    fn unentered_sessions_expire_after_the_gate_grace_period() {
        let exam = exam(45);
        let mut rng = StdRng::seed_from_u64(3);
        let paper =
            ExamPaper::assemble(&exam, vec![question(exam.id, "right", 5.0)], &mut rng).unwrap();
        let mut session = ExamSession::new(exam.id, Uuid::new_v4(), paper);

        // The browser died at the gate: ticks pass, nothing fires, but
        // the session ages toward expiry instead of living forever.
        session.acknowledge().unwrap();
        for _ in 0..(GATE_GRACE_SECS - 1) {
            assert_eq!(session.tick(), None);
        }
        assert!(!session.is_expired());
        session.tick();
        assert!(session.is_expired());
        // The countdown never moved.
        assert_eq!(session.view().remaining_secs, 45 * 60);
    }

    #[test]
    fn locked_sessions_never_expire_through_the_gate_clock() {
        let mut session = locked_session(60, 1, 5.0);
        for _ in 0..GATE_GRACE_SECS {
            session.input();
            session.tick();
        }
        assert!(!session.is_expired());
    }

    #[test]
    fn countdown_fires_on_the_tick_after_exhaustion() {
        let mut session = locked_session(45, 1, 5.0);
        assert_eq!(session.view().remaining_secs, 2700);

        for i in 0..2700 {
            // Keep the watchdog quiet so only the countdown can fire.
            session.input();
            assert_eq!(session.tick(), None, "fired early at tick {}", i);
        }
        assert_eq!(session.view().remaining_secs, 0);

        session.input();
        assert_eq!(session.tick(), Some(SubmitTrigger::Timeout));

        // The coordinator's guard takes over: once submission begins,
        // later ticks must not fire again.
        assert!(session.begin_submission());
        assert_eq!(session.tick(), None);
        assert_eq!(session.tick(), None);
    }

    #[test]
    fn urgent_flag_under_five_minutes() {
        let mut session = locked_session(6, 1, 5.0);
        assert!(!session.view().urgent);
        for _ in 0..61 {
            session.input();
            session.tick();
        }
        assert!(session.view().urgent);
    }

    #[test]
    fn watchdog_warns_then_force_submits() {
        let mut session = locked_session(60, 1, 5.0);

        for _ in 0..WARNING_IDLE_SECS {
            assert_eq!(session.tick(), None);
        }
        assert_eq!(session.phase(), Phase::Warned);
        assert!(session.view().warned);

        // 4:59 idle: one second short of the hard deadline.
        for _ in 0..(HARD_IDLE_SECS - WARNING_IDLE_SECS - 1) {
            assert_eq!(session.tick(), None);
        }
        assert_eq!(session.tick(), Some(SubmitTrigger::Inactivity));
    }

    #[test]
    fn activity_after_warning_resets_both_deadlines() {
        let mut session = locked_session(60, 1, 5.0);

        for _ in 0..(WARNING_IDLE_SECS + 30) {
            session.tick();
        }
        assert_eq!(session.phase(), Phase::Warned);

        // A mouse move past the warning dismisses it and prevents the
        // hard deadline.
        session.input();
        assert_eq!(session.phase(), Phase::Locked);
        assert!(!session.view().warned);

        for _ in 0..(HARD_IDLE_SECS - 1) {
            assert_eq!(session.tick(), None);
        }
        assert_eq!(session.tick(), Some(SubmitTrigger::Inactivity));
    }

    #[test]
    fn confirming_presence_resets_the_watchdog() {
        let mut session = locked_session(60, 1, 5.0);

        for _ in 0..WARNING_IDLE_SECS {
            session.tick();
        }
        assert_eq!(session.phase(), Phase::Warned);

        session.confirm_presence();
        assert_eq!(session.phase(), Phase::Locked);
        for _ in 0..WARNING_IDLE_SECS {
            assert_eq!(session.tick(), None);
        }
        assert_eq!(session.phase(), Phase::Warned);
    }

    #[test]
    fn select_is_last_write_wins() {
        let mut session = locked_session(45, 3, 5.0);
        let (q0, q1) = {
            let qs = &session.paper().questions;
            (qs[0].id, qs[1].id)
        };

        session.select(q0, "wrong-1").unwrap();
        session.select(q0, "right").unwrap();
        session.select(q0, "wrong-2").unwrap();
        session.select(q1, "right").unwrap();

        assert_eq!(session.view().answered, 2);
        assert_eq!(session.answers.get(&q0).map(String::as_str), Some("wrong-2"));
        assert_eq!(session.answers.get(&q1).map(String::as_str), Some("right"));
    }

    #[test]
    fn select_rejects_unknown_question_and_foreign_option() {
        let mut session = locked_session(45, 1, 5.0);
        let q0 = session.paper().questions[0].id;

        assert!(session.select(Uuid::new_v4(), "right").is_err());
        assert!(session.select(q0, "not-an-option").is_err());
        assert!(session.select(q0, "right").is_ok());
    }

    #[test]
    fn score_sums_marks_for_matching_text_only() {
        // 4 questions at 6.25 marks, 3 answered correctly -> 18.75.
        let mut session = locked_session(45, 4, 6.25);
        let ids: Vec<Uuid> = session.paper().questions.iter().map(|q| q.id).collect();

        session.select(ids[0], "right").unwrap();
        session.select(ids[1], "right").unwrap();
        session.select(ids[2], "right").unwrap();
        session.select(ids[3], "wrong-1").unwrap();

        assert_eq!(session.score(), 18.75);
    }

    #[test]
    fn score_edge_cases() {
        // Every answer correct: sum of all marks.
        let mut session = locked_session(45, 4, 6.25);
        let ids: Vec<Uuid> = session.paper().questions.iter().map(|q| q.id).collect();
        for id in &ids {
            session.select(*id, "right").unwrap();
        }
        assert_eq!(session.score(), 25.0);

        // No answers at all.
        let session = locked_session(45, 4, 6.25);
        assert_eq!(session.score(), 0.0);

        // Everything answered, nothing correct.
        let mut session = locked_session(45, 4, 6.25);
        let ids: Vec<Uuid> = session.paper().questions.iter().map(|q| q.id).collect();
        for id in &ids {
            session.select(*id, "wrong-3").unwrap();
        }
        assert_eq!(session.score(), 0.0);
    }

    #[test]
    fn submission_guard_fires_once_and_releases_on_failure() {
        let mut session = locked_session(45, 1, 5.0);

        assert!(session.begin_submission());
        assert_eq!(session.phase(), Phase::Submitting);
        // Double-click: second attempt is a no-op.
        assert!(!session.begin_submission());

        // Persistence failure releases the guard for a retry.
        session.submission_failed();
        assert_eq!(session.phase(), Phase::Locked);
        assert!(session.begin_submission());

        session.complete(12.5, false);
        assert_eq!(session.phase(), Phase::Submitted);
        assert_eq!(session.view().score, Some(12.5));
        assert!(!session.begin_submission());
    }

    #[test]
    fn timer_and_watchdog_stop_once_submitting() {
        let mut session = locked_session(45, 1, 5.0);
        assert!(session.begin_submission());

        let before = session.view().remaining_secs;
        for _ in 0..10 {
            assert_eq!(session.tick(), None);
        }
        assert_eq!(session.view().remaining_secs, before);
    }

    #[test]
    fn distinct_messages_for_auto_and_manual_submission() {
        let mut auto = locked_session(45, 1, 5.0);
        auto.begin_submission();
        auto.complete(0.0, true);
        assert!(auto.view().message.unwrap().contains("automatically"));

        let mut manual = locked_session(45, 1, 5.0);
        manual.begin_submission();
        manual.complete(0.0, false);
        assert!(manual.view().message.unwrap().contains("successfully"));
    }
}
