// src/kiosk/mod.rs
//
// The locked-down exam-taking core. A session is a small state
// machine fed by client events (acknowledge, fullscreen, answers,
// activity) and by a one-second ticker; the countdown timer and the
// inactivity watchdog are independent triggers racing toward a single
// submission.

pub mod paper;
pub mod registry;
pub mod session;
pub mod store;

pub use paper::{ExamPaper, PaperQuestion, PublicPaperQuestion};
pub use registry::{SessionRegistry, run_ticker};
pub use session::{ExamSession, Phase, SessionView, SubmitTrigger};
pub use store::{KioskStore, PgKioskStore};
