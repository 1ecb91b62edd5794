use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::sync::Arc;

use quiz_core::{Clock, ClockTracker};
use storage::{QuizModeData, SessionSnapshot, SessionStore, StoredSession, TimerData, WrongAnswerEntry};

use super::events::QuizEvent;
use super::state::QuizState;

/// Wall-clock time between two automatic saves of an active session.
pub const AUTO_SAVE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

/// What asked for an emergency save. All triggers share one save routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTrigger {
    /// SIGINT / SIGTERM / Ctrl+C.
    Signal,
    ProcessExit,
    WindowClosed,
    UserQuit,
}

/// Flags recorded in the snapshot's `timer_data` block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveFlags {
    pub auto_saved: bool,
    pub emergency: bool,
    pub completed: bool,
    pub quit_by_user: bool,
}

impl SaveFlags {
    #[must_use]
    pub fn auto() -> Self {
        Self {
            auto_saved: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn completed() -> Self {
        Self {
            completed: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn emergency(trigger: SaveTrigger) -> Self {
        Self {
            emergency: true,
            quit_by_user: trigger == SaveTrigger::UserQuit,
            ..Self::default()
        }
    }
}

/// Periodic and emergency persistence of a session.
///
/// Every save of one session upserts the same file: the path returned by the
/// first successful save is kept in the state and reused. Save failures are
/// logged and reported as `false`; they never propagate.
pub struct SessionCoordinator {
    store: Arc<dyn SessionStore>,
    clock: Clock,
    active: bool,
    last_saved_at: Option<DateTime<Utc>>,
    completed: bool,
    quit_by_user: bool,
}

impl SessionCoordinator {
    #[must_use]
    pub fn new(store: Arc<dyn SessionStore>, clock: Clock) -> Self {
        Self {
            store,
            clock,
            active: false,
            last_saved_at: None,
            completed: false,
            quit_by_user: false,
        }
    }

    /// Begin the auto-save schedule; the first auto-save is one interval from now.
    pub fn activate(&mut self) {
        self.active = true;
        self.last_saved_at = Some(self.clock.now());
    }

    /// Stop auto-saving. Explicit saves still work.
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Mutable access to the clock, so fixed clocks can be advanced in tests.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    #[must_use]
    pub fn auto_save_due(&self) -> bool {
        if !self.active {
            return false;
        }
        let interval = Duration::from_std(AUTO_SAVE_INTERVAL).unwrap_or_else(|_| Duration::seconds(30));
        match self.last_saved_at {
            Some(at) => self.clock.now() - at >= interval,
            None => true,
        }
    }

    /// Auto-save when the interval elapsed. Paused sessions are saved too.
    pub fn auto_save_if_due(
        &mut self,
        state: &mut QuizState,
        exam_title: &str,
        total_questions: usize,
    ) -> bool {
        if !self.auto_save_due() {
            return false;
        }
        self.save_snapshot(state, exam_title, total_questions, SaveFlags::auto())
    }

    /// Best-effort save on shutdown. Stops the clock first so repeated calls
    /// write identical content.
    pub fn emergency_save(
        &mut self,
        state: &mut QuizState,
        exam_title: &str,
        total_questions: usize,
        trigger: SaveTrigger,
    ) -> bool {
        state.tracker_mut().stop();
        tracing::info!(?trigger, "emergency save");
        self.save_snapshot(state, exam_title, total_questions, SaveFlags::emergency(trigger))
    }

    /// Write the session snapshot. Returns whether it reached the store.
    pub fn save_snapshot(
        &mut self,
        state: &mut QuizState,
        exam_title: &str,
        total_questions: usize,
        flags: SaveFlags,
    ) -> bool {
        self.completed |= flags.completed;
        self.quit_by_user |= flags.quit_by_user;

        let now = self.clock.now();
        let snapshot = self.snapshot(state, exam_title, total_questions, flags, now);
        let path = state.session_file().map(std::path::Path::to_path_buf);

        let ok = match self.store.save_session(&snapshot, path.as_deref()) {
            Ok(path) => {
                tracing::debug!(
                    path = %path.display(),
                    auto = flags.auto_saved,
                    emergency = flags.emergency,
                    "session saved"
                );
                state.assign_session_file(path);
                self.last_saved_at = Some(now);
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not save session");
                false
            }
        };
        state.emit(QuizEvent::SessionSaved { ok });
        ok
    }

    fn snapshot(
        &self,
        state: &mut QuizState,
        exam_title: &str,
        total_questions: usize,
        flags: SaveFlags,
        now: DateTime<Utc>,
    ) -> SessionSnapshot {
        let session_date = state.session_date_or_freeze(now);
        SessionSnapshot {
            session_date,
            exam_title: exam_title.to_owned(),
            total_questions: u32::try_from(total_questions).unwrap_or(u32::MAX),
            quiz_mode: QuizModeData {
                score: state.score(),
                total_answered: u32::try_from(state.answered_count()).unwrap_or(u32::MAX),
                wrong_answers: state
                    .wrong_answers()
                    .iter()
                    .map(WrongAnswerEntry::from_record)
                    .collect(),
            },
            timer_data: TimerData {
                elapsed_seconds: state.tracker().elapsed_seconds(),
                completed: self.completed,
                auto_saved: flags.auto_saved,
                emergency_saved: flags.emergency,
                quit_by_user: self.quit_by_user,
            },
        }
    }

    /// Load a stored snapshot into a fresh state.
    ///
    /// Answered questions are assumed to be the first `total_answered` of the
    /// deck, so the session continues linearly from there. A snapshot that
    /// already answered everything lands on the last question, revealed.
    pub fn restore_state(&self, state: &mut QuizState, total_questions: usize, stored: &StoredSession) {
        let snapshot = &stored.snapshot;
        let answered = usize::try_from(snapshot.quiz_mode.total_answered).unwrap_or(usize::MAX);
        let last = total_questions.saturating_sub(1);

        state.set_score(snapshot.quiz_mode.score);
        state.replace_wrong_answers(snapshot.wrong_answer_records());
        state.replace_answered((0..answered.min(total_questions)).collect::<BTreeSet<_>>());
        if answered >= total_questions {
            state.set_current_index(last);
            let revealed = !state.show_answer_at_end();
            state.set_answer_revealed(revealed);
        } else {
            state.set_current_index(answered);
            state.set_answer_revealed(false);
        }

        let seconds = i64::try_from(snapshot.timer_data.elapsed_seconds).unwrap_or(i64::MAX);
        let elapsed = Duration::try_seconds(seconds).unwrap_or_else(Duration::zero);
        let clock = state.tracker().clock();
        state.set_tracker(ClockTracker::with_elapsed(clock, elapsed));

        state.assign_session_file(stored.path.clone());
        state.session_date_or_freeze(snapshot.session_date);

        tracing::info!(
            path = %stored.path.display(),
            answered,
            score = snapshot.quiz_mode.score,
            "session resumed"
        );
    }
}
