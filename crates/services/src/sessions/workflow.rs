use chrono::Duration;
use std::path::Path;

use quiz_core::model::{ExamDefinition, OptionKey, QuizMode};
use quiz_core::{Clock, format_elapsed};
use storage::{ResultPaths, Storage, load_exam};

use super::coordinator::{SaveFlags, SaveTrigger, SessionCoordinator};
use super::engine::{BlockReason, NavOutcome, QuizEngine, ValidationOutcome};
use super::events::{QuizEvent, SubscriptionId};
use super::history::SessionHistory;
use super::plan::DeckBuilder;
use super::progress::SessionProgress;
use super::results::{QuizResults, ResultsReporter};
use crate::error::SessionError;

/// Options chosen when a session is created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub practice: bool,
    pub shuffle: bool,
    pub show_answer_at_end: bool,
}

impl SessionOptions {
    #[must_use]
    pub fn with_practice(mut self, practice: bool) -> Self {
        self.practice = practice;
        self
    }

    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    #[must_use]
    pub fn with_show_answer_at_end(mut self, show: bool) -> Self {
        self.show_answer_at_end = show;
        self
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        if self.practice {
            QuizMode::Practice
        } else {
            QuizMode::Normal
        }
    }
}

/// One quiz session: engine, persistence and result reporting wired together.
///
/// The host forwards user intents and timer ticks, and tears the session down
/// through [`Self::quit`], [`Self::close_window`] or [`Self::on_signal`].
/// Dropping a session that was not torn down performs the final save.
pub struct QuizSession {
    engine: QuizEngine,
    coordinator: SessionCoordinator,
    reporter: ResultsReporter,
    clock: Clock,
    last_result_paths: Option<ResultPaths>,
    closed: bool,
}

impl QuizSession {
    /// Create a fresh session over `exam`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Exam` if the deck cannot be built.
    pub fn start(
        exam: ExamDefinition,
        options: SessionOptions,
        storage: &Storage,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        Self::build(exam, None, options, storage, clock)
    }

    /// Load the exam at `exam_path` and create a fresh session over it.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ExamUnavailable` when the exam cannot be read or parsed.
    pub fn open(
        exam_path: &Path,
        options: SessionOptions,
        storage: &Storage,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let exam = load_exam_at(exam_path)?;
        Self::build(exam, Some(exam_path), options, storage, clock)
    }

    /// Continue a stored session over `exam`.
    ///
    /// Resuming always walks the exam in its authored order, so `shuffle` is
    /// ignored. Later saves overwrite `session_path` and keep its session date.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the snapshot cannot be loaded.
    pub fn resume(
        exam: ExamDefinition,
        session_path: &Path,
        options: SessionOptions,
        storage: &Storage,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        Self::resume_with(exam, None, session_path, options, storage, clock)
    }

    /// Like [`Self::resume`], loading the exam from `exam_path` first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ExamUnavailable` or `SessionError::Storage`.
    pub fn resume_from(
        exam_path: &Path,
        session_path: &Path,
        options: SessionOptions,
        storage: &Storage,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let exam = load_exam_at(exam_path)?;
        Self::resume_with(exam, Some(exam_path), session_path, options, storage, clock)
    }

    fn resume_with(
        exam: ExamDefinition,
        exam_path: Option<&Path>,
        session_path: &Path,
        options: SessionOptions,
        storage: &Storage,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let stored = SessionHistory::new(storage).load_session(session_path)?;
        let mut session = Self::build(exam, exam_path, options.with_shuffle(false), storage, clock)?;

        let total = session.engine.active_exam().len();
        session
            .coordinator
            .restore_state(session.engine.state_mut(), total, &stored);
        session.engine.mark_resumed();
        Ok(session)
    }

    fn build(
        exam: ExamDefinition,
        exam_path: Option<&Path>,
        options: SessionOptions,
        storage: &Storage,
        clock: Clock,
    ) -> Result<Self, SessionError> {
        let decks = DeckBuilder::new(exam).with_shuffle(options.shuffle).build()?;
        let engine = QuizEngine::new(decks, options.mode(), options.show_answer_at_end, clock);
        let reporter = ResultsReporter::new(storage.results.clone())
            .with_shuffle_enabled(options.shuffle)
            .with_exam_file_path(exam_path.map(|p| p.display().to_string()));
        tracing::info!(
            title = engine.active_exam().title(),
            questions = engine.active_exam().len(),
            mode = %options.mode(),
            "session created"
        );
        Ok(Self {
            engine,
            coordinator: SessionCoordinator::new(storage.sessions.clone(), clock),
            reporter,
            clock,
            last_result_paths: None,
            closed: false,
        })
    }

    /// Start the clock and the auto-save schedule, and show the current question.
    pub fn begin(&mut self) {
        self.coordinator.activate();
        self.engine.start();
    }

    #[must_use]
    pub fn engine(&self) -> &QuizEngine {
        &self.engine
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&QuizEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.engine.subscribe(subscriber)
    }

    pub fn subscribe_channel(&mut self) -> (SubscriptionId, std::sync::mpsc::Receiver<QuizEvent>) {
        self.engine.subscribe_channel()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.engine.state().elapsed()
    }

    #[must_use]
    pub fn elapsed_text(&self) -> String {
        format_elapsed(self.elapsed())
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress::new(
            self.engine.total_questions(),
            self.engine.state().answered_count(),
            self.engine.is_finished(),
        )
    }

    #[must_use]
    pub fn last_result_paths(&self) -> Option<&ResultPaths> {
        self.last_result_paths.as_ref()
    }

    //
    // ─── INTENTS ───────────────────────────────────────────────────────────────
    //

    /// # Errors
    ///
    /// See [`QuizEngine::select_option`].
    pub fn select_option(&mut self, key: &OptionKey, checked: bool) -> Result<(), BlockReason> {
        self.engine.select_option(key, checked)
    }

    pub fn show_answer(&mut self) -> ValidationOutcome {
        self.engine.validate()
    }

    /// Advance. On completion the result artifact is written and the session
    /// saved as completed, both best-effort.
    pub fn next(&mut self) -> NavOutcome {
        let outcome = self.engine.next();
        if let NavOutcome::Completed(results) = &outcome {
            self.record_completion(results);
        }
        outcome
    }

    pub fn previous(&mut self) -> NavOutcome {
        self.engine.previous()
    }

    pub fn jump_to(&mut self, index: usize) -> NavOutcome {
        self.engine.jump_to(index)
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.engine.toggle_pause()
    }

    /// # Errors
    ///
    /// See [`QuizEngine::enter_review`].
    pub fn enter_review(&mut self) -> Result<(), BlockReason> {
        self.engine.enter_review()
    }

    /// # Errors
    ///
    /// See [`QuizEngine::enter_study`].
    pub fn enter_study(&mut self) -> Result<(), BlockReason> {
        self.engine.enter_study()
    }

    /// Periodic callback; auto-saves once the interval elapsed. Returns true
    /// when a save happened.
    pub fn tick(&mut self) -> bool {
        if self.closed {
            return false;
        }
        let (title, total) = self.pass_identity();
        self.coordinator
            .auto_save_if_due(self.engine.state_mut(), &title, total)
    }

    /// Save now without marking the session as auto-saved or interrupted.
    pub fn save_now(&mut self) -> bool {
        let (title, total) = self.pass_identity();
        self.coordinator
            .save_snapshot(self.engine.state_mut(), &title, total, SaveFlags::default())
    }

    /// Explicit quit action.
    pub fn quit(&mut self) -> bool {
        self.teardown(SaveTrigger::UserQuit)
    }

    pub fn close_window(&mut self) -> bool {
        self.teardown(SaveTrigger::WindowClosed)
    }

    pub fn on_signal(&mut self) -> bool {
        self.teardown(SaveTrigger::Signal)
    }

    /// Final save. Safe to call repeatedly; each call writes the same snapshot.
    pub fn teardown(&mut self, trigger: SaveTrigger) -> bool {
        let (title, total) = self.pass_identity();
        let ok = self
            .coordinator
            .emergency_save(self.engine.state_mut(), &title, total, trigger);
        self.coordinator.deactivate();
        self.closed = true;
        ok
    }

    fn pass_identity(&self) -> (String, usize) {
        let exam = self.engine.active_exam();
        (exam.title().to_owned(), exam.len())
    }

    fn record_completion(&mut self, results: &QuizResults) {
        let completed_at = self.clock.now();
        self.last_result_paths = self.reporter.write_artifact(results, completed_at);
        let (title, total) = self.pass_identity();
        self.coordinator
            .save_snapshot(self.engine.state_mut(), &title, total, SaveFlags::completed());
    }
}

impl Drop for QuizSession {
    fn drop(&mut self) {
        if !self.closed {
            self.teardown(SaveTrigger::ProcessExit);
        }
    }
}

fn load_exam_at(path: &Path) -> Result<ExamDefinition, SessionError> {
    load_exam(path).map_err(|source| {
        tracing::error!(path = %path.display(), error = %source, "exam unavailable");
        SessionError::ExamUnavailable {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_clock;
    use storage::{InMemoryStore, ResultStore, SessionStore};

    const EXAM: &str = r#"{
        "title": "Geography",
        "questions": [
            {"id": 1, "question": "Capital of France?", "options": {"A": "Paris", "B": "Rome"}, "answer": "A"},
            {"id": 2, "question": "Capital of Italy?", "options": {"A": "Paris", "B": "Rome"}, "answer": "B"},
            {"id": 3, "question": "Capital of Norway?", "options": {"A": "Oslo", "B": "Bern"}, "answer": "A"}
        ]
    }"#;

    fn exam() -> ExamDefinition {
        storage::parse_exam(EXAM).unwrap()
    }

    fn answer(session: &mut QuizSession, key: &str) {
        session.select_option(&OptionKey::new(key), true).unwrap();
        assert!(matches!(session.show_answer(), ValidationOutcome::Validated { .. }));
    }

    #[test]
    fn completion_writes_artifact_and_completed_snapshot() {
        let store = InMemoryStore::new();
        let storage = Storage::from_memory(&store);
        let mut session =
            QuizSession::start(exam(), SessionOptions::default(), &storage, fixed_clock()).unwrap();
        session.begin();

        for key in ["A", "A", "A"] {
            answer(&mut session, key);
            session.next();
        }

        let paths = session.last_result_paths().cloned().unwrap();
        let artifact = store.list_results().unwrap().remove(0).artifact;
        assert_eq!(artifact.performance.score, 2);
        assert_eq!(artifact.detailed_results.incorrect_question_ids.len(), 1);
        assert!(store.raw_result(&paths.summary).unwrap().contains("Score: 2/3"));

        let stored = store.list_sessions().unwrap().remove(0);
        assert!(stored.snapshot.timer_data.completed);
        assert_eq!(session.progress().remaining, 0);
    }

    #[test]
    fn drop_performs_the_final_save_once() {
        let store = InMemoryStore::new();
        let storage = Storage::from_memory(&store);
        {
            let mut session =
                QuizSession::start(exam(), SessionOptions::default(), &storage, fixed_clock())
                    .unwrap();
            session.begin();
            answer(&mut session, "A");
        }

        let stored = store.list_sessions().unwrap();
        assert_eq!(stored.len(), 1);
        assert!(stored[0].snapshot.timer_data.emergency_saved);
        assert!(!stored[0].snapshot.timer_data.quit_by_user);
        assert_eq!(stored[0].snapshot.quiz_mode.total_answered, 1);
    }

    #[test]
    fn every_shutdown_trigger_converges_on_one_file() {
        let store = InMemoryStore::new();
        let storage = Storage::from_memory(&store);
        let mut session =
            QuizSession::start(exam(), SessionOptions::default(), &storage, fixed_clock()).unwrap();
        session.begin();
        answer(&mut session, "B");

        assert!(session.quit());
        let path = store.session_paths().remove(0);
        let after_quit = store.raw_session(&path).unwrap();
        assert!(session.close_window());
        assert!(session.on_signal());
        drop(session);

        assert_eq!(store.session_paths(), vec![path.clone()]);
        let snapshot = store.load_session(&path).unwrap();
        assert!(snapshot.timer_data.quit_by_user);
        assert_eq!(store.raw_session(&path).unwrap(), after_quit);
    }

    #[test]
    fn resume_continues_where_the_snapshot_left_off() {
        let store = InMemoryStore::new();
        let storage = Storage::from_memory(&store);
        let path = {
            let mut session =
                QuizSession::start(exam(), SessionOptions::default(), &storage, fixed_clock())
                    .unwrap();
            session.begin();
            answer(&mut session, "B");
            session.next();
            session.quit();
            store.session_paths().remove(0)
        };

        let options = SessionOptions::default().with_shuffle(true);
        let mut resumed =
            QuizSession::resume(exam(), &path, options, &storage, fixed_clock()).unwrap();
        resumed.begin();

        assert_eq!(resumed.engine().state().current_index(), 1);
        assert_eq!(resumed.engine().state().wrong_answers().len(), 1);
        assert_eq!(resumed.engine().decks().working(), resumed.engine().decks().original());

        answer(&mut resumed, "B");
        resumed.quit();
        assert_eq!(store.session_paths(), vec![path.clone()]);
        assert_eq!(store.load_session(&path).unwrap().quiz_mode.total_answered, 2);
        assert_eq!(resumed.enter_review(), Ok(()));
    }

    #[test]
    fn missing_exam_is_fatal_to_starting() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::in_memory();
        let err = QuizSession::open(
            &dir.path().join("missing.json"),
            SessionOptions::default(),
            &storage,
            fixed_clock(),
        )
        .err()
        .unwrap();
        assert!(matches!(err, SessionError::ExamUnavailable { .. }));
    }
}
