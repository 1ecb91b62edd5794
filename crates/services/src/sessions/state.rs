use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use quiz_core::model::{QuizMode, ReviewQuestion, WrongAnswerRecord};
use quiz_core::{Clock, ClockTracker};

use super::events::{EventBus, QuizEvent, StateChange, SubscriptionId};

/// Mutable data model of a quiz session.
///
/// Pure storage plus change notification: setters notify subscribers with the
/// new value and stay silent when the value did not change. Only the engine
/// and the session coordinator mutate it.
#[derive(Debug)]
pub struct QuizState {
    current_index: usize,
    score: u32,
    answered: BTreeSet<usize>,
    wrong_answers: Vec<WrongAnswerRecord>,
    answer_revealed: bool,
    paused: bool,
    mode: QuizMode,
    show_answer_at_end: bool,
    review_questions: Vec<ReviewQuestion>,
    tracker: ClockTracker,
    session_file: Option<PathBuf>,
    original_session_date: Option<DateTime<Utc>>,
    bus: EventBus,
}

impl QuizState {
    #[must_use]
    pub fn new(mode: QuizMode, show_answer_at_end: bool, clock: Clock) -> Self {
        Self {
            current_index: 0,
            score: 0,
            answered: BTreeSet::new(),
            wrong_answers: Vec::new(),
            answer_revealed: false,
            paused: false,
            mode,
            show_answer_at_end,
            review_questions: Vec::new(),
            tracker: ClockTracker::new(clock),
            session_file: None,
            original_session_date: None,
            bus: EventBus::new(),
        }
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn answered_indices(&self) -> &BTreeSet<usize> {
        &self.answered
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.answered.len()
    }

    #[must_use]
    pub fn wrong_answers(&self) -> &[WrongAnswerRecord] {
        &self.wrong_answers
    }

    #[must_use]
    pub fn answer_revealed(&self) -> bool {
        self.answer_revealed
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    #[must_use]
    pub fn show_answer_at_end(&self) -> bool {
        self.show_answer_at_end
    }

    #[must_use]
    pub fn review_questions(&self) -> &[ReviewQuestion] {
        &self.review_questions
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.tracker.elapsed()
    }

    #[must_use]
    pub fn tracker(&self) -> &ClockTracker {
        &self.tracker
    }

    #[must_use]
    pub fn session_file(&self) -> Option<&Path> {
        self.session_file.as_deref()
    }

    #[must_use]
    pub fn original_session_date(&self) -> Option<DateTime<Utc>> {
        self.original_session_date
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&QuizEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.bus.subscribe(subscriber)
    }

    pub fn subscribe_channel(&mut self) -> (SubscriptionId, std::sync::mpsc::Receiver<QuizEvent>) {
        self.bus.subscribe_channel()
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    //
    // ─── MUTATION (crate-internal) ─────────────────────────────────────────────
    //

    pub(crate) fn emit(&mut self, event: QuizEvent) {
        self.bus.emit(&event);
    }

    fn changed(&mut self, change: StateChange) {
        self.bus.emit(&QuizEvent::State(change));
    }

    pub(crate) fn set_current_index(&mut self, index: usize) {
        if self.current_index != index {
            self.current_index = index;
            self.changed(StateChange::CurrentIndex(index));
        }
    }

    pub(crate) fn set_score(&mut self, score: u32) {
        if self.score != score {
            self.score = score;
            self.changed(StateChange::Score(score));
        }
    }

    /// Returns false if `index` was already answered.
    pub(crate) fn mark_answered(&mut self, index: usize) -> bool {
        if !self.answered.insert(index) {
            return false;
        }
        let snapshot = self.answered.clone();
        self.changed(StateChange::AnsweredIndices(snapshot));
        true
    }

    pub(crate) fn replace_answered(&mut self, answered: BTreeSet<usize>) {
        if self.answered != answered {
            self.answered = answered;
            let snapshot = self.answered.clone();
            self.changed(StateChange::AnsweredIndices(snapshot));
        }
    }

    pub(crate) fn push_wrong_answer(&mut self, record: WrongAnswerRecord) {
        self.wrong_answers.push(record);
        let snapshot = self.wrong_answers.clone();
        self.changed(StateChange::WrongAnswers(snapshot));
    }

    pub(crate) fn replace_wrong_answers(&mut self, records: Vec<WrongAnswerRecord>) {
        if self.wrong_answers != records {
            self.wrong_answers = records;
            let snapshot = self.wrong_answers.clone();
            self.changed(StateChange::WrongAnswers(snapshot));
        }
    }

    pub(crate) fn set_answer_revealed(&mut self, revealed: bool) {
        if self.answer_revealed != revealed {
            self.answer_revealed = revealed;
            self.changed(StateChange::AnswerRevealed(revealed));
        }
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        if self.paused != paused {
            self.paused = paused;
            self.changed(StateChange::Paused(paused));
        }
    }

    pub(crate) fn set_mode(&mut self, mode: QuizMode) {
        if self.mode != mode {
            self.mode = mode;
            self.changed(StateChange::Mode(mode));
        }
    }

    pub(crate) fn set_review_questions(&mut self, questions: Vec<ReviewQuestion>) {
        self.review_questions = questions;
    }

    pub(crate) fn tracker_mut(&mut self) -> &mut ClockTracker {
        &mut self.tracker
    }

    pub(crate) fn set_tracker(&mut self, tracker: ClockTracker) {
        self.tracker = tracker;
    }

    /// Record where the session lives on disk. The first assignment wins.
    pub(crate) fn assign_session_file(&mut self, path: PathBuf) {
        match &self.session_file {
            None => self.session_file = Some(path),
            Some(existing) if *existing != path => {
                tracing::warn!(
                    existing = %existing.display(),
                    offered = %path.display(),
                    "session file already assigned; keeping the original"
                );
            }
            Some(_) => {}
        }
    }

    /// Freeze the session's logical start time on first call and return it.
    pub(crate) fn session_date_or_freeze(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        *self.original_session_date.get_or_insert(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::{fixed_clock, fixed_now};

    fn state() -> (QuizState, std::sync::mpsc::Receiver<QuizEvent>) {
        let mut state = QuizState::new(QuizMode::Normal, false, fixed_clock());
        let (_, rx) = state.subscribe_channel();
        (state, rx)
    }

    #[test]
    fn setters_notify_only_on_change() {
        let (mut state, rx) = state();

        state.set_score(1);
        state.set_score(1);
        state.set_current_index(0);
        state.set_mode(QuizMode::Normal);
        state.set_answer_revealed(true);
        state.set_answer_revealed(true);

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                QuizEvent::State(StateChange::Score(1)),
                QuizEvent::State(StateChange::AnswerRevealed(true)),
            ]
        );
    }

    #[test]
    fn answered_indices_only_grow_once_per_index() {
        let (mut state, rx) = state();

        assert!(state.mark_answered(2));
        assert!(!state.mark_answered(2));
        assert!(state.mark_answered(0));

        assert_eq!(state.answered_indices().iter().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn session_identity_is_assigned_once() {
        let (mut state, _rx) = state();
        state.assign_session_file(PathBuf::from("a.json"));
        state.assign_session_file(PathBuf::from("b.json"));
        assert_eq!(state.session_file(), Some(Path::new("a.json")));

        let first = state.session_date_or_freeze(fixed_now());
        let later = state.session_date_or_freeze(fixed_now() + Duration::hours(2));
        assert_eq!(first, later);
    }
}
