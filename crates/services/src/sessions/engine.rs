use std::collections::BTreeMap;
use std::fmt;

use quiz_core::Clock;
use quiz_core::model::{
    ExamDecks, ExamDefinition, OptionKey, QuestionRecord, QuizMode, ReviewQuestion,
    WrongAnswerRecord,
};

use super::events::{FeedbackStyle, QuizEvent, SubscriptionId, ValidationFeedback};
use super::results::QuizResults;
use super::review::{reconstruct_all_answered, reconstruct_review, study_deck};
use super::state::QuizState;

//
// ─── OUTCOMES ──────────────────────────────────────────────────────────────────
//

/// Why a user intent did not apply. The engine state is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// The current answer has not been validated yet.
    NotRevealed,
    NoSelection,
    Paused,
    AlreadyAnswered,
    UnknownOption,
    OutOfRange,
    WrongMode,
    AtStart,
    AtEnd,
    /// The pass already completed.
    PassComplete,
    /// Review needs a completed pass, a resumed session or practice mode.
    PassNotComplete,
    NothingToReview,
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            BlockReason::NotRevealed => "show the answer before moving on",
            BlockReason::NoSelection => "select an answer first",
            BlockReason::Paused => "the quiz is paused",
            BlockReason::AlreadyAnswered => "this question was already answered",
            BlockReason::UnknownOption => "no such option",
            BlockReason::OutOfRange => "no question at that position",
            BlockReason::WrongMode => "not available in this mode",
            BlockReason::AtStart => "already at the first question",
            BlockReason::AtEnd => "already at the last question",
            BlockReason::PassComplete => "the quiz is already complete",
            BlockReason::PassNotComplete => "finish the quiz before reviewing",
            BlockReason::NothingToReview => "there are no questions to review",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NavOutcome {
    Moved,
    /// The last question was passed and the results are final.
    Completed(QuizResults),
    /// The end of the review deck was reached; study mode may be offered.
    ReviewEnded,
    Blocked(BlockReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Validated { is_correct: bool },
    Blocked(BlockReason),
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// The mode state machine: navigation, answer validation and review/study
/// reconstruction over a [`QuizState`].
///
/// All intents are synchronous. Refused intents come back as
/// `Blocked(reason)` and leave the state untouched.
#[derive(Debug)]
pub struct QuizEngine {
    decks: ExamDecks,
    /// Deck of the current pass: the working exam, or a study deck.
    active: ExamDefinition,
    /// Original index of each question of `active`.
    active_sources: Vec<usize>,
    state: QuizState,
    selected: Vec<OptionKey>,
    /// Keys validated per index of the current pass.
    recorded: BTreeMap<usize, Vec<OptionKey>>,
    finished: bool,
    review_unlocked: bool,
}

impl QuizEngine {
    /// A fresh engine positioned on the first question. `Review` and `Study`
    /// are not valid starting modes and fall back to `Normal`.
    #[must_use]
    pub fn new(decks: ExamDecks, mode: QuizMode, show_answer_at_end: bool, clock: Clock) -> Self {
        let mode = match mode {
            QuizMode::Practice => QuizMode::Practice,
            _ => QuizMode::Normal,
        };
        let active = decks.working().clone();
        let active_sources = decks.order().to_vec();
        Self {
            decks,
            active,
            active_sources,
            state: QuizState::new(mode, show_answer_at_end, clock),
            selected: Vec::new(),
            recorded: BTreeMap::new(),
            finished: false,
            review_unlocked: false,
        }
    }

    #[must_use]
    pub fn state(&self) -> &QuizState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut QuizState {
        &mut self.state
    }

    #[must_use]
    pub fn decks(&self) -> &ExamDecks {
        &self.decks
    }

    /// Deck of the current pass.
    #[must_use]
    pub fn active_exam(&self) -> &ExamDefinition {
        &self.active
    }

    #[must_use]
    pub fn selected(&self) -> &[OptionKey] {
        &self.selected
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn subscribe(
        &mut self,
        subscriber: impl FnMut(&QuizEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.state.subscribe(subscriber)
    }

    pub fn subscribe_channel(&mut self) -> (SubscriptionId, std::sync::mpsc::Receiver<QuizEvent>) {
        self.state.subscribe_channel()
    }

    /// Number of questions walked in the current mode.
    #[must_use]
    pub fn total_questions(&self) -> usize {
        match self.state.mode() {
            QuizMode::Review => self.state.review_questions().len(),
            _ => self.active.len(),
        }
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&QuestionRecord> {
        let index = self.state.current_index();
        match self.state.mode() {
            QuizMode::Review => self.state.review_questions().get(index).map(|r| &r.question),
            _ => self.active.question(index),
        }
    }

    /// Start timing and show the current question.
    pub fn start(&mut self) {
        if !self.state.is_paused() && !self.finished {
            self.state.tracker_mut().start();
        }
        self.display();
    }

    /// Bookkeeping after a snapshot was loaded into the state.
    pub(crate) fn mark_resumed(&mut self) {
        if self.state.answered_count() > 0 {
            self.review_unlocked = true;
        }
        if !self.score_accounts_for_answers() {
            tracing::warn!(
                score = self.state.score(),
                wrong = self.state.wrong_answers().len(),
                answered = self.state.answered_count(),
                "resumed session does not balance score against answered questions"
            );
        }
        self.selected.clear();
    }

    /// `score + wrong answers == answered`, for modes that keep score.
    #[must_use]
    pub fn score_accounts_for_answers(&self) -> bool {
        let state = &self.state;
        !state.mode().keeps_score_invariant()
            || state.score() as usize + state.wrong_answers().len() == state.answered_count()
    }

    //
    // ─── SELECTION & VALIDATION ────────────────────────────────────────────────
    //

    /// Check or uncheck an option of the current question.
    ///
    /// Single-choice replaces the selection, multi-choice toggles membership.
    ///
    /// # Errors
    ///
    /// Returns the reason when the current question cannot take a selection.
    pub fn select_option(&mut self, key: &OptionKey, checked: bool) -> Result<(), BlockReason> {
        if self.state.mode() == QuizMode::Review {
            return Err(BlockReason::WrongMode);
        }
        if self.state.is_paused() {
            return Err(BlockReason::Paused);
        }
        if self.state.answered_indices().contains(&self.state.current_index()) {
            return Err(BlockReason::AlreadyAnswered);
        }
        let question = self.current_question().ok_or(BlockReason::OutOfRange)?;
        if !question.options().contains(key) {
            return Err(BlockReason::UnknownOption);
        }
        let multi = question.kind().is_multi();

        if multi {
            let present = self.selected.contains(key);
            if checked && !present {
                self.selected.push(key.clone());
            } else if !checked && present {
                self.selected.retain(|k| k != key);
            }
        } else {
            self.selected = if checked { vec![key.clone()] } else { Vec::new() };
        }

        let description = describe_selection(&self.selected, multi);
        self.state.emit(QuizEvent::OptionSelected { description, multi });
        Ok(())
    }

    /// Validate the current selection ("show answer").
    pub fn validate(&mut self) -> ValidationOutcome {
        if self.state.mode() == QuizMode::Review {
            return ValidationOutcome::Blocked(BlockReason::WrongMode);
        }
        if self.finished {
            return ValidationOutcome::Blocked(BlockReason::PassComplete);
        }
        if self.state.is_paused() {
            return ValidationOutcome::Blocked(BlockReason::Paused);
        }
        let index = self.state.current_index();
        if self.state.answered_indices().contains(&index) {
            return ValidationOutcome::Blocked(BlockReason::AlreadyAnswered);
        }
        if self.selected.is_empty() {
            return ValidationOutcome::Blocked(BlockReason::NoSelection);
        }
        let Some(question) = self.active.question(index) else {
            return ValidationOutcome::Blocked(BlockReason::OutOfRange);
        };

        let selected = self.selected.clone();
        let is_correct = question.is_correct(&selected);
        let feedback = feedback_for(question, &selected, is_correct);
        let wrong = (!is_correct).then(|| WrongAnswerRecord::from_selection(question, &selected));

        if let Some(record) = wrong {
            self.state.push_wrong_answer(record);
        } else {
            let score = self.state.score() + 1;
            self.state.set_score(score);
        }
        self.state.mark_answered(index);
        self.recorded.insert(index, selected);

        if !self.state.show_answer_at_end() {
            self.state.set_answer_revealed(true);
            self.state.emit(QuizEvent::AnswerValidated(feedback));
        }
        tracing::debug!(index, is_correct, "answer validated");

        self.emit_navigation();
        self.emit_status();
        ValidationOutcome::Validated { is_correct }
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    pub fn next(&mut self) -> NavOutcome {
        let index = self.state.current_index();
        let total = self.total_questions();

        match self.state.mode() {
            QuizMode::Review => {
                if index + 1 < total {
                    self.move_to(index + 1);
                    NavOutcome::Moved
                } else {
                    self.state.emit(QuizEvent::StudyOffered);
                    NavOutcome::ReviewEnded
                }
            }
            QuizMode::Practice => {
                if index + 1 < total {
                    self.move_to(index + 1);
                    NavOutcome::Moved
                } else {
                    NavOutcome::Blocked(BlockReason::AtEnd)
                }
            }
            QuizMode::Normal | QuizMode::Study => {
                if let Err(reason) = self.gate() {
                    return NavOutcome::Blocked(reason);
                }
                if index + 1 < total {
                    self.move_to(index + 1);
                    NavOutcome::Moved
                } else {
                    NavOutcome::Completed(self.complete())
                }
            }
        }
    }

    /// Re-display the previous question with its recorded answer. Never re-validates.
    pub fn previous(&mut self) -> NavOutcome {
        let index = self.state.current_index();
        if index == 0 {
            return NavOutcome::Blocked(BlockReason::AtStart);
        }
        self.move_to(index - 1);
        NavOutcome::Moved
    }

    /// Direct access to any question; practice mode only.
    pub fn jump_to(&mut self, index: usize) -> NavOutcome {
        if self.state.mode() != QuizMode::Practice {
            return NavOutcome::Blocked(BlockReason::WrongMode);
        }
        if index >= self.total_questions() {
            return NavOutcome::Blocked(BlockReason::OutOfRange);
        }
        self.move_to(index);
        NavOutcome::Moved
    }

    /// Pause or resume; returns the new paused flag.
    pub fn toggle_pause(&mut self) -> bool {
        let paused = !self.state.is_paused();
        self.state.set_paused(paused);
        if paused {
            self.state.tracker_mut().stop();
        } else if !self.finished {
            self.state.tracker_mut().start();
        }
        self.emit_navigation();
        paused
    }

    fn gate(&self) -> Result<(), BlockReason> {
        if self.finished {
            return Err(BlockReason::PassComplete);
        }
        if self.state.is_paused() {
            return Err(BlockReason::Paused);
        }
        let index = self.state.current_index();
        if self.state.answered_indices().contains(&index) {
            return Ok(());
        }
        if self.selected.is_empty() {
            Err(BlockReason::NoSelection)
        } else {
            Err(BlockReason::NotRevealed)
        }
    }

    fn move_to(&mut self, index: usize) {
        self.state.set_current_index(index);
        self.selected = self.recorded.get(&index).cloned().unwrap_or_default();
        let revealed = match self.state.mode() {
            QuizMode::Review => true,
            _ => {
                self.state.answered_indices().contains(&index) && !self.state.show_answer_at_end()
            }
        };
        self.state.set_answer_revealed(revealed);
        self.display();
    }

    fn complete(&mut self) -> QuizResults {
        self.state.tracker_mut().stop();
        self.finished = true;
        self.review_unlocked = true;

        let results = QuizResults::compute(&self.state, self.active.title(), self.active.len());
        tracing::info!(
            score = results.score,
            answered = results.total_answered,
            total = results.total_questions,
            "quiz complete"
        );
        self.state.emit(QuizEvent::QuizComplete(results.clone()));
        self.emit_navigation();

        if self.state.show_answer_at_end() {
            let review = reconstruct_all_answered(
                self.decks.original(),
                &self.active,
                &self.active_sources,
                self.state.answered_indices(),
                &self.recorded,
                self.state.wrong_answers(),
            );
            if !review.is_empty() {
                self.open_review(review);
            }
        }
        results
    }

    //
    // ─── REVIEW & STUDY ────────────────────────────────────────────────────────
    //

    /// Walk the wrong answers of the pass, resolved against the original exam.
    ///
    /// # Errors
    ///
    /// Blocked while already reviewing, before a pass completed (outside
    /// practice and resumed sessions), or when nothing resolves.
    pub fn enter_review(&mut self) -> Result<(), BlockReason> {
        let mode = self.state.mode();
        if mode == QuizMode::Review {
            return Err(BlockReason::WrongMode);
        }
        if mode != QuizMode::Practice && !self.review_unlocked {
            return Err(BlockReason::PassNotComplete);
        }
        if self.state.wrong_answers().is_empty() {
            return Err(BlockReason::NothingToReview);
        }
        let review = reconstruct_review(self.decks.original(), self.state.wrong_answers());
        if review.is_empty() {
            return Err(BlockReason::NothingToReview);
        }
        self.state.tracker_mut().stop();
        self.open_review(review);
        Ok(())
    }

    fn open_review(&mut self, review: Vec<ReviewQuestion>) {
        self.state.set_review_questions(review);
        self.state.set_mode(QuizMode::Review);
        self.selected.clear();
        self.state.emit(QuizEvent::ModeEntered {
            mode: QuizMode::Review,
            title: format!("{} - Review Mode", self.decks.original().title()),
        });
        self.state.set_current_index(0);
        self.state.set_answer_revealed(true);
        self.display();
    }

    /// Start a fresh scoring pass over exactly the questions under review.
    ///
    /// # Errors
    ///
    /// Blocked outside review mode or when the review deck is empty.
    pub fn enter_study(&mut self) -> Result<(), BlockReason> {
        if self.state.mode() != QuizMode::Review {
            return Err(BlockReason::WrongMode);
        }
        let (deck, sources) = study_deck(self.decks.original(), self.state.review_questions())
            .map_err(|_| BlockReason::NothingToReview)?;

        self.active = deck;
        self.active_sources = sources;
        self.selected.clear();
        self.recorded.clear();
        self.finished = false;
        self.state.set_score(0);
        self.state.replace_answered(Default::default());
        self.state.replace_wrong_answers(Vec::new());
        self.state.set_current_index(0);
        self.state.set_answer_revealed(false);
        self.state.set_mode(QuizMode::Study);
        self.state.emit(QuizEvent::ModeEntered {
            mode: QuizMode::Study,
            title: self.active.title().to_owned(),
        });
        if !self.state.is_paused() {
            self.state.tracker_mut().start();
        }
        tracing::info!(questions = self.active.len(), "study pass started");
        self.display();
        Ok(())
    }

    //
    // ─── RENDERING EVENTS ──────────────────────────────────────────────────────
    //

    /// Human-readable status line.
    #[must_use]
    pub fn status_text(&self) -> String {
        if self.state.mode() == QuizMode::Review {
            return format!(
                "Review Mode: {}/{}",
                self.state.current_index() + 1,
                self.state.review_questions().len()
            );
        }
        match self.state.answered_count() {
            0 => "Not started".to_owned(),
            answered => format!("Score: {}/{answered}", self.state.score()),
        }
    }

    /// Emit everything the rendering layer needs to draw the current position.
    pub fn display(&mut self) {
        let index = self.state.current_index();
        let total = self.total_questions();
        let event = match self.state.mode() {
            QuizMode::Review => self
                .state
                .review_questions()
                .get(index)
                .cloned()
                .map(|review| QuizEvent::ReviewQuestionReady { index, total, review }),
            _ => self
                .active
                .question(index)
                .cloned()
                .map(|question| QuizEvent::QuestionChanged { index, total, question }),
        };
        if let Some(event) = event {
            self.state.emit(event);
        }
        self.emit_navigation();
        self.state.emit(QuizEvent::ProgressChanged {
            current: index + 1,
            total,
        });
        self.emit_status();
    }

    fn emit_navigation(&mut self) {
        let index = self.state.current_index();
        let total = self.total_questions();
        let can_next = match self.state.mode() {
            QuizMode::Review => true,
            QuizMode::Practice => index + 1 < total,
            QuizMode::Normal | QuizMode::Study => self.gate().is_ok(),
        };
        self.state.emit(QuizEvent::NavigationStateChanged {
            can_prev: index > 0,
            can_next,
        });
    }

    fn emit_status(&mut self) {
        let text = self.status_text();
        self.state.emit(QuizEvent::StatusText(text));
    }
}

fn join_keys(keys: &[OptionKey]) -> String {
    keys.iter()
        .map(OptionKey::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe_selection(selected: &[OptionKey], multi: bool) -> String {
    match (selected, multi) {
        ([], _) => "No options selected".to_owned(),
        ([key], false) => format!("Selected: Option {key}"),
        (keys, _) => {
            let mut sorted = keys.to_vec();
            sorted.sort();
            format!("Selected: Options {}", join_keys(&sorted))
        }
    }
}

fn feedback_for(question: &QuestionRecord, selected: &[OptionKey], is_correct: bool) -> ValidationFeedback {
    let multi = question.kind().is_multi();
    let correct: Vec<OptionKey> = question.correct_keys().into_iter().cloned().collect();

    let message = match (is_correct, multi) {
        (true, false) => format!("✓ Correct! Your answer {} was right.", join_keys(selected)),
        (true, true) => format!("✓ Correct! Your answers {} were right.", join_keys(selected)),
        (false, false) => {
            let key = join_keys(&correct);
            format!(
                "✗ Incorrect. You selected {}, but the correct answer is {key}.\n\nCorrect Answer: {key}. {}",
                join_keys(selected),
                question.correct_answer_text()
            )
        }
        (false, true) => {
            let lines: Vec<String> = correct
                .iter()
                .map(|k| format!("{k}. {}", question.options().get(k).unwrap_or_default()))
                .collect();
            format!(
                "✗ Incorrect. You selected {}, but the correct answers are {}.\n\nCorrect Answers:\n{}",
                join_keys(selected),
                join_keys(&correct),
                lines.join("\n")
            )
        }
    };

    ValidationFeedback {
        is_correct,
        message,
        style: if is_correct {
            FeedbackStyle::Correct
        } else {
            FeedbackStyle::Incorrect
        },
    }
}
