use rand::seq::SliceRandom;
use rand::{Rng, rng};

use quiz_core::model::{ExamDecks, ExamDefinition, ExamError};

/// Builds the decks of a new session: the original exam plus the working copy
/// that is actually walked, optionally with its questions shuffled.
pub struct DeckBuilder {
    exam: ExamDefinition,
    shuffle: bool,
}

impl DeckBuilder {
    #[must_use]
    pub fn new(exam: ExamDefinition) -> Self {
        Self {
            exam,
            shuffle: false,
        }
    }

    /// Enable or disable shuffling of the question order.
    #[must_use]
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// # Errors
    ///
    /// Returns `ExamError` only if the computed order does not fit the exam.
    pub fn build(self) -> Result<ExamDecks, ExamError> {
        self.build_with(&mut rng())
    }

    /// Like [`Self::build`], drawing the shuffle from `rng`.
    ///
    /// # Errors
    ///
    /// See [`Self::build`].
    pub fn build_with<R: Rng + ?Sized>(self, rng: &mut R) -> Result<ExamDecks, ExamError> {
        if !self.shuffle {
            return Ok(ExamDecks::new(self.exam));
        }
        let mut order: Vec<usize> = (0..self.exam.len()).collect();
        order.as_mut_slice().shuffle(rng);
        tracing::debug!(questions = order.len(), "shuffled question order");
        ExamDecks::with_order(self.exam, &order)
    }
}
