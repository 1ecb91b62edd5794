use std::fmt;

/// The mode a quiz session is in.
///
/// `Normal` and `Practice` are alternative starting configurations. `Review`
/// and `Study` are only reached after answers exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QuizMode {
    /// Validation-gated pass over the working exam.
    #[default]
    Normal,
    /// Free navigation, no gate and no automatic completion.
    Practice,
    /// Read-only walk over annotated questions.
    Review,
    /// Gated pass over a filtered subset of the original exam.
    Study,
}

impl QuizMode {
    /// Modes where `next()` needs a revealed answer first.
    #[must_use]
    pub fn is_gated(self) -> bool {
        matches!(self, QuizMode::Normal | QuizMode::Study)
    }

    /// Modes where `score + wrong answers == answered` must hold.
    #[must_use]
    pub fn keeps_score_invariant(self) -> bool {
        self.is_gated()
    }
}

impl fmt::Display for QuizMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            QuizMode::Normal => "normal",
            QuizMode::Practice => "practice",
            QuizMode::Review => "review",
            QuizMode::Study => "study",
        };
        f.write_str(label)
    }
}
