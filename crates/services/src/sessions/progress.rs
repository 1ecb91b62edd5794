/// How far the current pass has come, for status lines and progress bars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    pub remaining: usize,
    /// The pass reached its results screen.
    pub is_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn new(total: usize, answered: usize, is_complete: bool) -> Self {
        Self {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete,
        }
    }

    /// Share of the deck answered, 0 to 100.
    #[must_use]
    pub fn percent_answered(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.answered.min(self.total) as f64 / self.total as f64 * 100.0
    }
}
