mod coordinator;
mod engine;
mod events;
mod history;
mod plan;
mod progress;
mod results;
mod review;
mod state;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use coordinator::{AUTO_SAVE_INTERVAL, SaveFlags, SaveTrigger, SessionCoordinator};
pub use engine::{BlockReason, NavOutcome, QuizEngine, ValidationOutcome};
pub use events::{
    EventBus, FeedbackStyle, QuizEvent, StateChange, SubscriptionId, ValidationFeedback,
};
pub use history::{MistakeEntry, SessionHistory, SessionListItem, SessionStatus};
pub use plan::DeckBuilder;
pub use progress::SessionProgress;
pub use results::{QuizResults, ResultsReporter};
pub use review::{reconstruct_all_answered, reconstruct_review, study_deck};
pub use state::QuizState;
pub use workflow::{QuizSession, SessionOptions};
