#![forbid(unsafe_code)]

pub mod error;
pub mod sessions;

pub use quiz_core::Clock;
pub use sessions as session;

pub use error::SessionError;

pub use sessions::{
    AUTO_SAVE_INTERVAL, BlockReason, FeedbackStyle, MistakeEntry, NavOutcome, QuizEngine,
    QuizEvent, QuizResults, QuizSession, QuizState, ResultsReporter, SaveTrigger,
    SessionCoordinator, SessionHistory, SessionListItem, SessionOptions, SessionProgress,
    SessionStatus, StateChange, ValidationFeedback, ValidationOutcome,
};
