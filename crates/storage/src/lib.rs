#![forbid(unsafe_code)]

pub mod config;
pub mod exam_file;
pub mod fs;
pub mod records;
pub mod repository;

pub use config::StoreConfig;
pub use exam_file::{load_exam, parse_exam};
pub use records::{
    DetailedResults, ExamInfo, Performance, QuizModeData, ResultArtifact, SessionInfo,
    SessionSnapshot, TimerData, WrongAnswerEntry,
};
pub use repository::{
    InMemoryStore, ResultPaths, ResultStore, SessionStore, Storage, StorageError, StoredResult,
    StoredSession,
};
