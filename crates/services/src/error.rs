//! Shared error types for the services crate.

use std::path::PathBuf;
use thiserror::Error;

use quiz_core::model::ExamError;
use storage::StorageError;

/// Errors emitted while creating, resuming or inspecting sessions.
///
/// Persistence failures during a running session are not errors; they are
/// logged and swallowed by the coordinator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("exam could not be loaded from {path}")]
    ExamUnavailable {
        path: PathBuf,
        #[source]
        source: StorageError,
    },
    #[error(transparent)]
    Exam(#[from] ExamError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
