use chrono::{DateTime, Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quiz_core::model::WrongAnswerRecord;
use storage::{ResultStore, SessionSnapshot, SessionStore, Storage, StoredResult, StoredSession};

use crate::error::SessionError;

/// How a stored session ended, judged from its timer flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Completed,
    QuitByUser,
    /// Saved by a shutdown path other than an explicit quit.
    Interrupted,
    /// Never completed, quit or emergency-saved, with questions left.
    PossiblyCrashed,
    /// Auto-saved with every question answered but not yet completed.
    InProgress,
}

impl SessionStatus {
    #[must_use]
    pub fn classify(snapshot: &SessionSnapshot) -> Self {
        let timer = &snapshot.timer_data;
        if timer.completed {
            SessionStatus::Completed
        } else if timer.quit_by_user {
            SessionStatus::QuitByUser
        } else if timer.emergency_saved {
            SessionStatus::Interrupted
        } else if snapshot.quiz_mode.total_answered < snapshot.total_questions {
            SessionStatus::PossiblyCrashed
        } else {
            SessionStatus::InProgress
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            SessionStatus::Completed => "completed",
            SessionStatus::QuitByUser => "quit",
            SessionStatus::Interrupted => "interrupted",
            SessionStatus::PossiblyCrashed => "possibly crashed",
            SessionStatus::InProgress => "in progress",
        }
    }
}

/// Presentation-agnostic list item for a resumable session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionListItem {
    pub path: PathBuf,
    pub exam_title: String,
    pub session_date: DateTime<Utc>,
    pub score: u32,
    pub total_answered: u32,
    pub total_questions: u32,
    pub elapsed: Duration,
    pub incorrect: usize,
    pub status: SessionStatus,
}

impl SessionListItem {
    #[must_use]
    pub fn from_stored(stored: &StoredSession) -> Self {
        let snapshot = &stored.snapshot;
        let seconds = i64::try_from(snapshot.timer_data.elapsed_seconds).unwrap_or(i64::MAX);
        Self {
            path: stored.path.clone(),
            exam_title: snapshot.exam_title.clone(),
            session_date: snapshot.session_date,
            score: snapshot.quiz_mode.score,
            total_answered: snapshot.quiz_mode.total_answered,
            total_questions: snapshot.total_questions,
            elapsed: Duration::try_seconds(seconds).unwrap_or_else(Duration::zero),
            incorrect: snapshot.quiz_mode.wrong_answers.len(),
            status: SessionStatus::classify(snapshot),
        }
    }

    /// "Score: s/n", or "Not started" before the first answer.
    #[must_use]
    pub fn progress_text(&self) -> String {
        if self.total_answered == 0 {
            "Not started".to_owned()
        } else {
            format!("Score: {}/{}", self.score, self.total_answered)
        }
    }
}

/// One incorrect answer taken from a result artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MistakeEntry {
    pub exam_title: String,
    pub completed_at: DateTime<Utc>,
    pub record: WrongAnswerRecord,
}

/// Read-side facade over stored sessions and result artifacts.
#[derive(Clone)]
pub struct SessionHistory {
    sessions: Arc<dyn SessionStore>,
    results: Arc<dyn ResultStore>,
}

impl SessionHistory {
    #[must_use]
    pub fn new(storage: &Storage) -> Self {
        Self {
            sessions: Arc::clone(&storage.sessions),
            results: Arc::clone(&storage.results),
        }
    }

    /// Resumable sessions, newest first. Unreadable files are skipped by the store.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the sessions location cannot be read.
    pub fn list_sessions(&self) -> Result<Vec<SessionListItem>, SessionError> {
        let stored = self.sessions.list_sessions()?;
        Ok(stored.iter().map(SessionListItem::from_stored).collect())
    }

    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the snapshot cannot be read.
    pub fn load_session(&self, path: &Path) -> Result<StoredSession, SessionError> {
        let snapshot = self.sessions.load_session(path)?;
        Ok(StoredSession {
            path: path.to_path_buf(),
            snapshot,
        })
    }

    /// Delete every stored session, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the sessions location cannot be read.
    pub fn clear_sessions(&self) -> Result<usize, SessionError> {
        let deleted = self.sessions.clear_sessions()?;
        tracing::info!(deleted, "cleared stored sessions");
        Ok(deleted)
    }

    /// Result artifacts that contain at least one incorrect answer, newest first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the results location cannot be read.
    pub fn results_with_mistakes(&self) -> Result<Vec<StoredResult>, SessionError> {
        let results = self.results.list_results()?;
        Ok(results
            .into_iter()
            .filter(|r| !r.artifact.detailed_results.incorrect_answers.is_empty())
            .collect())
    }

    /// Every incorrect answer across all result artifacts, newest result first.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Storage` if the results location cannot be read.
    pub fn aggregate_mistakes(&self) -> Result<Vec<MistakeEntry>, SessionError> {
        let mut mistakes = Vec::new();
        for result in self.results_with_mistakes()? {
            let artifact = result.artifact;
            for entry in artifact.detailed_results.incorrect_answers {
                mistakes.push(MistakeEntry {
                    exam_title: artifact.exam_info.title.clone(),
                    completed_at: artifact.session_info.completion_date,
                    record: entry.into_record(),
                });
            }
        }
        Ok(mistakes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::time::fixed_now;
    use storage::{QuizModeData, TimerData};

    fn snapshot(answered: u32, timer: TimerData) -> SessionSnapshot {
        SessionSnapshot {
            session_date: fixed_now(),
            exam_title: "Exam".into(),
            total_questions: 4,
            quiz_mode: QuizModeData {
                score: answered,
                total_answered: answered,
                wrong_answers: Vec::new(),
            },
            timer_data: timer,
        }
    }

    #[test]
    fn classification_follows_flag_precedence() {
        let flags = |completed, quit, emergency| TimerData {
            completed,
            quit_by_user: quit,
            emergency_saved: emergency,
            ..TimerData::default()
        };

        let cases = [
            (snapshot(4, flags(true, true, true)), SessionStatus::Completed),
            (snapshot(2, flags(false, true, true)), SessionStatus::QuitByUser),
            (snapshot(2, flags(false, false, true)), SessionStatus::Interrupted),
            (snapshot(2, flags(false, false, false)), SessionStatus::PossiblyCrashed),
            (snapshot(4, flags(false, false, false)), SessionStatus::InProgress),
        ];
        for (snapshot, expected) in cases {
            assert_eq!(SessionStatus::classify(&snapshot), expected);
        }
    }

    #[test]
    fn list_items_carry_progress_text() {
        let storage = Storage::in_memory();
        storage
            .sessions
            .save_session(&snapshot(0, TimerData::default()), None)
            .unwrap();
        let history = SessionHistory::new(&storage);

        let items = history.list_sessions().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].progress_text(), "Not started");
        assert_eq!(items[0].status, SessionStatus::PossiblyCrashed);

        assert_eq!(history.clear_sessions().unwrap(), 1);
        assert!(history.list_sessions().unwrap().is_empty());
    }
}
