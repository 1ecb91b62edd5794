use chrono::{DateTime, Utc};
use quiz_core::model::ExamError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::config::StoreConfig;
use crate::fs::FileStore;
use crate::records::{ResultArtifact, SessionSnapshot};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error(transparent)]
    InvalidExam(#[from] ExamError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A snapshot read back from a store, with the identity it was found under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub path: PathBuf,
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub path: PathBuf,
    pub artifact: ResultArtifact,
}

/// Where a result artifact and its plain-text summary were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPaths {
    pub json: PathBuf,
    pub summary: PathBuf,
}

/// Durable read/write of session snapshots.
pub trait SessionStore: Send + Sync {
    /// Write `snapshot`, replacing the file at `path` when given.
    ///
    /// Without a path a new file name is derived from `session_date`. The
    /// returned path must be passed back on every later save of the same session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be serialized or written.
    fn save_session(
        &self,
        snapshot: &SessionSnapshot,
        path: Option<&Path>,
    ) -> Result<PathBuf, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound`, `Io` or `Serialization` when the
    /// snapshot cannot be read back.
    fn load_session(&self, path: &Path) -> Result<SessionSnapshot, StorageError>;

    /// All readable snapshots, newest first. Unreadable entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only if the store itself cannot be enumerated.
    fn list_sessions(&self) -> Result<Vec<StoredSession>, StorageError>;

    /// Delete every snapshot, returning how many were removed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the store cannot be enumerated.
    fn clear_sessions(&self) -> Result<usize, StorageError>;
}

/// Write-once storage of result artifacts.
pub trait ResultStore: Send + Sync {
    /// Write the artifact and its summary under names derived from the
    /// completion date; never overwrites an existing artifact.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if either file cannot be written.
    fn write_result(
        &self,
        artifact: &ResultArtifact,
        summary: &str,
    ) -> Result<ResultPaths, StorageError>;

    /// All readable artifacts, newest first. Unreadable entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` only if the store itself cannot be enumerated.
    fn list_results(&self) -> Result<Vec<StoredResult>, StorageError>;
}

pub(crate) const SESSION_PREFIX: &str = "session_";
pub(crate) const RESULT_PREFIX: &str = "quiz_results_";
pub(crate) const SUMMARY_PREFIX: &str = "quiz_summary_";

pub(crate) fn session_stem(session_date: DateTime<Utc>) -> String {
    format!("{SESSION_PREFIX}{}", session_date.format("%Y%m%d_%H%M%S"))
}

pub(crate) fn result_stamp(completed_at: DateTime<Utc>) -> String {
    completed_at.format("%Y%m%d_%H%M%S_%6f").to_string()
}

/// First `dir/stem[_n].ext` for which `taken` is false.
pub(crate) fn unique_path(
    dir: &Path,
    stem: &str,
    ext: &str,
    taken: impl Fn(&Path) -> bool,
) -> PathBuf {
    let first = dir.join(format!("{stem}.{ext}"));
    if !taken(&first) {
        return first;
    }
    (2_u32..)
        .map(|n| dir.join(format!("{stem}_{n}.{ext}")))
        .find(|candidate| !taken(candidate))
        .unwrap_or(first)
}

pub(crate) fn ser<E: std::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Simple in-memory store for testing and prototyping.
///
/// Keeps serialized JSON so tests can compare exactly what would reach disk.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    sessions: Arc<Mutex<BTreeMap<PathBuf, String>>>,
    results: Arc<Mutex<BTreeMap<PathBuf, String>>>,
    fail_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail, to exercise best-effort persistence.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw JSON stored under `path`, if any.
    #[must_use]
    pub fn raw_session(&self, path: &Path) -> Option<String> {
        self.sessions.lock().ok()?.get(path).cloned()
    }

    #[must_use]
    pub fn session_paths(&self) -> Vec<PathBuf> {
        self.sessions
            .lock()
            .map(|guard| guard.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Raw text stored under `path` by the result store (JSON or summary).
    #[must_use]
    pub fn raw_result(&self, path: &Path) -> Option<String> {
        self.results.lock().ok()?.get(path).cloned()
    }

    /// Store raw text as a session file, e.g. to simulate a corrupt snapshot.
    pub fn insert_raw_session(&self, path: impl Into<PathBuf>, raw: impl Into<String>) {
        if let Ok(mut guard) = self.sessions.lock() {
            guard.insert(path.into(), raw.into());
        }
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }

    fn sessions_dir() -> PathBuf {
        PathBuf::from("memory/sessions")
    }

    fn results_dir() -> PathBuf {
        PathBuf::from("memory/results")
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

impl SessionStore for InMemoryStore {
    fn save_session(
        &self,
        snapshot: &SessionSnapshot,
        path: Option<&Path>,
    ) -> Result<PathBuf, StorageError> {
        self.check_writable()?;
        let json = serde_json::to_string_pretty(snapshot).map_err(ser)?;
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => unique_path(
                &Self::sessions_dir(),
                &session_stem(snapshot.session_date),
                "json",
                |p| guard.contains_key(p),
            ),
        };
        guard.insert(path.clone(), json);
        Ok(path)
    }

    fn load_session(&self, path: &Path) -> Result<SessionSnapshot, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let raw = guard
            .get(path)
            .ok_or_else(|| StorageError::NotFound(path.to_path_buf()))?;
        serde_json::from_str(raw).map_err(ser)
    }

    fn list_sessions(&self) -> Result<Vec<StoredSession>, StorageError> {
        let guard = self.sessions.lock().map_err(poisoned)?;
        let mut sessions = Vec::new();
        for (path, raw) in guard.iter().rev() {
            match serde_json::from_str(raw) {
                Ok(snapshot) => sessions.push(StoredSession {
                    path: path.clone(),
                    snapshot,
                }),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable session");
                }
            }
        }
        Ok(sessions)
    }

    fn clear_sessions(&self) -> Result<usize, StorageError> {
        let mut guard = self.sessions.lock().map_err(poisoned)?;
        let count = guard.len();
        guard.clear();
        Ok(count)
    }
}

impl ResultStore for InMemoryStore {
    fn write_result(
        &self,
        artifact: &ResultArtifact,
        summary: &str,
    ) -> Result<ResultPaths, StorageError> {
        self.check_writable()?;
        let json = serde_json::to_string_pretty(artifact).map_err(ser)?;
        let mut guard = self.results.lock().map_err(poisoned)?;
        let stamp = result_stamp(artifact.session_info.completion_date);
        let dir = Self::results_dir();
        let json_path = unique_path(&dir, &format!("{RESULT_PREFIX}{stamp}"), "json", |p| {
            guard.contains_key(p)
        });
        let summary_path = unique_path(&dir, &format!("{SUMMARY_PREFIX}{stamp}"), "txt", |p| {
            guard.contains_key(p)
        });
        guard.insert(json_path.clone(), json);
        guard.insert(summary_path.clone(), summary.to_owned());
        Ok(ResultPaths {
            json: json_path,
            summary: summary_path,
        })
    }

    fn list_results(&self) -> Result<Vec<StoredResult>, StorageError> {
        let guard = self.results.lock().map_err(poisoned)?;
        let mut results = Vec::new();
        for (path, raw) in guard.iter().rev() {
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match serde_json::from_str(raw) {
                Ok(artifact) => results.push(StoredResult {
                    path: path.clone(),
                    artifact,
                }),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable result");
                }
            }
        }
        Ok(results)
    }
}

/// Aggregates session and result stores behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
    pub results: Arc<dyn ResultStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let store = InMemoryStore::new();
        Self::from_memory(&store)
    }

    /// Wrap an existing in-memory store so tests can keep a handle to it.
    #[must_use]
    pub fn from_memory(store: &InMemoryStore) -> Self {
        let sessions: Arc<dyn SessionStore> = Arc::new(store.clone());
        let results: Arc<dyn ResultStore> = Arc::new(store.clone());
        Self { sessions, results }
    }

    /// File-backed storage rooted at the configured directories.
    ///
    /// Directories are created lazily on first write.
    #[must_use]
    pub fn filesystem(config: &StoreConfig) -> Self {
        let store = FileStore::new(config.sessions_dir.clone(), config.results_dir.clone());
        let sessions: Arc<dyn SessionStore> = Arc::new(store.clone());
        let results: Arc<dyn ResultStore> = Arc::new(store);
        Self { sessions, results }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{QuizModeData, TimerData};
    use quiz_core::time::fixed_now;

    fn snapshot(score: u32) -> SessionSnapshot {
        SessionSnapshot {
            session_date: fixed_now(),
            exam_title: "T".into(),
            total_questions: 4,
            quiz_mode: QuizModeData {
                score,
                total_answered: score,
                wrong_answers: Vec::new(),
            },
            timer_data: TimerData::default(),
        }
    }

    #[test]
    fn save_without_path_derives_name_from_session_date() {
        let store = InMemoryStore::new();
        let path = store.save_session(&snapshot(1), None).unwrap();
        assert_eq!(path, PathBuf::from("memory/sessions/session_20231114_221320.json"));

        // A second session started in the same second gets its own file.
        let other = store.save_session(&snapshot(2), None).unwrap();
        assert_eq!(other, PathBuf::from("memory/sessions/session_20231114_221320_2.json"));
    }

    #[test]
    fn save_with_path_overwrites() {
        let store = InMemoryStore::new();
        let path = store.save_session(&snapshot(1), None).unwrap();
        store.save_session(&snapshot(3), Some(&path)).unwrap();

        assert_eq!(store.session_paths().len(), 1);
        assert_eq!(store.load_session(&path).unwrap().quiz_mode.score, 3);
    }

    #[test]
    fn listing_skips_corrupt_entries() {
        let store = InMemoryStore::new();
        store.save_session(&snapshot(1), None).unwrap();
        store.insert_raw_session("memory/sessions/session_99999999_999999.json", "{not json");

        let listed = store.list_sessions().unwrap();
        assert_eq!(listed.len(), 1);
    }

    #[test]
    fn failing_writes_surface_an_error() {
        let store = InMemoryStore::new();
        store.set_fail_writes(true);
        assert!(matches!(
            store.save_session(&snapshot(1), None),
            Err(StorageError::Unavailable(_))
        ));
    }
}
