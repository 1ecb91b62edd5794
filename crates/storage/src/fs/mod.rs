use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::records::{ResultArtifact, SessionSnapshot};
use crate::repository::{
    RESULT_PREFIX, ResultPaths, ResultStore, SESSION_PREFIX, SUMMARY_PREFIX, SessionStore,
    StorageError, StoredResult, StoredSession, result_stamp, ser, session_stem, unique_path,
};

mod atomic;

use atomic::write_atomic;

/// JSON files on the local filesystem.
///
/// Snapshots live in `sessions_dir` as `session_<timestamp>.json`, result
/// artifacts in `results_dir` as `quiz_results_<timestamp>.json` plus a
/// `quiz_summary_<timestamp>.txt` companion.
#[derive(Debug, Clone)]
pub struct FileStore {
    sessions_dir: PathBuf,
    results_dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(sessions_dir: PathBuf, results_dir: PathBuf) -> Self {
        Self {
            sessions_dir,
            results_dir,
        }
    }

    /// Bare file names are placed in the sessions directory.
    fn resolve_session_path(&self, path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => path.to_path_buf(),
            _ => self.sessions_dir.join(path),
        }
    }
}

/// Files in `dir` named `<prefix>*.json`, newest first.
fn matching_files(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>, StorageError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err.into()),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix) && name.ends_with(".json"))
        })
        .collect();
    files.sort();
    files.reverse();
    Ok(files)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let raw = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => StorageError::NotFound(path.to_path_buf()),
        _ => StorageError::Io(err),
    })?;
    serde_json::from_str(&raw).map_err(ser)
}

impl SessionStore for FileStore {
    fn save_session(
        &self,
        snapshot: &SessionSnapshot,
        path: Option<&Path>,
    ) -> Result<PathBuf, StorageError> {
        let json = serde_json::to_string_pretty(snapshot).map_err(ser)?;
        let path = match path {
            Some(path) => self.resolve_session_path(path),
            None => unique_path(
                &self.sessions_dir,
                &session_stem(snapshot.session_date),
                "json",
                Path::exists,
            ),
        };
        write_atomic(&path, json.as_bytes())?;
        tracing::debug!(path = %path.display(), "session snapshot written");
        Ok(path)
    }

    fn load_session(&self, path: &Path) -> Result<SessionSnapshot, StorageError> {
        read_json(&self.resolve_session_path(path))
    }

    fn list_sessions(&self) -> Result<Vec<StoredSession>, StorageError> {
        let mut sessions = Vec::new();
        for path in matching_files(&self.sessions_dir, SESSION_PREFIX)? {
            match read_json(&path) {
                Ok(snapshot) => sessions.push(StoredSession { path, snapshot }),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable session");
                }
            }
        }
        Ok(sessions)
    }

    fn clear_sessions(&self) -> Result<usize, StorageError> {
        let mut deleted = 0;
        for path in matching_files(&self.sessions_dir, SESSION_PREFIX)? {
            match fs::remove_file(&path) {
                Ok(()) => deleted += 1,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "could not delete session");
                }
            }
        }
        Ok(deleted)
    }
}

impl ResultStore for FileStore {
    fn write_result(
        &self,
        artifact: &ResultArtifact,
        summary: &str,
    ) -> Result<ResultPaths, StorageError> {
        let json = serde_json::to_string_pretty(artifact).map_err(ser)?;
        let stamp = result_stamp(artifact.session_info.completion_date);
        let json_path = unique_path(
            &self.results_dir,
            &format!("{RESULT_PREFIX}{stamp}"),
            "json",
            Path::exists,
        );
        let summary_path = unique_path(
            &self.results_dir,
            &format!("{SUMMARY_PREFIX}{stamp}"),
            "txt",
            Path::exists,
        );

        write_atomic(&json_path, json.as_bytes())?;
        write_atomic(&summary_path, summary.as_bytes())?;
        tracing::info!(path = %json_path.display(), "quiz results saved");
        Ok(ResultPaths {
            json: json_path,
            summary: summary_path,
        })
    }

    fn list_results(&self) -> Result<Vec<StoredResult>, StorageError> {
        let mut results = Vec::new();
        for path in matching_files(&self.results_dir, RESULT_PREFIX)? {
            match read_json::<ResultArtifact>(&path) {
                Ok(artifact) => results.push(StoredResult { path, artifact }),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable result");
                }
            }
        }
        Ok(results)
    }
}
