use std::path::PathBuf;

pub const SESSIONS_DIR_ENV: &str = "QUIZ_SESSIONS_DIR";
pub const RESULTS_DIR_ENV: &str = "QUIZ_RESULTS_DIR";

/// Directories used by the file-backed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub sessions_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sessions_dir: PathBuf::from("data/sessions"),
            results_dir: PathBuf::from("results"),
        }
    }
}

impl StoreConfig {
    /// Defaults, overridden by `QUIZ_SESSIONS_DIR` / `QUIZ_RESULTS_DIR` when set and non-empty.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(dir) = env_dir(SESSIONS_DIR_ENV) {
            config.sessions_dir = dir;
        }
        if let Some(dir) = env_dir(RESULTS_DIR_ENV) {
            config.results_dir = dir;
        }
        config
    }

    /// Place both directories under `root`.
    #[must_use]
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            sessions_dir: root.join("sessions"),
            results_dir: root.join("results"),
        }
    }
}

fn env_dir(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}
