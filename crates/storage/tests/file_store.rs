use std::fs;

use chrono::Duration;
use quiz_core::time::fixed_now;
use storage::fs::FileStore;
use storage::{
    DetailedResults, ExamInfo, Performance, QuizModeData, ResultArtifact, ResultStore,
    SessionInfo, SessionSnapshot, SessionStore, StorageError, TimerData,
};

fn store(root: &std::path::Path) -> FileStore {
    FileStore::new(root.join("sessions"), root.join("results"))
}

fn snapshot(answered: u32) -> SessionSnapshot {
    SessionSnapshot {
        session_date: fixed_now(),
        exam_title: "Networking".into(),
        total_questions: 10,
        quiz_mode: QuizModeData {
            score: answered,
            total_answered: answered,
            wrong_answers: Vec::new(),
        },
        timer_data: TimerData {
            elapsed_seconds: 42,
            auto_saved: true,
            ..TimerData::default()
        },
    }
}

fn artifact(incorrect: usize) -> ResultArtifact {
    ResultArtifact {
        exam_info: ExamInfo {
            title: "Networking".into(),
            total_questions: 3,
            shuffle_enabled: false,
            exam_file_path: Some("exams/networking.json".into()),
        },
        session_info: SessionInfo {
            completion_date: fixed_now(),
            time_taken: "00:00:42".into(),
            time_taken_seconds: 42,
        },
        performance: Performance {
            score: 2,
            total_answered: 3,
            accuracy_percentage: 66.67,
            completion_percentage: 100.0,
            incorrect_count: 1,
        },
        detailed_results: DetailedResults {
            correct_answers: 2,
            incorrect_answers: (0..incorrect)
                .map(|i| storage::WrongAnswerEntry {
                    question_id: None,
                    question: format!("Q{i}"),
                    your_answer: "a".into(),
                    correct_answer: "b".into(),
                })
                .collect(),
            questions_answered: vec![0, 1, 2],
            incorrect_question_ids: Vec::new(),
        },
    }
}

#[test]
fn snapshot_upsert_keeps_one_file_per_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let path = store.save_session(&snapshot(1), None).unwrap();
    store.save_session(&snapshot(2), Some(&path)).unwrap();
    store.save_session(&snapshot(3), Some(&path)).unwrap();

    let files: Vec<_> = fs::read_dir(dir.path().join("sessions")).unwrap().collect();
    assert_eq!(files.len(), 1);
    assert_eq!(store.load_session(&path).unwrap().quiz_mode.total_answered, 3);
}

#[test]
fn listing_is_newest_first_and_skips_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let older = store.save_session(&snapshot(1), None).unwrap();
    let mut newer_snapshot = snapshot(2);
    newer_snapshot.session_date = fixed_now() + Duration::hours(1);
    let newer = store.save_session(&newer_snapshot, None).unwrap();
    fs::write(dir.path().join("sessions/session_29990101_000000.json"), "{ broken").unwrap();
    fs::write(dir.path().join("sessions/notes.txt"), "ignored").unwrap();

    let listed = store.list_sessions().unwrap();
    let paths: Vec<_> = listed.iter().map(|s| s.path.clone()).collect();
    assert_eq!(paths, vec![newer, older]);
}

#[test]
fn files_with_naive_dates_are_listed_and_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    fs::create_dir_all(dir.path().join("sessions")).unwrap();
    fs::create_dir_all(dir.path().join("results")).unwrap();

    let session = dir.path().join("sessions/session_20240301_100000.json");
    fs::write(
        &session,
        r#"{
            "session_date": "2024-03-01T10:00:00.123456",
            "exam_title": "Networking",
            "total_questions": 4,
            "quiz_mode": {"score": 1, "total_answered": 2, "wrong_answers": [
                {"question": "Q1", "your_answer": "a", "correct_answer": "b"}
            ]}
        }"#,
    )
    .unwrap();
    let mut raw_result = serde_json::to_value(artifact(1)).unwrap();
    raw_result["session_info"]["completion_date"] = "2024-03-01T10:05:00.5".into();
    fs::write(
        dir.path().join("results/quiz_results_20240301_100500.json"),
        raw_result.to_string(),
    )
    .unwrap();

    let listed = store.list_sessions().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(store.load_session(&session).unwrap().quiz_mode.total_answered, 2);

    let results = store.list_results().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].artifact.session_info.completion_date.timestamp_millis(),
        1_709_287_500_500
    );
}

#[test]
fn listing_a_missing_directory_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    assert!(store(dir.path()).list_sessions().unwrap().is_empty());
    assert!(store(dir.path()).list_results().unwrap().is_empty());
}

#[test]
fn clear_removes_only_session_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    store.save_session(&snapshot(1), None).unwrap();
    store.save_session(&snapshot(2), None).unwrap();
    fs::write(dir.path().join("sessions/keep.txt"), "x").unwrap();

    assert_eq!(store.clear_sessions().unwrap(), 2);
    assert!(dir.path().join("sessions/keep.txt").exists());
}

#[test]
fn loading_unknown_session_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let err = store(dir.path())
        .load_session(&dir.path().join("sessions/session_missing.json"))
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[test]
fn result_artifacts_are_write_once_with_summary() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());

    let first = store.write_result(&artifact(1), "summary one").unwrap();
    let second = store.write_result(&artifact(0), "summary two").unwrap();

    assert_ne!(first.json, second.json);
    assert_eq!(fs::read_to_string(&first.summary).unwrap(), "summary one");
    assert!(
        first
            .json
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("quiz_results_20231114_221320_000000")
    );

    let listed = store.list_results().unwrap();
    assert_eq!(listed.len(), 2);
}
