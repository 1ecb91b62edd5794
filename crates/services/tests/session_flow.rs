use std::fs;

use quiz_core::model::{OptionKey, QuizMode};
use quiz_core::time::fixed_clock;
use services::{
    BlockReason, NavOutcome, QuizEvent, QuizSession, SessionHistory, SessionOptions, SessionStatus,
    ValidationOutcome,
};
use storage::{Storage, StoreConfig};

const EXAM: &str = r#"{
    "title": "Cloud Basics",
    "questions": [
        {"id": 1, "question": "Object storage?", "options": {"A": "S3", "B": "EC2", "C": "IAM"}, "answer": "A"},
        {"id": 2, "question": "Compute?", "options": {"A": "S3", "B": "EC2", "C": "Lambda"},
         "type": "multiChoice", "answer": ["B", "C"]},
        {"id": 3, "question": "Identity?", "options": {"A": "IAM", "B": "VPC"}, "answer": "A"}
    ]
}"#;

fn pick(session: &mut QuizSession, keys: &[&str]) -> ValidationOutcome {
    for key in keys {
        session.select_option(&OptionKey::new(*key), true).unwrap();
    }
    session.show_answer()
}

#[test]
fn full_pass_on_disk_then_review_and_study() {
    let dir = tempfile::tempdir().unwrap();
    let exam_path = dir.path().join("cloud.json");
    fs::write(&exam_path, EXAM).unwrap();
    let config = StoreConfig::rooted_at(dir.path());
    let storage = Storage::filesystem(&config);

    let mut session =
        QuizSession::open(&exam_path, SessionOptions::default(), &storage, fixed_clock()).unwrap();
    let (_, events) = session.subscribe_channel();
    session.begin();

    assert_eq!(pick(&mut session, &["A"]), ValidationOutcome::Validated { is_correct: true });
    assert_eq!(session.next(), NavOutcome::Moved);
    // Subset of a multi-choice answer earns nothing.
    assert_eq!(pick(&mut session, &["B"]), ValidationOutcome::Validated { is_correct: false });
    assert_eq!(session.next(), NavOutcome::Moved);
    assert_eq!(pick(&mut session, &["A"]), ValidationOutcome::Validated { is_correct: true });

    let NavOutcome::Completed(results) = session.next() else {
        panic!("expected the pass to complete");
    };
    assert_eq!(results.score, 2);
    assert_eq!(results.wrong_answers.len(), 1);
    assert_eq!(results.wrong_answers[0].your_answer_text, "EC2");
    assert_eq!(results.wrong_answers[0].correct_answer_text, "EC2; Lambda");
    assert_eq!(format!("{:.1}", results.accuracy), "66.7");

    let paths = session.last_result_paths().cloned().unwrap();
    assert!(paths.json.starts_with(&config.results_dir));
    let summary = fs::read_to_string(&paths.summary).unwrap();
    assert!(summary.contains("Exam: Cloud Basics"));
    assert!(summary.contains("Completion Rate: 100.0%"));

    session.enter_review().unwrap();
    assert_eq!(session.engine().state().mode(), QuizMode::Review);
    assert_eq!(session.next(), NavOutcome::ReviewEnded);
    session.enter_study().unwrap();
    assert_eq!(session.engine().total_questions(), 1);

    let seen: Vec<QuizEvent> = events.try_iter().collect();
    assert!(seen.iter().any(|e| matches!(e, QuizEvent::StudyOffered)));
    assert!(seen.iter().any(|e| matches!(e, QuizEvent::ModeEntered { mode: QuizMode::Study, .. })));

    session.quit();

    let history = SessionHistory::new(&storage);
    let listed = history.list_sessions().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, SessionStatus::Completed);

    let mistakes = history.aggregate_mistakes().unwrap();
    assert_eq!(mistakes.len(), 1);
    assert_eq!(mistakes[0].exam_title, "Cloud Basics");
    assert_eq!(mistakes[0].record.question_text, "Compute?");
}

#[test]
fn interrupted_session_is_listed_and_resumable() {
    let dir = tempfile::tempdir().unwrap();
    let exam_path = dir.path().join("cloud.json");
    fs::write(&exam_path, EXAM).unwrap();
    let storage = Storage::filesystem(&StoreConfig::rooted_at(dir.path()));

    {
        let mut session =
            QuizSession::open(&exam_path, SessionOptions::default(), &storage, fixed_clock())
                .unwrap();
        session.begin();
        pick(&mut session, &["C"]);
        session.next();
        assert!(session.on_signal());
    }

    let history = SessionHistory::new(&storage);
    let listed = history.list_sessions().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, SessionStatus::Interrupted);
    assert_eq!(listed[0].progress_text(), "Score: 0/1");

    let mut resumed = QuizSession::resume_from(
        &exam_path,
        &listed[0].path,
        SessionOptions::default(),
        &storage,
        fixed_clock(),
    )
    .unwrap();
    resumed.begin();
    assert_eq!(resumed.engine().state().current_index(), 1);
    pick(&mut resumed, &["B", "C"]);
    resumed.next();
    pick(&mut resumed, &["A"]);
    assert!(matches!(resumed.next(), NavOutcome::Completed(_)));
    resumed.close_window();

    let listed = history.list_sessions().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].session_date, quiz_core::time::fixed_now());
    assert_eq!(listed[0].score, 2);
    assert_eq!(listed[0].status, SessionStatus::Completed);

    assert_eq!(history.clear_sessions().unwrap(), 1);
    assert!(history.list_sessions().unwrap().is_empty());
}

#[test]
fn practice_with_answers_at_end_never_completes_on_its_own() {
    let storage = Storage::in_memory();
    let exam = storage::parse_exam(EXAM).unwrap();
    let options = SessionOptions::default()
        .with_practice(true)
        .with_show_answer_at_end(true);
    let mut session = QuizSession::start(exam, options, &storage, fixed_clock()).unwrap();
    let (_, events) = session.subscribe_channel();
    session.begin();

    assert_eq!(session.jump_to(2), NavOutcome::Moved);
    pick(&mut session, &["B"]);
    assert!(!session.engine().state().answer_revealed());
    assert_eq!(session.next(), NavOutcome::Blocked(BlockReason::AtEnd));
    assert!(
        !events
            .try_iter()
            .any(|e| matches!(e, QuizEvent::AnswerValidated(_) | QuizEvent::QuizComplete(_)))
    );
}
