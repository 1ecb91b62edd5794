use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use quiz_core::format_elapsed;
use quiz_core::model::WrongAnswerRecord;
use storage::{
    DetailedResults, ExamInfo, Performance, ResultArtifact, ResultPaths, ResultStore, SessionInfo,
    WrongAnswerEntry,
};

use super::state::QuizState;

/// Final statistics of a pass, handed to the rendering layer on completion.
#[derive(Debug, Clone, PartialEq)]
pub struct QuizResults {
    pub exam_title: String,
    pub score: u32,
    pub total_answered: usize,
    pub total_questions: usize,
    /// Percentage of answered questions that were correct; 0 when nothing was answered.
    pub accuracy: f64,
    /// Percentage of the deck that was answered.
    pub completion_rate: f64,
    pub time_taken: Duration,
    pub wrong_answers: Vec<WrongAnswerRecord>,
    pub answered_indices: Vec<usize>,
}

impl QuizResults {
    /// Compute results from the current state of a pass over `total_questions`.
    #[must_use]
    pub fn compute(state: &QuizState, exam_title: &str, total_questions: usize) -> Self {
        let answered = state.answered_count();
        Self {
            exam_title: exam_title.to_owned(),
            score: state.score(),
            total_answered: answered,
            total_questions,
            accuracy: percentage(state.score() as usize, answered),
            completion_rate: percentage(answered, total_questions),
            time_taken: state.elapsed(),
            wrong_answers: state.wrong_answers().to_vec(),
            answered_indices: state.answered_indices().iter().copied().collect(),
        }
    }

    #[must_use]
    pub fn incorrect_count(&self) -> usize {
        self.wrong_answers.len()
    }

    #[must_use]
    pub fn time_taken_text(&self) -> String {
        format_elapsed(self.time_taken)
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Turns finished passes into result artifacts.
#[derive(Clone)]
pub struct ResultsReporter {
    store: Arc<dyn ResultStore>,
    exam_file_path: Option<String>,
    shuffle_enabled: bool,
}

impl ResultsReporter {
    #[must_use]
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self {
            store,
            exam_file_path: None,
            shuffle_enabled: false,
        }
    }

    #[must_use]
    pub fn with_exam_file_path(mut self, path: Option<String>) -> Self {
        self.exam_file_path = path;
        self
    }

    #[must_use]
    pub fn with_shuffle_enabled(mut self, shuffle: bool) -> Self {
        self.shuffle_enabled = shuffle;
        self
    }

    /// Structured record of `results`, percentages rounded to two decimals.
    #[must_use]
    pub fn artifact(&self, results: &QuizResults, completed_at: DateTime<Utc>) -> ResultArtifact {
        ResultArtifact {
            exam_info: ExamInfo {
                title: results.exam_title.clone(),
                total_questions: to_u32(results.total_questions),
                shuffle_enabled: self.shuffle_enabled,
                exam_file_path: self.exam_file_path.clone(),
            },
            session_info: SessionInfo {
                completion_date: completed_at,
                time_taken: results.time_taken_text(),
                time_taken_seconds: u64::try_from(results.time_taken.num_seconds()).unwrap_or(0),
            },
            performance: Performance {
                score: results.score,
                total_answered: to_u32(results.total_answered),
                accuracy_percentage: round2(results.accuracy),
                completion_percentage: round2(results.completion_rate),
                incorrect_count: to_u32(results.incorrect_count()),
            },
            detailed_results: DetailedResults {
                correct_answers: results.score,
                incorrect_answers: results
                    .wrong_answers
                    .iter()
                    .map(WrongAnswerEntry::from_record)
                    .collect(),
                questions_answered: results.answered_indices.clone(),
                incorrect_question_ids: results
                    .wrong_answers
                    .iter()
                    .filter_map(|w| w.question_id)
                    .collect(),
            },
        }
    }

    /// Human-readable rendering of the same data as [`Self::artifact`].
    #[must_use]
    pub fn summary_text(results: &QuizResults, completed_at: DateTime<Utc>) -> String {
        let rule = "=".repeat(50);
        let incorrect = if results.wrong_answers.is_empty() {
            "No incorrect answers!\n".to_owned()
        } else {
            let entries: String = results
                .wrong_answers
                .iter()
                .enumerate()
                .map(|(n, wrong)| {
                    format!(
                        "{}. Question: {}\n   Your Answer: {}\n   Correct Answer: {}\n\n",
                        n + 1,
                        wrong.question_text,
                        wrong.your_answer_text,
                        wrong.correct_answer_text
                    )
                })
                .collect();
            format!("INCORRECT ANSWERS:\n{}\n{entries}", "-".repeat(30))
        };

        format!(
            "QUIZ RESULTS SUMMARY\n\
             {rule}\n\n\
             Exam: {title}\n\
             Completed: {completed}\n\
             Time Taken: {time}\n\
             Questions Answered: {answered}/{total}\n\
             Score: {score}/{answered}\n\
             Accuracy: {accuracy:.1}%\n\
             Completion Rate: {completion:.1}%\n\n\
             {incorrect}\
             \n{rule}\n\
             FINAL GRADE: {accuracy:.1}%\n\
             {rule}\n",
            title = results.exam_title,
            completed = completed_at.format("%Y-%m-%d %H:%M:%S"),
            time = results.time_taken_text(),
            answered = results.total_answered,
            total = results.total_questions,
            score = results.score,
            accuracy = results.accuracy,
            completion = results.completion_rate,
        )
    }

    /// Write the artifact and its summary. Best-effort: failures are logged
    /// and reported as `None`.
    pub fn write_artifact(
        &self,
        results: &QuizResults,
        completed_at: DateTime<Utc>,
    ) -> Option<ResultPaths> {
        let artifact = self.artifact(results, completed_at);
        let summary = Self::summary_text(results, completed_at);
        match self.store.write_result(&artifact, &summary) {
            Ok(paths) => {
                tracing::info!(path = %paths.json.display(), "result artifact written");
                Some(paths)
            }
            Err(err) => {
                tracing::error!(error = %err, "could not write result artifact");
                None
            }
        }
    }
}
