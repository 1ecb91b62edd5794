//! Wire shapes for session snapshots and result artifacts.
//!
//! These mirror the domain types so the JSON layout can evolve without
//! leaking storage concerns into `quiz-core`.

use chrono::{DateTime, Utc};
use quiz_core::model::{QuestionId, WrongAnswerRecord};
use serde::{Deserialize, Serialize};

/// Persisted shape of one wrong answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrongAnswerEntry {
    #[serde(default)]
    pub question_id: Option<QuestionId>,
    pub question: String,
    #[serde(default)]
    pub your_answer: String,
    #[serde(default)]
    pub correct_answer: String,
}

impl WrongAnswerEntry {
    #[must_use]
    pub fn from_record(record: &WrongAnswerRecord) -> Self {
        Self {
            question_id: record.question_id,
            question: record.question_text.clone(),
            your_answer: record.your_answer_text.clone(),
            correct_answer: record.correct_answer_text.clone(),
        }
    }

    #[must_use]
    pub fn into_record(self) -> WrongAnswerRecord {
        WrongAnswerRecord {
            question_id: self.question_id,
            question_text: self.question,
            your_answer_text: self.your_answer,
            correct_answer_text: self.correct_answer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizModeData {
    pub score: u32,
    pub total_answered: u32,
    #[serde(default)]
    pub wrong_answers: Vec<WrongAnswerEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerData {
    pub elapsed_seconds: u64,
    pub completed: bool,
    pub auto_saved: bool,
    pub emergency_saved: bool,
    pub quit_by_user: bool,
}

/// Durable record of session progress, used for resume and crash recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Frozen at the first save of the session.
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub session_date: DateTime<Utc>,
    pub exam_title: String,
    pub total_questions: u32,
    pub quiz_mode: QuizModeData,
    #[serde(default)]
    pub timer_data: TimerData,
}

impl SessionSnapshot {
    #[must_use]
    pub fn wrong_answer_records(&self) -> Vec<WrongAnswerRecord> {
        self.quiz_mode
            .wrong_answers
            .iter()
            .cloned()
            .map(WrongAnswerEntry::into_record)
            .collect()
    }
}

//
// ─── RESULT ARTIFACT ───────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamInfo {
    pub title: String,
    pub total_questions: u32,
    pub shuffle_enabled: bool,
    pub exam_file_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub completion_date: DateTime<Utc>,
    pub time_taken: String,
    pub time_taken_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub score: u32,
    pub total_answered: u32,
    pub accuracy_percentage: f64,
    pub completion_percentage: f64,
    pub incorrect_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedResults {
    pub correct_answers: u32,
    pub incorrect_answers: Vec<WrongAnswerEntry>,
    pub questions_answered: Vec<usize>,
    pub incorrect_question_ids: Vec<QuestionId>,
}

/// Write-once record of a finished pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultArtifact {
    pub exam_info: ExamInfo,
    pub session_info: SessionInfo,
    pub performance: Performance,
    pub detailed_results: DetailedResults,
}

//
// ─── TIMESTAMPS ────────────────────────────────────────────────────────────────
//

/// Dates are written as RFC 3339. Files from older writers may carry a naive
/// ISO-8601 local time (`2024-03-01T10:00:00.123456`), which is read as UTC.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};

    pub(super) fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        DateTime::parse_from_rfc3339(raw)
            .map(|date| date.with_timezone(&Utc))
            .ok()
            .or_else(|| raw.parse::<NaiveDateTime>().ok().map(|naive| naive.and_utc()))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_accept_rfc3339_and_naive_iso() {
        let utc = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(timestamp::parse("2024-03-01T10:00:00Z"), Some(utc));
        assert_eq!(timestamp::parse("2024-03-01T12:00:00+02:00"), Some(utc));
        assert_eq!(timestamp::parse("2024-03-01T10:00:00"), Some(utc));
        assert_eq!(
            timestamp::parse("2024-03-01T10:00:00.123456"),
            Some(utc + chrono::Duration::microseconds(123_456))
        );
        assert_eq!(timestamp::parse("yesterday"), None);
    }

    #[test]
    fn naive_dates_from_older_writers_load() {
        let snapshot: SessionSnapshot = serde_json::from_str(
            r#"{
                "session_date": "2024-03-01T10:00:00.123456",
                "exam_title": "AWS",
                "total_questions": 2,
                "quiz_mode": {"score": 0, "total_answered": 0, "wrong_answers": []}
            }"#,
        )
        .unwrap();
        assert_eq!(snapshot.session_date.timestamp(), 1_709_287_200);

        let info: SessionInfo = serde_json::from_str(
            r#"{
                "completion_date": "2024-03-01T10:00:00.123456",
                "time_taken": "00:01:05",
                "time_taken_seconds": 65
            }"#,
        )
        .unwrap();
        assert_eq!(info.completion_date, snapshot.session_date);

        let err = serde_json::from_str::<SessionInfo>(
            r#"{"completion_date": "soon", "time_taken": "", "time_taken_seconds": 0}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid timestamp: soon"));
    }

    #[test]
    fn legacy_snapshot_without_timer_or_ids_parses() {
        let json = r#"{
            "session_date": "2024-03-01T10:00:00Z",
            "exam_title": "AWS",
            "total_questions": 10,
            "quiz_mode": {
                "score": 1,
                "total_answered": 2,
                "wrong_answers": [{"question": "Q?", "your_answer": "a", "correct_answer": "b"}]
            }
        }"#;

        let snapshot: SessionSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.timer_data, TimerData::default());
        let records = snapshot.wrong_answer_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question_id, None);
        assert_eq!(records[0].question_text, "Q?");
    }

    #[test]
    fn snapshot_uses_documented_field_names() {
        let snapshot = SessionSnapshot {
            session_date: quiz_core::time::fixed_now(),
            exam_title: "T".into(),
            total_questions: 3,
            quiz_mode: QuizModeData {
                score: 1,
                total_answered: 1,
                wrong_answers: Vec::new(),
            },
            timer_data: TimerData {
                elapsed_seconds: 12,
                ..TimerData::default()
            },
        };
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["quiz_mode"]["total_answered"], 1);
        assert_eq!(value["timer_data"]["elapsed_seconds"], 12);
        assert_eq!(value["timer_data"]["emergency_saved"], false);
        assert_eq!(value["session_date"], "2023-11-14T22:13:20Z");
    }
}
