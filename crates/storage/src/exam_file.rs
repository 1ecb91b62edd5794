//! Reading exam definitions produced by the authoring converters.

use std::fs;
use std::path::Path;

use quiz_core::model::{
    AnswerSpec, ExamDefinition, ExamError, OptionKey, OptionMap, QuestionId, QuestionRecord,
};
use serde::Deserialize;

use crate::repository::StorageError;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
enum KindTag {
    #[default]
    #[serde(rename = "singleChoice")]
    Single,
    #[serde(rename = "multiChoice")]
    Multi,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawAnswer {
    One(String),
    Many(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct QuestionEntry {
    #[serde(default)]
    id: Option<u64>,
    question: String,
    options: OptionMap,
    #[serde(rename = "type", default)]
    kind: KindTag,
    answer: RawAnswer,
}

#[derive(Debug, Deserialize)]
struct ExamFile {
    title: String,
    questions: Vec<QuestionEntry>,
}

impl QuestionEntry {
    fn into_question(self, index: usize) -> Result<QuestionRecord, ExamError> {
        let answer = match (self.kind, self.answer) {
            (KindTag::Single, RawAnswer::One(key)) => AnswerSpec::Single(OptionKey::new(key)),
            (KindTag::Single, RawAnswer::Many(mut keys)) => {
                if keys.len() != 1 {
                    return Err(ExamError::AmbiguousSingleAnswer {
                        index,
                        count: keys.len(),
                    });
                }
                AnswerSpec::Single(OptionKey::new(keys.remove(0)))
            }
            (KindTag::Multi, RawAnswer::One(key)) => {
                AnswerSpec::Multi(std::iter::once(OptionKey::new(key)).collect())
            }
            (KindTag::Multi, RawAnswer::Many(keys)) => {
                AnswerSpec::Multi(keys.into_iter().map(OptionKey::new).collect())
            }
        };

        QuestionRecord::new(
            index,
            self.id.map(QuestionId::new),
            self.question,
            self.options,
            answer,
        )
    }
}

/// Parse an exam definition from JSON text.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for malformed JSON and
/// `StorageError::InvalidExam` when a question's answer does not fit its type
/// or options.
pub fn parse_exam(json: &str) -> Result<ExamDefinition, StorageError> {
    let file: ExamFile =
        serde_json::from_str(json).map_err(|e| StorageError::Serialization(e.to_string()))?;
    let questions = file
        .questions
        .into_iter()
        .enumerate()
        .map(|(index, entry)| entry.into_question(index))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExamDefinition::new(file.title, questions)?)
}

/// Load an exam definition from disk.
///
/// # Errors
///
/// Returns `StorageError::Io` if the file cannot be read, otherwise see [`parse_exam`].
pub fn load_exam(path: &Path) -> Result<ExamDefinition, StorageError> {
    let json = fs::read_to_string(path)?;
    let exam = parse_exam(&json)?;
    tracing::debug!(path = %path.display(), questions = exam.len(), "loaded exam");
    Ok(exam)
}
