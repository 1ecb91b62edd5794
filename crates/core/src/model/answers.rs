use crate::model::exam::{ExamDefinition, QuestionRecord};
use crate::model::ids::{OptionKey, QuestionId};

/// Durable record of one incorrectly answered question.
///
/// `question_text` is kept as a fallback identity for exams whose questions
/// carry no id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrongAnswerRecord {
    pub question_id: Option<QuestionId>,
    pub question_text: String,
    pub your_answer_text: String,
    pub correct_answer_text: String,
}

impl WrongAnswerRecord {
    /// Capture a wrong answer using option text, not keys.
    #[must_use]
    pub fn from_selection(question: &QuestionRecord, selected: &[OptionKey]) -> Self {
        Self {
            question_id: question.id(),
            question_text: question.prompt().to_owned(),
            your_answer_text: question.option_texts(selected),
            correct_answer_text: question.correct_answer_text(),
        }
    }

    /// True if this record resolves to question `index` of `exam`.
    ///
    /// Uses [`ExamDefinition::resolve`], so a known id always wins over a
    /// matching prompt.
    #[must_use]
    pub fn resolves_to(&self, exam: &ExamDefinition, index: usize) -> bool {
        exam.resolve(self.question_id, &self.question_text)
            .is_some_and(|(found, _)| found == index)
    }
}

/// What a user answered for one question, shown while reviewing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerAnnotation {
    pub your_answer: String,
    pub correct_answer: String,
    pub is_correct: bool,
}

impl AnswerAnnotation {
    #[must_use]
    pub fn from_wrong_answer(record: &WrongAnswerRecord) -> Self {
        Self {
            your_answer: record.your_answer_text.clone(),
            correct_answer: record.correct_answer_text.clone(),
            is_correct: false,
        }
    }
}

/// A question from the original exam prepared for review, with its annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewQuestion {
    /// Position of the question in the original, unshuffled exam.
    pub source_index: usize,
    pub question: QuestionRecord,
    pub annotation: AnswerAnnotation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::exam::{AnswerSpec, OptionMap};

    fn question(id: Option<u64>) -> QuestionRecord {
        let options: OptionMap = [("A", "Paris"), ("B", "Rome"), ("C", "Oslo")]
            .into_iter()
            .collect();
        let answer = AnswerSpec::Multi([OptionKey::new("A"), OptionKey::new("C")].into_iter().collect());
        QuestionRecord::new(0, id.map(QuestionId::new), "Capitals?", options, answer).unwrap()
    }

    #[test]
    fn wrong_answer_uses_option_text() {
        let q = question(Some(3));
        let record = WrongAnswerRecord::from_selection(&q, &[OptionKey::new("B"), OptionKey::new("A")]);
        assert_eq!(record.question_id, Some(QuestionId::new(3)));
        assert_eq!(record.your_answer_text, "Paris; Rome");
        assert_eq!(record.correct_answer_text, "Paris; Oslo");
    }

    #[test]
    fn known_id_wins_over_a_shared_prompt() {
        let exam = ExamDefinition::new("T", vec![question(Some(1)), question(Some(2))]).unwrap();
        let record = WrongAnswerRecord::from_selection(&exam.questions()[1], &[OptionKey::new("B")]);

        assert!(!record.resolves_to(&exam, 0));
        assert!(record.resolves_to(&exam, 1));
    }

    #[test]
    fn missing_or_unknown_id_falls_back_to_prompt() {
        let exam = ExamDefinition::new("T", vec![question(None), question(Some(8))]).unwrap();
        let mut record = WrongAnswerRecord {
            question_id: None,
            question_text: " Capitals? ".into(),
            your_answer_text: String::new(),
            correct_answer_text: String::new(),
        };
        assert!(record.resolves_to(&exam, 0));

        record.question_id = Some(QuestionId::new(99));
        assert!(record.resolves_to(&exam, 0));
        assert!(!record.resolves_to(&exam, 1));
    }
}
