//! Rebuilding review and study decks from recorded answers.
//!
//! Everything here resolves against the original, unshuffled exam so that a
//! deck can always be derived again from the wrong-answer list alone.

use std::collections::{BTreeMap, BTreeSet};

use quiz_core::model::{
    AnswerAnnotation, ExamDefinition, ExamError, OptionKey, ReviewQuestion, WrongAnswerRecord,
};

/// One review question per wrong answer that still resolves against `original`.
///
/// Records that resolve neither by id nor by prompt text are dropped.
#[must_use]
pub fn reconstruct_review(
    original: &ExamDefinition,
    wrong_answers: &[WrongAnswerRecord],
) -> Vec<ReviewQuestion> {
    wrong_answers
        .iter()
        .filter_map(|record| {
            let resolved = original.resolve(record.question_id, &record.question_text);
            if resolved.is_none() {
                tracing::debug!(
                    question = %record.question_text,
                    "wrong answer no longer matches a question; dropped from review"
                );
            }
            resolved.map(|(source_index, question)| ReviewQuestion {
                source_index,
                question: question.clone(),
                annotation: AnswerAnnotation::from_wrong_answer(record),
            })
        })
        .collect()
}

/// Annotated copy of every answered question of the pass just finished.
///
/// `answered` holds indices into `working` and `sources[i]` is the original
/// index of working question `i`. `selections` holds the keys recorded at
/// validation time. Questions are listed in the order they were walked.
#[must_use]
pub fn reconstruct_all_answered(
    original: &ExamDefinition,
    working: &ExamDefinition,
    sources: &[usize],
    answered: &BTreeSet<usize>,
    selections: &BTreeMap<usize, Vec<OptionKey>>,
    wrong_answers: &[WrongAnswerRecord],
) -> Vec<ReviewQuestion> {
    answered
        .iter()
        .filter_map(|&index| {
            let question = working.question(index)?;
            let source_index = *sources.get(index)?;

            let annotation = match selections.get(&index) {
                Some(selected) => AnswerAnnotation {
                    your_answer: question.option_texts(selected),
                    correct_answer: question.correct_answer_text(),
                    is_correct: question.is_correct(selected),
                },
                None => match wrong_answers
                    .iter()
                    .find(|w| w.resolves_to(original, source_index))
                {
                    Some(record) => AnswerAnnotation::from_wrong_answer(record),
                    None => AnswerAnnotation {
                        your_answer: question.correct_answer_text(),
                        correct_answer: question.correct_answer_text(),
                        is_correct: true,
                    },
                },
            };

            Some(ReviewQuestion {
                source_index,
                question: question.clone(),
                annotation,
            })
        })
        .collect()
}

/// The original exam narrowed to the questions under review, in original order,
/// together with the original index of each study question.
///
/// # Errors
///
/// Returns `ExamError::Empty` when `review` is empty.
pub fn study_deck(
    original: &ExamDefinition,
    review: &[ReviewQuestion],
) -> Result<(ExamDefinition, Vec<usize>), ExamError> {
    let order: Vec<usize> = review
        .iter()
        .map(|r| r.source_index)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let deck = original.reordered(format!("{} - Study Wrong Answers", original.title()), &order)?;
    Ok((deck, order))
}
