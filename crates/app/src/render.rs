use quiz_core::model::QuestionRecord;
use services::{FeedbackStyle, QuizEvent, QuizResults};

/// Text printed to the transcript for `event`, if any.
///
/// State deltas, navigation flags and successful saves are not shown.
pub fn render_event(event: &QuizEvent) -> Option<String> {
    match event {
        QuizEvent::QuestionChanged {
            index,
            total,
            question,
        } => Some(question_block(*index, *total, question)),
        QuizEvent::ReviewQuestionReady {
            index,
            total,
            review,
        } => {
            let mark = if review.annotation.is_correct { "✓" } else { "✗" };
            Some(format!(
                "{}\n{mark} Your answer: {}\n  Correct answer: {}",
                question_block(*index, *total, &review.question),
                review.annotation.your_answer,
                review.annotation.correct_answer
            ))
        }
        QuizEvent::OptionSelected { description, .. } => Some(description.clone()),
        QuizEvent::AnswerValidated(feedback) => Some(match feedback.style {
            FeedbackStyle::Correct => feedback.message.clone(),
            FeedbackStyle::Incorrect => format!("{}\n", feedback.message),
        }),
        QuizEvent::StatusText(text) => Some(format!("[{text}]")),
        QuizEvent::ModeEntered { mode, title } => Some(format!("\n=== {title} ({mode}) ===")),
        QuizEvent::StudyOffered => {
            Some("End of review. Type `study` to retry the questions you missed.".to_owned())
        }
        QuizEvent::QuizComplete(results) => Some(results_block(results)),
        QuizEvent::SessionSaved { ok: false } => {
            Some("(the session could not be saved, see log)".to_owned())
        }
        _ => None,
    }
}

fn question_block(index: usize, total: usize, question: &QuestionRecord) -> String {
    let hint = if question.kind().is_multi() {
        " (select all that apply)"
    } else {
        ""
    };
    let options: String = question
        .options()
        .iter()
        .map(|(key, text)| format!("\n  {key}. {text}"))
        .collect();
    format!("\nQuestion {}/{total}{hint}\n{}{options}", index + 1, question.prompt())
}

fn results_block(results: &QuizResults) -> String {
    format!(
        "\n=== Results: {} ===\nScore: {}/{}\nAccuracy: {:.1}%\nCompletion: {:.1}%\nTime: {}\nIncorrect: {}\n\
         Type `review` to go over your answers, or `quit`.",
        results.exam_title,
        results.score,
        results.total_answered,
        results.accuracy,
        results.completion_rate,
        results.time_taken_text(),
        results.incorrect_count(),
    )
}
