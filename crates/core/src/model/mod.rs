mod answers;
mod exam;
mod ids;
mod mode;

pub use ids::{OptionKey, QuestionId};

pub use answers::{AnswerAnnotation, ReviewQuestion, WrongAnswerRecord};
pub use exam::{
    AnswerSpec, ExamDecks, ExamDefinition, ExamError, OptionMap, QuestionKind, QuestionRecord,
};
pub use mode::QuizMode;
