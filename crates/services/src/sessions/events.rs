use std::collections::BTreeSet;
use std::fmt;
use std::sync::mpsc;

use quiz_core::model::{QuestionRecord, QuizMode, ReviewQuestion, WrongAnswerRecord};

use super::results::QuizResults;

/// New value of a `QuizState` field, sent only when the value actually changed.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    CurrentIndex(usize),
    Score(u32),
    AnsweredIndices(BTreeSet<usize>),
    WrongAnswers(Vec<WrongAnswerRecord>),
    AnswerRevealed(bool),
    Paused(bool),
    Mode(QuizMode),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackStyle {
    Correct,
    Incorrect,
}

impl FeedbackStyle {
    /// Style tag handed to the rendering layer.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FeedbackStyle::Correct => "correct",
            FeedbackStyle::Incorrect => "incorrect",
        }
    }
}

/// Per-question feedback produced when an answer is validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFeedback {
    pub is_correct: bool,
    pub message: String,
    pub style: FeedbackStyle,
}

/// Everything the rendering layer can observe.
#[derive(Debug, Clone, PartialEq)]
pub enum QuizEvent {
    State(StateChange),
    QuestionChanged {
        index: usize,
        total: usize,
        question: QuestionRecord,
    },
    ReviewQuestionReady {
        index: usize,
        total: usize,
        review: ReviewQuestion,
    },
    OptionSelected {
        description: String,
        multi: bool,
    },
    AnswerValidated(ValidationFeedback),
    NavigationStateChanged {
        can_prev: bool,
        can_next: bool,
    },
    ProgressChanged {
        current: usize,
        total: usize,
    },
    StatusText(String),
    ModeEntered {
        mode: QuizMode,
        title: String,
    },
    /// The end of the review deck was reached; the host may offer study mode.
    StudyOffered,
    QuizComplete(QuizResults),
    SessionSaved {
        ok: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&QuizEvent) + Send>;

/// Synchronous fan-out of events to subscribers, in subscription order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&QuizEvent) + Send + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    /// Subscribe with a channel; events are cloned into the returned receiver.
    ///
    /// A subscriber whose receiver was dropped simply stops receiving.
    pub fn subscribe_channel(&mut self) -> (SubscriptionId, mpsc::Receiver<QuizEvent>) {
        let (tx, rx) = mpsc::channel();
        let id = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn emit(&mut self, event: &QuizEvent) {
        for (_, subscriber) in &mut self.subscribers {
            subscriber(event);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_subscriber_receives_and_can_unsubscribe() {
        let mut bus = EventBus::new();
        let (id, rx) = bus.subscribe_channel();

        bus.emit(&QuizEvent::StudyOffered);
        assert!(bus.unsubscribe(id));
        bus.emit(&QuizEvent::StatusText("ignored".into()));

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received, vec![QuizEvent::StudyOffered]);
        assert!(!bus.unsubscribe(id));
    }
}
