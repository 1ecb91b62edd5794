use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

use crate::model::ids::{OptionKey, QuestionId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExamError {
    #[error("exam has no questions")]
    Empty,

    #[error("question {index} has no options")]
    NoOptions { index: usize },

    #[error("question {index} names answer {key} which is not one of its options")]
    UnknownAnswerKey { index: usize, key: OptionKey },

    #[error("multi-choice question {index} has no correct keys")]
    EmptyAnswer { index: usize },

    #[error("single-choice question {index} lists {count} answers")]
    AmbiguousSingleAnswer { index: usize, count: usize },

    #[error("question index {index} is out of range for an exam of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

//
// ─── OPTIONS ───────────────────────────────────────────────────────────────────
//

/// Answer options in authoring order.
///
/// Serialized as a JSON object whose key order is kept exactly as written;
/// the keys are never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionMap {
    entries: Vec<(OptionKey, String)>,
}

impl OptionMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an option, rejecting a key that is already present.
    ///
    /// Returns the rejected key on conflict.
    pub fn insert(&mut self, key: OptionKey, text: impl Into<String>) -> Result<(), OptionKey> {
        if self.contains(&key) {
            return Err(key);
        }
        self.entries.push((key, text.into()));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &OptionKey) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, text)| text.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &OptionKey) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OptionKey, &str)> {
        self.entries.iter().map(|(k, v)| (k, v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &OptionKey> {
        self.entries.iter().map(|(k, _)| k)
    }
}

impl<K: Into<OptionKey>, V: Into<String>> FromIterator<(K, V)> for OptionMap {
    /// The first occurrence of a key wins; later duplicates are ignored.
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (key, text) in iter {
            let _ = map.insert(key.into(), text);
        }
        map
    }
}

impl Serialize for OptionMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, text) in &self.entries {
            map.serialize_entry(key.as_str(), text)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OptionMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OptionMap;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping option keys to option text")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<OptionMap, A::Error> {
                let mut map = OptionMap::new();
                while let Some((key, text)) = access.next_entry::<String, String>()? {
                    map.insert(OptionKey::new(key), text).map_err(|dup| {
                        serde::de::Error::custom(format!("duplicate option key {dup}"))
                    })?;
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

//
// ─── ANSWERS ───────────────────────────────────────────────────────────────────
//

/// Whether a question takes one key or a set of keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuestionKind {
    Single,
    Multi,
}

impl QuestionKind {
    #[must_use]
    pub fn is_multi(self) -> bool {
        matches!(self, QuestionKind::Multi)
    }
}

/// The correct answer of a question, tagged by kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerSpec {
    Single(OptionKey),
    Multi(BTreeSet<OptionKey>),
}

impl AnswerSpec {
    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        match self {
            AnswerSpec::Single(_) => QuestionKind::Single,
            AnswerSpec::Multi(_) => QuestionKind::Multi,
        }
    }

    /// Exact-match check. No partial credit: subsets and supersets are wrong.
    #[must_use]
    pub fn matches(&self, selected: &[OptionKey]) -> bool {
        match self {
            AnswerSpec::Single(key) => selected.len() == 1 && &selected[0] == key,
            AnswerSpec::Multi(keys) => {
                let chosen: BTreeSet<&OptionKey> = selected.iter().collect();
                chosen.len() == keys.len() && keys.iter().all(|k| chosen.contains(k))
            }
        }
    }

    fn contains(&self, key: &OptionKey) -> bool {
        match self {
            AnswerSpec::Single(k) => k == key,
            AnswerSpec::Multi(keys) => keys.contains(key),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionRecord {
    id: Option<QuestionId>,
    prompt: String,
    options: OptionMap,
    answer: AnswerSpec,
}

impl QuestionRecord {
    /// Build a question, checking that every correct key is one of the options.
    ///
    /// `index` is only used to label errors.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::NoOptions`, `ExamError::EmptyAnswer` or
    /// `ExamError::UnknownAnswerKey` when the answer does not fit the options.
    pub fn new(
        index: usize,
        id: Option<QuestionId>,
        prompt: impl Into<String>,
        options: OptionMap,
        answer: AnswerSpec,
    ) -> Result<Self, ExamError> {
        if options.is_empty() {
            return Err(ExamError::NoOptions { index });
        }
        let keys: Vec<&OptionKey> = match &answer {
            AnswerSpec::Single(key) => vec![key],
            AnswerSpec::Multi(keys) if keys.is_empty() => {
                return Err(ExamError::EmptyAnswer { index });
            }
            AnswerSpec::Multi(keys) => keys.iter().collect(),
        };
        if let Some(missing) = keys.into_iter().find(|k| !options.contains(k)) {
            return Err(ExamError::UnknownAnswerKey {
                index,
                key: missing.clone(),
            });
        }

        Ok(Self {
            id,
            prompt: prompt.into(),
            options,
            answer,
        })
    }

    #[must_use]
    pub fn id(&self) -> Option<QuestionId> {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn options(&self) -> &OptionMap {
        &self.options
    }

    #[must_use]
    pub fn answer(&self) -> &AnswerSpec {
        &self.answer
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.answer.kind()
    }

    #[must_use]
    pub fn is_correct(&self, selected: &[OptionKey]) -> bool {
        self.answer.matches(selected)
    }

    /// Correct keys in authoring order.
    #[must_use]
    pub fn correct_keys(&self) -> Vec<&OptionKey> {
        self.options
            .keys()
            .filter(|k| self.answer.contains(k))
            .collect()
    }

    /// Option text for `keys`, in authoring order, joined with `"; "`.
    ///
    /// Keys that are not options of this question are skipped.
    #[must_use]
    pub fn option_texts(&self, keys: &[OptionKey]) -> String {
        self.options
            .iter()
            .filter(|(k, _)| keys.contains(k))
            .map(|(_, text)| text)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Option text of the correct answer, joined with `"; "` for multi-choice.
    #[must_use]
    pub fn correct_answer_text(&self) -> String {
        let keys: Vec<OptionKey> = self.correct_keys().into_iter().cloned().collect();
        self.option_texts(&keys)
    }
}

//
// ─── EXAM ──────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExamDefinition {
    title: String,
    questions: Vec<QuestionRecord>,
}

impl ExamDefinition {
    /// # Errors
    ///
    /// Returns `ExamError::Empty` if there are no questions.
    pub fn new(title: impl Into<String>, questions: Vec<QuestionRecord>) -> Result<Self, ExamError> {
        if questions.is_empty() {
            return Err(ExamError::Empty);
        }
        Ok(Self {
            title: title.into(),
            questions,
        })
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[QuestionRecord] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&QuestionRecord> {
        self.questions.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Copy of this exam with questions in the given order.
    ///
    /// # Errors
    ///
    /// Returns `ExamError::IndexOutOfRange` for a bad index and `ExamError::Empty`
    /// when `order` is empty.
    pub fn reordered(&self, title: impl Into<String>, order: &[usize]) -> Result<Self, ExamError> {
        let len = self.questions.len();
        let questions = order
            .iter()
            .map(|&index| {
                self.questions
                    .get(index)
                    .cloned()
                    .ok_or(ExamError::IndexOutOfRange { index, len })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(title, questions)
    }

    /// Find the question a recorded answer refers to.
    ///
    /// Looks up by exact id first. When the id is absent or matches nothing,
    /// falls back to the first question whose trimmed prompt equals the trimmed
    /// `prompt`. Returns `None` when neither step resolves.
    #[must_use]
    pub fn resolve(
        &self,
        id: Option<QuestionId>,
        prompt: &str,
    ) -> Option<(usize, &QuestionRecord)> {
        let by_id = id.and_then(|id| {
            self.questions
                .iter()
                .enumerate()
                .find(|(_, q)| q.id() == Some(id))
        });
        by_id.or_else(|| {
            let wanted = prompt.trim();
            self.questions
                .iter()
                .enumerate()
                .find(|(_, q)| q.prompt().trim() == wanted)
        })
    }
}

/// The exam as loaded, and the copy a session actually walks.
///
/// `original` is never filtered or shuffled; review and study decks are always
/// resolved against it. `order[i]` is the original index of working question `i`.
#[derive(Debug, Clone)]
pub struct ExamDecks {
    original: ExamDefinition,
    working: ExamDefinition,
    order: Vec<usize>,
}

impl ExamDecks {
    #[must_use]
    pub fn new(original: ExamDefinition) -> Self {
        let working = original.clone();
        let order = (0..original.len()).collect();
        Self {
            original,
            working,
            order,
        }
    }

    /// Use `order` for the working copy.
    ///
    /// # Errors
    ///
    /// Returns `ExamError` if `order` does not index into the original exam.
    pub fn with_order(original: ExamDefinition, order: &[usize]) -> Result<Self, ExamError> {
        let working = original.reordered(original.title().to_owned(), order)?;
        Ok(Self {
            original,
            working,
            order: order.to_vec(),
        })
    }

    #[must_use]
    pub fn original(&self) -> &ExamDefinition {
        &self.original
    }

    #[must_use]
    pub fn working(&self) -> &ExamDefinition {
        &self.working
    }

    /// Original index of every working question, in working order.
    #[must_use]
    pub fn order(&self) -> &[usize] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(k: &str) -> OptionKey {
        OptionKey::new(k)
    }

    fn options() -> OptionMap {
        [("C", "third"), ("A", "first"), ("B", "second")]
            .into_iter()
            .collect()
    }

    fn single(id: u64, prompt: &str, answer: &str) -> QuestionRecord {
        QuestionRecord::new(
            0,
            Some(QuestionId::new(id)),
            prompt,
            options(),
            AnswerSpec::Single(key(answer)),
        )
        .unwrap()
    }

    #[test]
    fn option_map_keeps_authoring_order() {
        let map: OptionMap = serde_json::from_str(r#"{"D":"d","A":"a","C":"c"}"#).unwrap();
        let keys: Vec<&str> = map.keys().map(OptionKey::as_str).collect();
        assert_eq!(keys, vec!["D", "A", "C"]);
        assert_eq!(serde_json::to_string(&map).unwrap(), r#"{"D":"d","A":"a","C":"c"}"#);
    }

    #[test]
    fn option_map_rejects_duplicate_keys() {
        let err = serde_json::from_str::<OptionMap>(r#"{"A":"a","A":"b"}"#).unwrap_err();
        assert!(err.to_string().contains("duplicate option key A"));
    }

    #[test]
    fn single_choice_requires_exactly_the_correct_key() {
        let q = single(1, "Q", "B");
        assert!(q.is_correct(&[key("B")]));
        assert!(!q.is_correct(&[key("A")]));
        assert!(!q.is_correct(&[key("B"), key("A")]));
        assert!(!q.is_correct(&[]));
    }

    #[test]
    fn multi_choice_has_no_partial_credit() {
        let answer = AnswerSpec::Multi([key("A"), key("B")].into_iter().collect());
        let q = QuestionRecord::new(0, None, "Q", options(), answer).unwrap();

        assert!(q.is_correct(&[key("B"), key("A")]));
        assert!(!q.is_correct(&[key("A")]));
        assert!(!q.is_correct(&[key("A"), key("B"), key("C")]));
        assert_eq!(q.correct_answer_text(), "first; second");
    }

    #[test]
    fn answer_must_name_an_option() {
        let err = QuestionRecord::new(4, None, "Q", options(), AnswerSpec::Single(key("Z")))
            .unwrap_err();
        assert_eq!(err, ExamError::UnknownAnswerKey { index: 4, key: key("Z") });

        let err = QuestionRecord::new(2, None, "Q", options(), AnswerSpec::Multi(BTreeSet::new()))
            .unwrap_err();
        assert_eq!(err, ExamError::EmptyAnswer { index: 2 });
    }

    #[test]
    fn option_texts_follow_authoring_order() {
        let q = single(1, "Q", "A");
        assert_eq!(q.option_texts(&[key("B"), key("C")]), "third; second");
    }

    #[test]
    fn resolve_prefers_id_then_trimmed_text() {
        let exam = ExamDefinition::new(
            "T",
            vec![single(1, "  First  ", "A"), single(7, "Second", "B"), single(9, "Second", "C")],
        )
        .unwrap();

        let (index, _) = exam.resolve(Some(QuestionId::new(7)), "ignored").unwrap();
        assert_eq!(index, 1);

        let (index, _) = exam.resolve(None, "First").unwrap();
        assert_eq!(index, 0);

        // Unknown id falls back to text, first match in definition order.
        let (index, _) = exam.resolve(Some(QuestionId::new(42)), " Second ").unwrap();
        assert_eq!(index, 1);

        assert!(exam.resolve(Some(QuestionId::new(42)), "missing").is_none());
    }

    #[test]
    fn decks_keep_original_untouched() {
        let exam = ExamDefinition::new("T", vec![single(1, "a", "A"), single(2, "b", "A")]).unwrap();
        let decks = ExamDecks::with_order(exam, &[1, 0]).unwrap();
        assert_eq!(decks.original().questions()[0].prompt(), "a");
        assert_eq!(decks.working().questions()[0].prompt(), "b");
        assert_eq!(decks.order(), &[1, 0]);
        assert_eq!(ExamDecks::new(decks.original().clone()).order(), &[0, 1]);
    }

    #[test]
    fn collected_options_keep_the_first_text_of_a_repeated_key() {
        let map: OptionMap = [("A", "first"), ("B", "second"), ("A", "again")]
            .into_iter()
            .collect();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&key("A")), Some("first"));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec![&key("A"), &key("B")]);
    }

    #[test]
    fn empty_exam_is_rejected() {
        assert_eq!(ExamDefinition::new("T", Vec::new()).unwrap_err(), ExamError::Empty);
    }
}
