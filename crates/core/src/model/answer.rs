use std::time::Duration;

use crate::model::ids::QuestionId;
use crate::model::question::Question;
use crate::scoring;

/// Outcome of one question in a quiz session.
///
/// Created when the learner answers or the question timer runs out. Only the
/// session that owns it may change it, and only while the learner is still
/// allowed to revise the answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRecord {
    question_id: QuestionId,
    selected: Option<u8>,
    is_correct: bool,
    elapsed: Duration,
    skipped: bool,
}

impl AnswerRecord {
    /// Record a selection for `question`, scoring it on the spot.
    #[must_use]
    pub fn answered(question: &Question, selected: u8, elapsed: Duration) -> Self {
        Self {
            question_id: question.id().clone(),
            selected: Some(selected),
            is_correct: scoring::is_correct(question, selected),
            elapsed,
            skipped: false,
        }
    }

    /// Record a question whose timer expired before any selection.
    #[must_use]
    pub fn skipped(question_id: QuestionId, elapsed: Duration) -> Self {
        Self {
            question_id,
            selected: None,
            is_correct: false,
            elapsed,
            skipped: true,
        }
    }

    /// Replace the selection in place when the learner changes their mind.
    pub(crate) fn reselect(&mut self, question: &Question, selected: u8, elapsed: Duration) {
        self.selected = Some(selected);
        self.is_correct = scoring::is_correct(question, selected);
        self.elapsed = elapsed;
        self.skipped = false;
    }

    #[must_use]
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    #[must_use]
    pub fn selected(&self) -> Option<u8> {
        self.selected
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }
}

/// Ordered answer log with upsert-by-question semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerLog {
    records: Vec<AnswerRecord>,
}

impl AnswerLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a selection, updating the existing record for the question if any.
    pub fn upsert_selection(
        &mut self,
        question: &Question,
        selected: u8,
        elapsed: Duration,
    ) -> &AnswerRecord {
        let position = self
            .records
            .iter()
            .position(|r| r.question_id() == question.id());
        let index = match position {
            Some(index) => {
                self.records[index].reselect(question, selected, elapsed);
                index
            }
            None => {
                self.records
                    .push(AnswerRecord::answered(question, selected, elapsed));
                self.records.len() - 1
            }
        };
        &self.records[index]
    }

    /// Append a skipped record unless the question already has one.
    pub fn record_skip(&mut self, question_id: QuestionId, elapsed: Duration) -> &AnswerRecord {
        let index = match self
            .records
            .iter()
            .position(|r| *r.question_id() == question_id)
        {
            Some(index) => index,
            None => {
                self.records.push(AnswerRecord::skipped(question_id, elapsed));
                self.records.len() - 1
            }
        };
        &self.records[index]
    }

    #[must_use]
    pub fn get(&self, question_id: &QuestionId) -> Option<&AnswerRecord> {
        self.records.iter().find(|r| r.question_id() == question_id)
    }

    #[must_use]
    pub fn records(&self) -> &[AnswerRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn correct_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_correct()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Difficulty, QuestionId};

    fn question() -> Question {
        Question::new(
            QuestionId::new("1"),
            "Capital of France?",
            ["Paris".into(), "Lyon".into(), "Nice".into(), "Lille".into()],
            0,
            "Paris is the capital.",
            Difficulty::Easy,
        )
        .unwrap()
    }

    #[test]
    fn upsert_updates_existing_record_in_place() {
        let q = question();
        let mut log = AnswerLog::new();

        let first = log.upsert_selection(&q, 2, Duration::from_secs(3)).clone();
        assert!(!first.is_correct());

        let second = log.upsert_selection(&q, 0, Duration::from_secs(7));
        assert!(second.is_correct());
        assert_eq!(second.selected(), Some(0));
        assert_eq!(second.elapsed(), Duration::from_secs(7));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn skip_is_incorrect_without_selection() {
        let mut log = AnswerLog::new();
        let record = log.record_skip(QuestionId::new("1"), Duration::from_secs(20));
        assert!(record.is_skipped());
        assert!(!record.is_correct());
        assert_eq!(record.selected(), None);
    }

    #[test]
    fn answering_a_skipped_question_clears_the_skip() {
        let q = question();
        let mut log = AnswerLog::new();
        log.record_skip(q.id().clone(), Duration::from_secs(20));
        let record = log.upsert_selection(&q, 0, Duration::from_secs(4));
        assert!(!record.is_skipped());
        assert!(record.is_correct());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn correct_count_ignores_skips() {
        let q = question();
        let mut log = AnswerLog::new();
        log.upsert_selection(&q, 0, Duration::from_secs(4));
        log.record_skip(QuestionId::new("2"), Duration::from_secs(20));
        assert_eq!(log.correct_count(), 1);
        assert_eq!(log.len(), 2);
    }
}
