//! In-memory answer record for one attempt.

use std::collections::BTreeMap;

use crate::error::{Result, TestError};
use crate::model::{Question, QuestionId};

/// Maps question ids to the selected option index. Last write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerCollector {
    answers: BTreeMap<QuestionId, usize>,
}

impl AnswerCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `option` as the answer to `question`.
    pub fn record(&mut self, question: &Question, option: usize) -> Result<()> {
        if option >= question.option_count() {
            return Err(TestError::Validation(format!(
                "option {option} out of range for question '{}' ({} options)",
                question.id,
                question.option_count()
            )));
        }
        self.answers.insert(question.id.clone(), option);
        Ok(())
    }

    pub fn get(&self, question_id: &str) -> Option<usize> {
        self.answers.get(question_id).copied()
    }

    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answers.contains_key(question_id)
    }

    /// Remove a recorded answer, returning the previous selection.
    pub fn clear(&mut self, question_id: &str) -> Option<usize> {
        self.answers.remove(question_id)
    }

    /// Ids from `ids` that have no recorded answer, in the given order.
    pub fn unanswered<'a>(&self, ids: &[&'a str]) -> Vec<&'a str> {
        ids.iter()
            .copied()
            .filter(|id| !self.is_answered(id))
            .collect()
    }

    pub fn count_unanswered(&self, ids: &[&str]) -> usize {
        ids.iter().filter(|id| !self.is_answered(id)).count()
    }

    /// Refuse submission of `ids` while any of them is unanswered.
    pub fn ensure_complete(&self, ids: &[&str]) -> Result<()> {
        match self.count_unanswered(ids) {
            0 => Ok(()),
            unanswered => Err(TestError::MissingAnswers { unanswered }),
        }
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn as_map(&self) -> &BTreeMap<QuestionId, usize> {
        &self.answers
    }

    pub fn into_map(self) -> BTreeMap<QuestionId, usize> {
        self.answers
    }
}
