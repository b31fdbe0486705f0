//! Score sheets and persisted test results.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{QuestionId, ScoringPolicy};

/// Score of one block of an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockScore {
    pub block_id: String,
    pub name: String,
    pub category: String,
    pub correct: usize,
    pub total: usize,
    /// `100 * correct / total`, or 0 for an empty block.
    pub percentage: f64,
    /// The block contributed no questions.
    #[serde(default)]
    pub empty: bool,
}

/// Everything the scorer derives from an instance and its answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSheet {
    pub test_id: String,
    pub blocks: Vec<BlockScore>,
    pub total_correct: usize,
    pub total_questions: usize,
    pub aggregate_score: f64,
    pub scoring: ScoringPolicy,
    /// Ids of questions whose correct option could not be determined.
    pub integrity_warnings: Vec<QuestionId>,
}

/// Why an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinishReason {
    /// The user submitted the last block.
    Completed,
    /// A countdown reached zero.
    Expired,
    /// The user abandoned the attempt.
    Cancelled,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Completed => write!(f, "completed"),
            FinishReason::Expired => write!(f, "expired"),
            FinishReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The persisted outcome of one finished attempt. Never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub id: Uuid,
    /// Owner of the result.
    pub user_id: String,
    pub test_id: String,
    /// Selected option per answered question.
    pub answers: BTreeMap<QuestionId, usize>,
    pub blocks: Vec<BlockScore>,
    pub total_correct: usize,
    pub total_questions: usize,
    pub aggregate_score: f64,
    pub scoring: ScoringPolicy,
    pub finish_reason: FinishReason,
    #[serde(default)]
    pub integrity_warnings: Vec<QuestionId>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TestResult {
    /// Stamp a score sheet with identity, owner and timestamps.
    ///
    /// `finished_at` is clamped so it never precedes `started_at`.
    pub fn from_sheet(
        sheet: ScoreSheet,
        user_id: impl Into<String>,
        answers: BTreeMap<QuestionId, usize>,
        finish_reason: FinishReason,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            test_id: sheet.test_id,
            answers,
            blocks: sheet.blocks,
            total_correct: sheet.total_correct,
            total_questions: sheet.total_questions,
            aggregate_score: sheet.aggregate_score,
            scoring: sheet.scoring,
            finish_reason,
            integrity_warnings: sheet.integrity_warnings,
            started_at,
            finished_at: finished_at.max(started_at),
        }
    }

    /// Wall-clock duration of the attempt in seconds.
    pub fn duration_secs(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    /// Score of the block with `block_id`, if it was part of the attempt.
    pub fn block(&self, block_id: &str) -> Option<&BlockScore> {
        self.blocks.iter().find(|b| b.block_id == block_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sheet() -> ScoreSheet {
        ScoreSheet {
            test_id: "t1".into(),
            blocks: vec![BlockScore {
                block_id: "sinonimos".into(),
                name: "Sinónimos".into(),
                category: "verbal".into(),
                correct: 3,
                total: 5,
                percentage: 60.0,
                empty: false,
            }],
            total_correct: 3,
            total_questions: 5,
            aggregate_score: 60.0,
            scoring: ScoringPolicy::Percentage,
            integrity_warnings: vec![],
        }
    }

    #[test]
    fn from_sheet_copies_scores() {
        let start = Utc::now();
        let result = TestResult::from_sheet(
            sheet(),
            "u1",
            BTreeMap::new(),
            FinishReason::Completed,
            start,
            start + Duration::seconds(90),
        );
        assert_eq!(result.user_id, "u1");
        assert_eq!(result.aggregate_score, 60.0);
        assert_eq!(result.block("sinonimos").unwrap().correct, 3);
        assert_eq!(result.duration_secs(), 90);
    }

    #[test]
    fn finished_at_never_precedes_start() {
        let start = Utc::now();
        let result = TestResult::from_sheet(
            sheet(),
            "u1",
            BTreeMap::new(),
            FinishReason::Expired,
            start,
            start - Duration::seconds(5),
        );
        assert_eq!(result.finished_at, result.started_at);
    }

    #[test]
    fn finish_reason_serializes_lowercase() {
        let json = serde_json::to_string(&FinishReason::Expired).unwrap();
        assert_eq!(json, "\"expired\"");
    }
}
