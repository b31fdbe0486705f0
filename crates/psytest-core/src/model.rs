//! Core data model types for psytest.
//!
//! These are the administrator-authored records (questions, blocks, tests)
//! and the caller identity the engine checks access against.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, TestError};

/// Identity of a question document.
pub type QuestionId = String;

/// A single multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Unique identifier (assigned by the document store).
    pub id: QuestionId,
    /// Category label of the owning block; pools are matched on this.
    pub category: String,
    /// Prompt text shown to the user.
    pub prompt: String,
    /// Optional prompt image URL.
    #[serde(default)]
    pub image: Option<String>,
    /// Answer options and the designated correct one.
    pub choices: Choices,
    /// Publication status. Only active questions are sampled.
    #[serde(default)]
    pub status: QuestionStatus,
}

/// The answer options of a question.
///
/// Admin forms author three different shapes; the `format` discriminant
/// decides which fields are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Choices {
    /// Text options with the index of the correct one.
    Text {
        options: Vec<String>,
        correct_answer: usize,
    },
    /// Image options with the index of the correct image.
    Image {
        images: Vec<String>,
        correct_image_index: usize,
    },
    /// Answers that each carry their own correctness flag.
    Flagged { answers: Vec<FlaggedAnswer> },
}

/// One entry of a [`Choices::Flagged`] list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedAnswer {
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

impl Choices {
    /// Number of selectable options.
    pub fn option_count(&self) -> usize {
        match self {
            Choices::Text { options, .. } => options.len(),
            Choices::Image { images, .. } => images.len(),
            Choices::Flagged { answers } => answers.len(),
        }
    }

    /// Index of the correct option, or `None` if the data does not
    /// designate exactly one in-range option.
    pub fn correct_option(&self) -> Option<usize> {
        match self {
            Choices::Text {
                options,
                correct_answer,
            } => (*correct_answer < options.len()).then_some(*correct_answer),
            Choices::Image {
                images,
                correct_image_index,
            } => (*correct_image_index < images.len()).then_some(*correct_image_index),
            Choices::Flagged { answers } => {
                let mut flagged = answers
                    .iter()
                    .enumerate()
                    .filter(|(_, a)| a.is_correct)
                    .map(|(i, _)| i);
                match (flagged.next(), flagged.next()) {
                    (Some(i), None) => Some(i),
                    _ => None,
                }
            }
        }
    }
}

impl Question {
    /// Number of selectable options.
    pub fn option_count(&self) -> usize {
        self.choices.option_count()
    }

    /// Index of the correct option, if the question is well formed.
    pub fn correct_option(&self) -> Option<usize> {
        self.choices.correct_option()
    }

    /// Reject questions that could never be scored correctly.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(TestError::Validation("question id is empty".into()));
        }
        if self.category.trim().is_empty() {
            return Err(TestError::Validation(format!(
                "question '{}' has no category",
                self.id
            )));
        }
        if self.option_count() < 2 {
            return Err(TestError::Validation(format!(
                "question '{}' needs at least two options, has {}",
                self.id,
                self.option_count()
            )));
        }
        if self.correct_option().is_none() {
            let detail = match &self.choices {
                Choices::Flagged { answers } => format!(
                    "{} answers flagged correct, expected exactly one",
                    answers.iter().filter(|a| a.is_correct).count()
                ),
                _ => "correct option index out of range".to_string(),
            };
            return Err(TestError::Validation(format!(
                "question '{}': {detail}",
                self.id
            )));
        }
        Ok(())
    }
}

/// Publication status of a question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    #[default]
    Active,
    Draft,
    Archived,
}

impl fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionStatus::Active => write!(f, "active"),
            QuestionStatus::Draft => write!(f, "draft"),
            QuestionStatus::Archived => write!(f, "archived"),
        }
    }
}

impl FromStr for QuestionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(QuestionStatus::Active),
            "draft" => Ok(QuestionStatus::Draft),
            "archived" => Ok(QuestionStatus::Archived),
            other => Err(format!("unknown question status: {other}")),
        }
    }
}

/// A thematic grouping of questions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Unique identifier.
    pub id: String,
    /// Category label shared with the block's questions.
    pub category: String,
    /// Human-readable name (e.g. "Sinónimos").
    pub name: String,
    /// Questions drawn when a test does not override the quantity.
    #[serde(default = "default_quantity")]
    pub default_quantity: usize,
    /// Time limit when a test does not override it. `None` = untimed.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
    /// How questions of this block are presented.
    #[serde(default)]
    pub kind: BlockKind,
}

fn default_quantity() -> usize {
    10
}

/// Presentation style of a block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    /// All questions of the block are shown and answered freely.
    #[default]
    Standard,
    /// Each question is shown as a stimulus, hidden during a distraction
    /// phase, then recalled in a timed answer phase.
    Memory {
        stimulus_secs: u64,
        distraction_secs: u64,
        answer_secs: u64,
    },
}

/// A block as configured inside a test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Referenced block id.
    pub block: String,
    /// Override of the block's default quantity.
    #[serde(default)]
    pub quantity: Option<usize>,
    /// Override of the block's time limit.
    #[serde(default)]
    pub time_limit_secs: Option<u64>,
}

/// Whether block order survives assembly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    /// A simulation: blocks stay contiguous and are timed independently.
    #[default]
    Structured,
    /// A random test: the whole question sequence is shuffled.
    Custom,
}

/// How an attempt is timed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TimingMode {
    /// Each block runs its own countdown.
    #[default]
    PerBlock,
    /// One countdown for the entire attempt.
    Whole { time_limit_secs: u64 },
}

/// Formula turning correct answers into the aggregate score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// `100 * correct / total`.
    #[default]
    Percentage,
    /// `min(correct * points_per_correct, max_grade)`.
    Capped {
        points_per_correct: f64,
        max_grade: f64,
    },
}

impl fmt::Display for ScoringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringPolicy::Percentage => write!(f, "percentage"),
            ScoringPolicy::Capped {
                points_per_correct,
                max_grade,
            } => write!(f, "capped ({points_per_correct} per correct, max {max_grade})"),
        }
    }
}

/// Who may see a test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// An ordered composition of blocks presented as one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: TestKind,
    #[serde(default)]
    pub timing: TimingMode,
    /// Blocks in presentation order.
    #[serde(default)]
    pub blocks: Vec<BlockConfig>,
    #[serde(default)]
    pub scoring: ScoringPolicy,
    #[serde(default)]
    pub visibility: Visibility,
    /// Plans allowed to take this test. Empty means any plan.
    #[serde(default)]
    pub plans: Vec<String>,
    /// Refuse forward navigation from an unanswered question.
    #[serde(default)]
    pub strict_navigation: bool,
}

impl TestDefinition {
    /// Structural checks that do not need the block catalogue.
    pub fn validate(&self) -> Result<()> {
        if self.blocks.is_empty() {
            return Err(TestError::Validation(format!(
                "test '{}' has no blocks",
                self.id
            )));
        }
        if self.kind == TestKind::Custom && self.timing == TimingMode::PerBlock {
            return Err(TestError::Validation(format!(
                "test '{}' is shuffled across blocks and cannot be timed per block",
                self.id
            )));
        }
        if let TimingMode::Whole { time_limit_secs: 0 } = self.timing {
            return Err(TestError::Validation(format!(
                "test '{}' has a zero time limit",
                self.id
            )));
        }
        if let ScoringPolicy::Capped {
            points_per_correct,
            max_grade,
        } = self.scoring
        {
            let positive = |v: f64| v.is_finite() && v > 0.0;
            if !positive(points_per_correct) || !positive(max_grade) {
                return Err(TestError::Validation(format!(
                    "test '{}' needs finite positive values for capped scoring",
                    self.id
                )));
            }
        }
        Ok(())
    }
}

/// Role of the user taking or managing tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Candidate,
    Admin,
}

/// The caller identity, as provided by the auth collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub role: Role,
}
