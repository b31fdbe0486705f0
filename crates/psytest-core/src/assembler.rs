//! Composition of block samples into one ordered test instance.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TestError};
use crate::model::{
    Block, BlockKind, Question, ScoringPolicy, TestDefinition, TestKind, TimingMode,
};
use crate::sampler::{sample, shuffle};
use crate::traits::{QuestionFilter, QuestionPool};

/// A block as it appears in an assembled instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockPlan {
    pub block_id: String,
    pub name: String,
    pub category: String,
    pub kind: BlockKind,
    /// Effective limit (test override, else block default).
    pub time_limit_secs: Option<u64>,
    pub question_count: usize,
}

/// A sampled question and the block it was drawn for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceQuestion {
    pub block_index: usize,
    pub question: Question,
}

/// A contiguous, independently timed run of questions.
///
/// Structured tests have one segment per block. Shuffled tests have a single
/// segment spanning the whole sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub range: Range<usize>,
    /// Block presented by this segment, `None` when blocks are interleaved.
    pub block: Option<usize>,
    pub kind: BlockKind,
    /// Per-segment countdown. Always `None` under whole-test timing.
    pub time_limit_secs: Option<u64>,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.range.len()
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// The question sequence of one attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInstance {
    pub test_id: String,
    pub test_name: String,
    pub kind: TestKind,
    pub timing: TimingMode,
    pub scoring: ScoringPolicy,
    pub strict_navigation: bool,
    pub blocks: Vec<BlockPlan>,
    pub questions: Vec<InstanceQuestion>,
    pub segments: Vec<Segment>,
}

impl TestInstance {
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Look up a question of this instance by id.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions
            .iter()
            .map(|q| &q.question)
            .find(|q| q.id == id)
    }

    /// Question ids in presentation order for `range`.
    pub fn question_ids(&self, range: Range<usize>) -> Vec<&str> {
        self.questions[range]
            .iter()
            .map(|q| q.question.id.as_str())
            .collect()
    }

    /// Questions drawn for block `index`, in presentation order.
    pub fn questions_in_block(&self, index: usize) -> impl Iterator<Item = &Question> {
        self.questions
            .iter()
            .filter(move |q| q.block_index == index)
            .map(|q| &q.question)
    }
}

/// A block config resolved against the catalogue, with its candidate pool.
#[derive(Debug, Clone)]
pub struct ResolvedBlock {
    pub block: Block,
    pub quantity: usize,
    pub time_limit_secs: Option<u64>,
    pub pool: Vec<Question>,
}

/// Fetches pools from a [`QuestionPool`] and builds instances.
pub struct TestAssembler {
    pool: Arc<dyn QuestionPool>,
}

impl TestAssembler {
    pub fn new(pool: Arc<dyn QuestionPool>) -> Self {
        Self { pool }
    }

    /// Resolve every block config and fetch its active, valid questions.
    ///
    /// Calls are made one after another; the first failure aborts.
    pub async fn resolve(&self, test: &TestDefinition) -> Result<Vec<ResolvedBlock>> {
        let mut resolved = Vec::with_capacity(test.blocks.len());
        for config in &test.blocks {
            let block = self.pool.fetch_block(&config.block).await?;
            let questions = self
                .pool
                .fetch_questions(&QuestionFilter::active(&block.category))
                .await?;

            let mut pool = Vec::with_capacity(questions.len());
            for q in questions {
                if q.category != block.category || q.status != crate::model::QuestionStatus::Active
                {
                    continue;
                }
                match q.validate() {
                    Ok(()) => pool.push(q),
                    Err(e) => tracing::warn!(
                        question = %q.id,
                        block = %block.id,
                        "excluding question from pool: {e}"
                    ),
                }
            }

            resolved.push(ResolvedBlock {
                quantity: config.quantity.unwrap_or(block.default_quantity),
                time_limit_secs: config.time_limit_secs.or(block.time_limit_secs),
                block,
                pool,
            });
        }
        Ok(resolved)
    }

    /// Fetch pools and assemble a new instance of `test`.
    pub async fn assemble<R>(&self, test: &TestDefinition, rng: &mut R) -> Result<TestInstance>
    where
        R: Rng + Send + ?Sized,
    {
        test.validate()?;
        let resolved = self.resolve(test).await?;
        build_instance(test, resolved, rng)
    }
}

/// Sample every resolved block and lay the questions out for `test`.
///
/// Fails as a whole if any block is under-supplied. A question id is used at
/// most once per instance, even if two configs share a category.
pub fn build_instance<R: Rng + ?Sized>(
    test: &TestDefinition,
    resolved: Vec<ResolvedBlock>,
    rng: &mut R,
) -> Result<TestInstance> {
    test.validate()?;

    let mut used: HashSet<String> = HashSet::new();
    let mut blocks = Vec::with_capacity(resolved.len());
    let mut questions = Vec::new();

    for (block_index, entry) in resolved.into_iter().enumerate() {
        if test.kind == TestKind::Custom && matches!(entry.block.kind, BlockKind::Memory { .. }) {
            return Err(TestError::Validation(format!(
                "memory block '{}' cannot be shuffled into a custom test",
                entry.block.id
            )));
        }

        let pool: Vec<Question> = entry
            .pool
            .into_iter()
            .filter(|q| !used.contains(&q.id))
            .collect();
        let drawn = sample(&entry.block.category, pool, entry.quantity, rng)?;

        blocks.push(BlockPlan {
            block_id: entry.block.id.clone(),
            name: entry.block.name.clone(),
            category: entry.block.category.clone(),
            kind: entry.block.kind,
            time_limit_secs: entry.time_limit_secs,
            question_count: drawn.len(),
        });
        for question in drawn {
            used.insert(question.id.clone());
            questions.push(InstanceQuestion {
                block_index,
                question,
            });
        }
    }

    let segments = match test.kind {
        TestKind::Custom => {
            shuffle(&mut questions, rng);
            vec![Segment {
                range: 0..questions.len(),
                block: None,
                kind: BlockKind::Standard,
                time_limit_secs: None,
            }]
        }
        TestKind::Structured => {
            let per_block = matches!(test.timing, TimingMode::PerBlock);
            let mut start = 0;
            blocks
                .iter()
                .enumerate()
                .map(|(index, plan)| {
                    let range = start..start + plan.question_count;
                    start = range.end;
                    Segment {
                        range,
                        block: Some(index),
                        kind: plan.kind,
                        time_limit_secs: if per_block { plan.time_limit_secs } else { None },
                    }
                })
                .collect()
        }
    };

    tracing::info!(
        test = %test.id,
        blocks = blocks.len(),
        questions = questions.len(),
        "assembled test instance"
    );

    Ok(TestInstance {
        test_id: test.id.clone(),
        test_name: test.name.clone(),
        kind: test.kind,
        timing: test.timing,
        scoring: test.scoring,
        strict_navigation: test.strict_navigation,
        blocks,
        questions,
        segments,
    })
}
