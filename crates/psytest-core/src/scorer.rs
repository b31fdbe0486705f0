//! Block-level and aggregate scoring.
//!
//! Scoring is a pure function of the instance and the recorded answers.
//! Unanswered questions count as incorrect.

use crate::answers::AnswerCollector;
use crate::assembler::TestInstance;
use crate::model::ScoringPolicy;
use crate::results::{BlockScore, ScoreSheet};

/// Percentage of `correct` over `total`, guarding the empty case.
pub fn percentage(correct: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * correct as f64 / total as f64
}

/// Apply `policy` to the totals of an attempt.
pub fn aggregate(policy: ScoringPolicy, correct: usize, total: usize) -> f64 {
    match policy {
        ScoringPolicy::Percentage => percentage(correct, total),
        ScoringPolicy::Capped {
            points_per_correct,
            max_grade,
        } => (correct as f64 * points_per_correct).min(max_grade),
    }
}

/// Score every block of `instance` against `answers`.
pub fn score(instance: &TestInstance, answers: &AnswerCollector) -> ScoreSheet {
    let mut correct = vec![0usize; instance.blocks.len()];
    let mut integrity_warnings = Vec::new();

    for entry in &instance.questions {
        let q = &entry.question;
        match q.correct_option() {
            Some(expected) => {
                if answers.get(&q.id) == Some(expected) {
                    correct[entry.block_index] += 1;
                }
            }
            None => {
                tracing::warn!(question = %q.id, "no determinable correct option, scored as incorrect");
                integrity_warnings.push(q.id.clone());
            }
        }
    }

    let blocks: Vec<BlockScore> = instance
        .blocks
        .iter()
        .zip(&correct)
        .map(|(plan, &correct)| {
            let empty = plan.question_count == 0;
            if empty {
                tracing::warn!(block = %plan.block_id, "block has no questions, scored 0");
            }
            BlockScore {
                block_id: plan.block_id.clone(),
                name: plan.name.clone(),
                category: plan.category.clone(),
                correct,
                total: plan.question_count,
                percentage: percentage(correct, plan.question_count),
                empty,
            }
        })
        .collect();

    let total_correct = correct.iter().sum();
    let total_questions = instance.questions.len();

    ScoreSheet {
        test_id: instance.test_id.clone(),
        blocks,
        total_correct,
        total_questions,
        aggregate_score: aggregate(instance.scoring, total_correct, total_questions),
        scoring: instance.scoring,
        integrity_warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::tests::{question, test_def};
    use crate::assembler::{build_instance, ResolvedBlock};
    use crate::model::{Block, BlockKind, Choices, TestKind, TimingMode};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn resolved(id: &str, n: usize) -> ResolvedBlock {
        ResolvedBlock {
            block: Block {
                id: id.into(),
                category: id.into(),
                name: id.into(),
                default_quantity: n,
                time_limit_secs: None,
                kind: BlockKind::Standard,
            },
            quantity: n,
            time_limit_secs: None,
            // correct answer of question i is i % 4
            pool: (0..n).map(|i| question(&format!("{id}{i}"), id, i % 4)).collect(),
        }
    }

    fn instance(sizes: &[(&str, usize)]) -> TestInstance {
        let ids: Vec<&str> = sizes.iter().map(|(id, _)| *id).collect();
        let test = test_def(TestKind::Structured, TimingMode::PerBlock, &ids);
        let resolved = sizes.iter().map(|(id, n)| resolved(id, *n)).collect();
        build_instance(&test, resolved, &mut StdRng::seed_from_u64(0)).unwrap()
    }

    fn answer_correctly(instance: &TestInstance, ids: &[&str]) -> AnswerCollector {
        let mut answers = AnswerCollector::new();
        for id in ids {
            let q = instance.question(id).unwrap();
            answers.record(q, q.correct_option().unwrap()).unwrap();
        }
        answers
    }

    #[test]
    fn block_and_aggregate_percentages() {
        let instance = instance(&[("a", 4), ("b", 2)]);
        let answers = answer_correctly(&instance, &["a0", "a1", "a2", "b0"]);
        let sheet = score(&instance, &answers);

        assert_eq!(sheet.blocks[0].correct, 3);
        assert_eq!(sheet.blocks[0].percentage, 75.0);
        assert_eq!(sheet.blocks[1].correct, 1);
        assert_eq!(sheet.blocks[1].percentage, 50.0);
        assert_eq!(sheet.total_correct, 4);
        assert_eq!(sheet.total_questions, 6);
        assert!((sheet.aggregate_score - 400.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn wrong_and_missing_answers_score_zero() {
        let instance = instance(&[("a", 2)]);
        let mut answers = AnswerCollector::new();
        let q = instance.question("a0").unwrap();
        answers.record(q, 3).unwrap();
        let sheet = score(&instance, &answers);
        assert_eq!(sheet.total_correct, 0);
        assert_eq!(sheet.aggregate_score, 0.0);
    }

    #[test]
    fn empty_block_is_flagged_not_nan() {
        let instance = instance(&[("a", 2), ("b", 0)]);
        let sheet = score(&instance, &AnswerCollector::new());
        assert!(sheet.blocks[1].empty);
        assert_eq!(sheet.blocks[1].percentage, 0.0);
        assert!(!sheet.blocks[0].empty);
    }

    #[test]
    fn capped_policy_limits_grade() {
        let mut instance = instance(&[("a", 4)]);
        instance.scoring = ScoringPolicy::Capped {
            points_per_correct: 0.5,
            max_grade: 1.0,
        };
        let answers = answer_correctly(&instance, &["a0"]);
        assert_eq!(score(&instance, &answers).aggregate_score, 0.5);

        let answers = answer_correctly(&instance, &["a0", "a1", "a2", "a3"]);
        assert_eq!(score(&instance, &answers).aggregate_score, 1.0);
    }

    #[test]
    fn integrity_violation_scores_incorrect() {
        let mut instance = instance(&[("a", 2)]);
        let broken = instance
            .questions
            .iter_mut()
            .find(|q| q.question.id == "a1")
            .unwrap();
        broken.question.choices = Choices::Text {
            options: vec!["x".into(), "y".into()],
            correct_answer: 5,
        };
        let mut answers = answer_correctly(&instance, &["a0"]);
        answers.record(instance.question("a1").unwrap(), 1).unwrap();

        let sheet = score(&instance, &answers);
        assert_eq!(sheet.total_correct, 1);
        assert_eq!(sheet.integrity_warnings, vec!["a1".to_string()]);
    }

    #[test]
    fn scoring_is_deterministic() {
        let instance = instance(&[("a", 4), ("b", 4)]);
        let answers = answer_correctly(&instance, &["a0", "b2", "b3"]);
        assert_eq!(score(&instance, &answers), score(&instance, &answers));
    }

    #[test]
    fn no_questions_aggregate_is_zero() {
        assert_eq!(aggregate(ScoringPolicy::Percentage, 0, 0), 0.0);
    }
}
