//! TOML question bank parser.
//!
//! A bank file carries blocks, questions and tests authored together:
//!
//! ```toml
//! [bank]
//! id = "verbal"
//! name = "Verbal reasoning"
//!
//! [[blocks]]
//! id = "sinonimos"
//! category = "sinonimos"
//! name = "Sinónimos"
//! default_quantity = 5
//! time_limit_secs = 900
//!
//! [[questions]]
//! id = "syn-1"
//! category = "sinonimos"
//! prompt = "Synonym of 'rápido'?"
//! format = "text"
//! options = ["veloz", "lento", "tarde"]
//! correct_answer = 0
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::model::{
    Block, BlockKind, Choices, Question, QuestionStatus, TestDefinition, TestKind,
};

/// Blocks, questions and tests loaded from one bank file.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionBank {
    pub id: String,
    pub name: String,
    pub description: String,
    pub blocks: Vec<Block>,
    pub questions: Vec<Question>,
    pub tests: Vec<TestDefinition>,
}

#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    blocks: Vec<Block>,
    #[serde(default)]
    questions: Vec<TomlQuestion>,
    #[serde(default)]
    tests: Vec<TestDefinition>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

/// Questions keep their choice fields at the top level of the table.
#[derive(Debug, Deserialize)]
struct TomlQuestion {
    id: String,
    category: String,
    prompt: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    status: QuestionStatus,
    #[serde(flatten)]
    choices: Choices,
}

impl From<TomlQuestion> for Question {
    fn from(q: TomlQuestion) -> Self {
        Question {
            id: q.id,
            category: q.category,
            prompt: q.prompt,
            image: q.image,
            choices: q.choices,
            status: q.status,
        }
    }
}

/// Parse a single bank file.
pub fn parse_bank(path: &Path) -> Result<QuestionBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read bank file: {}", path.display()))?;

    parse_bank_str(&content, path)
}

/// Parse bank TOML from a string. `source_path` is only used in errors.
pub fn parse_bank_str(content: &str, source_path: &Path) -> Result<QuestionBank> {
    let parsed: TomlBankFile = toml::from_str(content)
        .with_context(|| format!("failed to parse TOML: {}", source_path.display()))?;

    Ok(QuestionBank {
        id: parsed.bank.id,
        name: parsed.bank.name,
        description: parsed.bank.description,
        blocks: parsed.blocks,
        questions: parsed.questions.into_iter().map(Question::from).collect(),
        tests: parsed.tests,
    })
}

/// Recursively load all `.toml` bank files under `dir`.
///
/// Unparseable files are skipped with a warning.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<QuestionBank>> {
    let mut banks = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let mut paths: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()?;
    paths.sort();

    for path in paths {
        if path.is_dir() {
            banks.extend(load_bank_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match parse_bank(&path) {
                Ok(bank) => banks.push(bank),
                Err(e) => tracing::warn!("skipping {}: {:#}", path.display(), e),
            }
        }
    }

    Ok(banks)
}

/// A problem found in a bank.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationWarning {
    /// Id of the offending block, question or test.
    pub item: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    fn new(item: &str, message: impl Into<String>) -> Self {
        Self {
            item: Some(item.to_string()),
            message: message.into(),
        }
    }
}

/// Check a bank for problems that would break assembly or scoring.
pub fn validate_bank(bank: &QuestionBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen = HashSet::new();
    for id in bank.blocks.iter().map(|b| &b.id) {
        if !seen.insert(id) {
            warnings.push(ValidationWarning::new(id, format!("duplicate block ID: {id}")));
        }
    }
    let mut seen = HashSet::new();
    for id in bank.questions.iter().map(|q| &q.id) {
        if !seen.insert(id) {
            warnings.push(ValidationWarning::new(id, format!("duplicate question ID: {id}")));
        }
    }
    let mut seen = HashSet::new();
    for id in bank.tests.iter().map(|t| &t.id) {
        if !seen.insert(id) {
            warnings.push(ValidationWarning::new(id, format!("duplicate test ID: {id}")));
        }
    }

    for q in &bank.questions {
        if let Err(e) = q.validate() {
            warnings.push(ValidationWarning::new(&q.id, e.to_string()));
        }
        if q.prompt.trim().is_empty() && q.image.is_none() {
            warnings.push(ValidationWarning::new(&q.id, "prompt is empty"));
        }
    }

    // usable pool per category: active and well formed
    let mut pool_sizes: HashMap<&str, usize> = HashMap::new();
    for q in &bank.questions {
        if q.status == QuestionStatus::Active && q.validate().is_ok() {
            *pool_sizes.entry(q.category.as_str()).or_default() += 1;
        }
    }
    let available = |category: &str| pool_sizes.get(category).copied().unwrap_or(0);

    let blocks: HashMap<&str, &Block> = bank.blocks.iter().map(|b| (b.id.as_str(), b)).collect();
    for block in &bank.blocks {
        if available(&block.category) < block.default_quantity {
            warnings.push(ValidationWarning::new(
                &block.id,
                format!(
                    "default quantity {} exceeds the {} active question(s) in category '{}'",
                    block.default_quantity,
                    available(&block.category),
                    block.category
                ),
            ));
        }
    }

    for test in &bank.tests {
        if let Err(e) = test.validate() {
            warnings.push(ValidationWarning::new(&test.id, e.to_string()));
        }
        for config in &test.blocks {
            let Some(block) = blocks.get(config.block.as_str()) else {
                warnings.push(ValidationWarning::new(
                    &test.id,
                    format!("references unknown block '{}'", config.block),
                ));
                continue;
            };
            if test.kind == TestKind::Custom && matches!(block.kind, BlockKind::Memory { .. }) {
                warnings.push(ValidationWarning::new(
                    &test.id,
                    format!("memory block '{}' cannot be used in a custom test", block.id),
                ));
            }
            if let Some(quantity) = config.quantity {
                if available(&block.category) < quantity {
                    warnings.push(ValidationWarning::new(
                        &test.id,
                        format!(
                            "block '{}' requests {quantity} question(s), only {} available",
                            block.id,
                            available(&block.category)
                        ),
                    ));
                }
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ScoringPolicy, TimingMode};
    use std::path::PathBuf;

    const VALID_TOML: &str = r#"
[bank]
id = "verbal"
name = "Verbal reasoning"
description = "Synonyms and memory"

[[blocks]]
id = "sinonimos"
category = "sinonimos"
name = "Sinónimos"
default_quantity = 2
time_limit_secs = 900

[[blocks]]
id = "memoria"
category = "memoria"
name = "Memoria"
default_quantity = 1
kind = { type = "memory", stimulus_secs = 10, distraction_secs = 5, answer_secs = 20 }

[[questions]]
id = "syn-1"
category = "sinonimos"
prompt = "Synonym of 'rápido'?"
format = "text"
options = ["veloz", "lento", "tarde"]
correct_answer = 0

[[questions]]
id = "syn-2"
category = "sinonimos"
prompt = "Synonym of 'feliz'?"
format = "flagged"
answers = [
    { text = "triste", is_correct = false },
    { text = "contento", is_correct = true },
]

[[questions]]
id = "mem-1"
category = "memoria"
prompt = "Which figure was shown?"
format = "image"
images = ["a.png", "b.png", "c.png"]
correct_image_index = 2

[[tests]]
id = "simulacro"
name = "Simulacro verbal"
scoring = { type = "capped", points_per_correct = 0.5, max_grade = 10.0 }
plans = ["pro"]

[[tests.blocks]]
block = "sinonimos"
quantity = 2

[[tests.blocks]]
block = "memoria"
"#;

    #[test]
    fn parse_valid_bank() {
        let bank = parse_bank_str(VALID_TOML, &PathBuf::from("verbal.toml")).unwrap();
        assert_eq!(bank.id, "verbal");
        assert_eq!(bank.blocks.len(), 2);
        assert_eq!(bank.questions.len(), 3);
        assert_eq!(bank.questions[1].correct_option(), Some(1));
        assert_eq!(bank.questions[2].correct_option(), Some(2));
        assert!(matches!(bank.blocks[1].kind, BlockKind::Memory { stimulus_secs: 10, .. }));

        let test = &bank.tests[0];
        assert_eq!(test.kind, TestKind::Structured);
        assert_eq!(test.timing, TimingMode::PerBlock);
        assert!(matches!(test.scoring, ScoringPolicy::Capped { max_grade, .. } if max_grade == 10.0));
        assert_eq!(test.blocks[1].quantity, None);
        assert!(validate_bank(&bank).is_empty(), "{:?}", validate_bank(&bank));
    }

    #[test]
    fn parse_minimal_bank() {
        let toml = r#"
[bank]
id = "empty"
name = "Empty"
"#;
        let bank = parse_bank_str(toml, &PathBuf::from("empty.toml")).unwrap();
        assert!(bank.blocks.is_empty());
        assert!(bank.questions.is_empty());
        assert!(bank.tests.is_empty());
    }

    #[test]
    fn parse_malformed_toml() {
        let result = parse_bank_str("[bank\nid = ", &PathBuf::from("bad.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn unknown_format_is_an_error() {
        let toml = r#"
[bank]
id = "b"
name = "B"

[[questions]]
id = "q"
category = "c"
prompt = "?"
format = "audio"
"#;
        assert!(parse_bank_str(toml, &PathBuf::from("b.toml")).is_err());
    }

    #[test]
    fn validate_reports_integrity_problems() {
        let toml = r#"
[bank]
id = "broken"
name = "Broken"

[[blocks]]
id = "num"
category = "num"
name = "Numérico"
default_quantity = 3

[[questions]]
id = "n1"
category = "num"
prompt = "2 + 2?"
format = "text"
options = ["3", "4"]
correct_answer = 1

[[questions]]
id = "n1"
category = "num"
prompt = "3 + 3?"
format = "text"
options = ["6", "7"]
correct_answer = 4

[[tests]]
id = "rand"
name = "Random"
kind = "custom"

[[tests.blocks]]
block = "num"
quantity = 5

[[tests.blocks]]
block = "ghost"
"#;
        let bank = parse_bank_str(toml, &PathBuf::from("broken.toml")).unwrap();
        let warnings = validate_bank(&bank);
        let has = |needle: &str| warnings.iter().any(|w| w.message.contains(needle));

        assert!(has("duplicate question ID"));
        assert!(has("out of range"));
        assert!(has("default quantity 3 exceeds"));
        assert!(has("cannot be timed per block"));
        assert!(has("unknown block 'ghost'"));
        assert!(has("requests 5 question(s), only 1 available"));
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("verbal.toml"), VALID_TOML).unwrap();
        std::fs::write(dir.path().join("broken.toml"), "not toml [").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let nested = dir.path().join("more");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(
            nested.join("empty.toml"),
            "[bank]\nid = \"empty\"\nname = \"Empty\"\n",
        )
        .unwrap();

        let banks = load_bank_directory(dir.path()).unwrap();
        let ids: Vec<&str> = banks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["empty", "verbal"]);
    }

    #[test]
    fn load_directory_requires_directory() {
        assert!(load_bank_directory(Path::new("/definitely/not/here")).is_err());
    }
}
