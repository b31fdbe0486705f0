//! JSON persistence and markdown rendering of results.

use std::path::Path;

use anyhow::{Context, Result};

use crate::results::TestResult;
use crate::statistics::HistoryStats;

impl TestResult {
    /// Save the result as pretty JSON.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize result")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write result to {}", path.display()))?;
        Ok(())
    }

    /// Load a result from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read result from {}", path.display()))?;
        let result: TestResult =
            serde_json::from_str(&content).context("failed to parse result JSON")?;
        Ok(result)
    }

    /// Format the result as a markdown summary.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("## Result for test `{}`\n\n", self.test_id));
        md.push_str(&format!(
            "**Score:** {:.1} ({}) | **Correct:** {}/{} | **Finished:** {} after {}s\n\n",
            self.aggregate_score,
            self.scoring,
            self.total_correct,
            self.total_questions,
            self.finish_reason,
            self.duration_secs()
        ));

        md.push_str("| Block | Correct | Total | Score |\n");
        md.push_str("|-------|---------|-------|-------|\n");
        for b in &self.blocks {
            let score = if b.empty {
                "n/a".to_string()
            } else {
                format!("{:.1}%", b.percentage)
            };
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                b.name, b.correct, b.total, score
            ));
        }

        if !self.integrity_warnings.is_empty() {
            md.push_str("\n### Integrity warnings\n\n");
            for id in &self.integrity_warnings {
                md.push_str(&format!("- question `{id}` has no determinable correct option\n"));
            }
        }

        md
    }
}

impl HistoryStats {
    /// Format the history as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!(
            "**Attempts:** {} | **Best:** {:.1} | **Mean:** {:.1} | **Latest:** {:.1}\n\n",
            self.attempts, self.best_score, self.mean_score, self.latest_score
        ));

        if !self.per_block.is_empty() {
            md.push_str("| Block | Attempts | Mean |\n");
            md.push_str("|-------|----------|------|\n");
            for stats in self.per_block.values() {
                md.push_str(&format!(
                    "| {} | {} | {:.1}% |\n",
                    stats.name, stats.attempts, stats.mean_percentage
                ));
            }
        }

        md
    }
}
