//! The `psytest results` commands.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use psytest_core::access::check_result_owner;
use psytest_core::results::TestResult;
use psytest_core::statistics::history_stats;
use psytest_core::traits::ResultStore;

use super::{format_secs, Repository};

/// Print a result header and its per-block table.
pub fn print_result(result: &TestResult) {
    println!(
        "Test {}: {:.1} ({}), {}/{} correct, {} after {}",
        result.test_id,
        result.aggregate_score,
        result.scoring,
        result.total_correct,
        result.total_questions,
        result.finish_reason,
        format_secs(result.duration_secs().max(0) as u64)
    );

    let mut table = Table::new();
    table.set_header(vec!["Block", "Correct", "Total", "Score"]);
    for b in &result.blocks {
        let score = if b.empty {
            "n/a".to_string()
        } else {
            format!("{:.1}%", b.percentage)
        };
        table.add_row(vec![
            Cell::new(&b.name),
            Cell::new(b.correct),
            Cell::new(b.total),
            Cell::new(score),
        ]);
    }
    println!("{table}");

    for id in &result.integrity_warnings {
        println!("  WARNING: question {id} has no determinable correct option");
    }
}

async fn own_results(repo: &Repository, user_id: &str, test: Option<&str>) -> Result<Vec<TestResult>> {
    let results = repo.fetch_results(user_id).await?;
    Ok(results
        .into_iter()
        .filter(|r| test.is_none_or(|t| r.test_id == t))
        .collect())
}

pub async fn list(test: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let (config, repo) = super::open_repository(config_path.as_deref())?;
    let results = own_results(&repo, &config.user.id, test.as_deref()).await?;

    if results.is_empty() {
        println!("No results yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Result", "Test", "Score", "Correct", "Finished", "Started"]);
    for r in &results {
        table.add_row(vec![
            Cell::new(r.id),
            Cell::new(&r.test_id),
            Cell::new(format!("{:.1}", r.aggregate_score)),
            Cell::new(format!("{}/{}", r.total_correct, r.total_questions)),
            Cell::new(r.finish_reason),
            Cell::new(r.started_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn show(
    id: String,
    format: String,
    output: Option<PathBuf>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let (config, repo) = super::open_repository(config_path.as_deref())?;
    let result = repo
        .fetch_result(&id)
        .await
        .with_context(|| format!("cannot load result {id}"))?;
    check_result_owner(&result, &config.user.to_user())?;

    match format.as_str() {
        "markdown" | "md" => println!("{}", result.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_result(&result),
    }

    if let Some(path) = output {
        result.save_json(&path)?;
        println!("Saved to {}", path.display());
    }
    Ok(())
}

pub async fn delete(id: String, config_path: Option<PathBuf>) -> Result<()> {
    let (config, repo) = super::open_repository(config_path.as_deref())?;
    let result = repo
        .fetch_result(&id)
        .await
        .with_context(|| format!("cannot load result {id}"))?;
    check_result_owner(&result, &config.user.to_user())?;

    repo.delete_result(&id).await?;
    println!("Deleted result {id}");
    Ok(())
}

pub async fn stats(test: Option<String>, format: String, config_path: Option<PathBuf>) -> Result<()> {
    let (config, repo) = super::open_repository(config_path.as_deref())?;
    let results = own_results(&repo, &config.user.id, test.as_deref()).await?;

    let Some(stats) = history_stats(&results) else {
        println!("No results yet.");
        return Ok(());
    };

    if matches!(format.as_str(), "markdown" | "md") {
        println!("{}", stats.to_markdown());
        return Ok(());
    }

    println!(
        "Attempts: {}  Best: {:.1}  Mean: {:.1}  Latest: {:.1}",
        stats.attempts, stats.best_score, stats.mean_score, stats.latest_score
    );
    let mut table = Table::new();
    table.set_header(vec!["Block", "Attempts", "Mean"]);
    for s in stats.per_block.values() {
        table.add_row(vec![
            Cell::new(&s.name),
            Cell::new(s.attempts),
            Cell::new(format!("{:.1}%", s.mean_percentage)),
        ]);
    }
    println!("{table}");
    Ok(())
}
