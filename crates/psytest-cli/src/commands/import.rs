//! The `psytest import` command.

use std::path::PathBuf;

use anyhow::{Context, Result};

use psytest_core::parser::validate_bank;

pub async fn execute(bank_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let banks = super::load_banks(&bank_path)?;
    if banks.is_empty() {
        anyhow::bail!("no question banks found at {}", bank_path.display());
    }

    let (_, repo) = super::open_repository(config_path.as_deref())?;

    let mut rejected = 0;
    for bank in &banks {
        for w in validate_bank(bank) {
            let item = w.item.as_deref().unwrap_or("-");
            println!("  [{item}] WARNING: {}", w.message);
        }

        let summary = repo
            .import_bank(bank)
            .await
            .with_context(|| format!("failed to import bank '{}'", bank.id))?;
        println!(
            "Imported {}: {} created, {} updated, {} rejected",
            bank.name,
            summary.created,
            summary.updated,
            summary.rejected.len()
        );
        for (id, reason) in &summary.rejected {
            println!("  [{id}] REJECTED: {reason}");
        }
        rejected += summary.rejected.len();
    }

    if rejected > 0 {
        println!("\n{rejected} record(s) were not imported.");
    }
    Ok(())
}
