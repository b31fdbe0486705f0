//! The `psytest validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(bank_path: PathBuf) -> Result<()> {
    let banks = super::load_banks(&bank_path)?;

    let mut total_warnings = 0;

    for bank in &banks {
        println!(
            "Bank: {} ({} blocks, {} questions, {} tests)",
            bank.name,
            bank.blocks.len(),
            bank.questions.len(),
            bank.tests.len()
        );

        let warnings = psytest_core::parser::validate_bank(bank);
        for w in &warnings {
            let prefix = w
                .item
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All banks valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
