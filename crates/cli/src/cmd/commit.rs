//! Record a commit

use crate::util::Repo;
use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream::Stdout};

pub fn run(message: &str) -> Result<()> {
    let repo = Repo::open()?;

    let (meta, report) = repo
        .journal
        .commit(message)
        .context("Failed to record commit")?;

    println!(
        "{} Committed generation {}",
        "✓".if_supports_color(Stdout, |t| t.green()),
        meta.generation.if_supports_color(Stdout, |t| t.yellow())
    );

    if !report.deleted.is_empty() {
        let deleted: Vec<String> = report.deleted.iter().map(|g| g.to_string()).collect();
        println!(
            "  reclaimed: {}",
            deleted.join(", ").if_supports_color(Stdout, |t| t.dimmed())
        );
    }
    for failure in &report.failed {
        println!("  {} {}", "warning:".if_supports_color(Stdout, |t| t.yellow()), failure);
    }

    Ok(())
}
