//! Take and list snapshots

use crate::util::Repo;
use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream::Stdout};

pub fn run() -> Result<()> {
    let repo = Repo::open()?;

    if !repo.config.snapshots.durable {
        println!(
            "{}",
            "Note: snapshots are in-memory; this one ends when the command exits"
                .if_supports_color(Stdout, |t| t.yellow())
        );
    }

    let handle = repo.guard.snapshot().context("Failed to take snapshot")?;

    println!(
        "{} Snapshot {} pins generation {}",
        "✓".if_supports_color(Stdout, |t| t.green()),
        handle.id.to_string().if_supports_color(Stdout, |t| t.cyan()),
        handle.generation.to_string().if_supports_color(Stdout, |t| t.yellow())
    );
    println!(
        "{}",
        format!("Release with: keep release {}", handle.id)
            .if_supports_color(Stdout, |t| t.dimmed())
    );

    Ok(())
}

pub fn run_list() -> Result<()> {
    let repo = Repo::open()?;
    let snapshots = repo.guard.snapshots();

    if snapshots.is_empty() {
        println!(
            "{}",
            "No outstanding snapshots".if_supports_color(Stdout, |t| t.dimmed())
        );
        return Ok(());
    }

    for handle in snapshots {
        println!(
            "{} generation {}",
            handle.id.to_string().if_supports_color(Stdout, |t| t.cyan()),
            handle.generation.to_string().if_supports_color(Stdout, |t| t.yellow())
        );
    }

    Ok(())
}
