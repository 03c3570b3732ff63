//! Release a snapshot

use crate::util::Repo;
use anyhow::{Context, Result};
use journal::Error;
use owo_colors::{OwoColorize, Stream::Stdout};
use ulid::Ulid;

pub fn run(id: &str) -> Result<()> {
    let id = Ulid::from_string(id).with_context(|| format!("Invalid snapshot id '{}'", id))?;

    let repo = Repo::open()?;
    let handle = repo
        .guard
        .find(&id)
        .ok_or(Error::UnknownSnapshot { id })?;

    repo.guard
        .release(&handle)
        .context("Failed to release snapshot")?;

    let remaining = repo.guard.ref_count(handle.generation);
    println!(
        "{} Released snapshot {} (generation {}, {} remaining)",
        "✓".if_supports_color(Stdout, |t| t.green()),
        id.to_string().if_supports_color(Stdout, |t| t.cyan()),
        handle.generation.to_string().if_supports_color(Stdout, |t| t.yellow()),
        remaining
    );
    if remaining == 0 {
        println!(
            "{}",
            "Generation becomes eligible for deletion on the next commit or gc"
                .if_supports_color(Stdout, |t| t.dimmed())
        );
    }

    Ok(())
}
