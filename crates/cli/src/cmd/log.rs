//! Show surviving commits

use crate::util::{self, Repo};
use anyhow::Result;
use journal::Generation;
use owo_colors::{OwoColorize, Stream::Stdout};
use serde::Serialize;

#[derive(Serialize)]
struct LogEntry<'a> {
    generation: Generation,
    ts_unix_ms: u64,
    message: &'a str,
    pins: usize,
}

pub fn run(json: bool) -> Result<()> {
    let repo = Repo::open()?;
    let commits = repo.journal.list();

    if json {
        let entries: Vec<LogEntry> = commits
            .iter()
            .rev()
            .map(|meta| LogEntry {
                generation: meta.generation,
                ts_unix_ms: meta.ts_unix_ms,
                message: &meta.message,
                pins: repo.guard.ref_count(meta.generation),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if commits.is_empty() {
        println!("{}", "No commits yet".if_supports_color(Stdout, |t| t.dimmed()));
        return Ok(());
    }

    for meta in commits.iter().rev() {
        util::display_commit(meta, repo.guard.ref_count(meta.generation));
    }

    Ok(())
}
