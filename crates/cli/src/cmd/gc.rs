//! Re-apply retention

use crate::util::{self, Repo};
use anyhow::Result;
use owo_colors::{OwoColorize, Stream::Stdout};

pub fn run() -> Result<()> {
    // Opening runs on_init, which applies the configured retention
    let repo = Repo::open()?;
    let report = repo.journal.startup_report();

    println!("{}", "GC Complete".if_supports_color(Stdout, |t| t.style(owo_colors::Style::new().green().bold())));
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if report.deleted.is_empty() && report.failed.is_empty() {
        println!(
            "{}",
            "No garbage found - nothing to reclaim".if_supports_color(Stdout, |t| t.dimmed())
        );
    } else {
        println!(
            "Commits deleted:     {}",
            report.deleted.len().if_supports_color(Stdout, |t| t.yellow())
        );
        for failure in &report.failed {
            println!("{} {}", "warning:".if_supports_color(Stdout, |t| t.yellow()), failure);
        }
    }

    println!();
    println!("Commits retained:    {}", repo.journal.count());
    println!("Pinned generations:  {}", repo.guard.pinned_generations().len());
    println!(
        "Repository size:     {}",
        util::format_size(util::calculate_dir_size(&repo.keep_dir())?).if_supports_color(Stdout, |t| t.green())
    );

    Ok(())
}
