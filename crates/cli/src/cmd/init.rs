//! Initialize a keeper repository

use crate::config::{self, KeepConfig, RetentionConfig, SnapshotConfig};
use crate::util::KEEP_DIR;
use anyhow::{Context, Result};
use journal::PolicyKind;
use owo_colors::{OwoColorize, Stream::Stdout};

pub fn run(policy: PolicyKind, keep: i64, no_durable: bool) -> Result<()> {
    let current_dir = std::env::current_dir()?;
    let keep_dir = current_dir.join(KEEP_DIR);

    if keep_dir.exists() {
        anyhow::bail!("Repository already initialized at {}", keep_dir.display());
    }

    let config = KeepConfig {
        retention: RetentionConfig { policy, keep },
        snapshots: SnapshotConfig {
            durable: !no_durable,
        },
    };
    // Validate before touching the filesystem
    config
        .build_policy()
        .context("Invalid retention configuration")?;

    std::fs::create_dir_all(keep_dir.join("journal"))
        .context("Failed to create .keep directory")?;
    config::save(&keep_dir, &config)?;

    println!(
        "{} Initialized repository at {}",
        "✓".if_supports_color(Stdout, |t| t.green()),
        current_dir.display().to_string().if_supports_color(Stdout, |t| t.cyan())
    );
    println!(
        "  policy:    {}",
        policy.if_supports_color(Stdout, |t| t.yellow())
    );
    if policy == PolicyKind::KeepLastN {
        println!("  keep:      {}", keep);
    }
    println!("  snapshots: {}", if config.snapshots.durable { "durable" } else { "in-memory" });

    Ok(())
}
