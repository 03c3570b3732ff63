//! Show configuration

use crate::config;
use crate::util::{self, KEEP_DIR};
use anyhow::{Context, Result};
use owo_colors::{OwoColorize, Stream::Stdout};

pub fn run() -> Result<()> {
    let root = util::find_repo_root().context("Failed to find repository")?;
    let keep_dir = root.join(KEEP_DIR);
    let config = config::load(&keep_dir)?;

    println!("{}", "Configuration".if_supports_color(Stdout, |t| t.bold()));
    println!(
        "{}: {}\n",
        "Location".if_supports_color(Stdout, |t| t.dimmed()),
        config::config_file_path(&keep_dir)
            .display()
            .if_supports_color(Stdout, |t| t.dimmed())
    );
    print!("{}", toml::to_string_pretty(&config).context("Failed to render configuration")?);

    Ok(())
}
