//! Initialize a run directory.

use anyhow::{Context, Result};
use console::style;
use harness_core::{Config, CONFIG_FILE};
use std::path::Path;

/// Writes a `session.toml` template into `dir`.
pub fn run(dir: &Path, network: &str, force: bool) -> Result<()> {
    let path = dir.join(CONFIG_FILE);
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists. Use --force to overwrite it.",
            path.display()
        );
    }

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let config = Config::template(network);
    config
        .save(dir)
        .context("Failed to write session configuration")?;

    println!(
        "{} Wrote {}",
        style("✓").green(),
        style(path.display()).cyan()
    );
    println!();
    println!("Network: {}", config.network.name);
    println!("Users:");
    for user in &config.users {
        println!("  {} (key {})", user.role, user.key.as_deref().unwrap_or("-"));
    }
    println!();
    println!("Fill in each user's address before the first run.");

    Ok(())
}
