//! Listing commands for the store.

use super::open_store;
use anyhow::Result;
use console::style;
use harness_core::{Artifact, ArtifactKind};
use std::path::Path;

pub fn accounts(dir: &Path) -> Result<()> {
    let (_lock, store) = open_store(dir)?;
    let accounts = store.load_accounts()?;

    if accounts.is_empty() {
        println!("No synced accounts");
        return Ok(());
    }

    println!("{}", style("Accounts:").bold());
    for account in accounts {
        let marker = if account.synced {
            style("synced").green()
        } else {
            style("stale").yellow()
        };
        println!(
            "  {:<12} {}  nonce={} balance={}  [{}]",
            account.role,
            account.identity.address,
            account.state.nonce,
            account.state.balance,
            marker
        );
    }
    Ok(())
}

pub fn tokens(dir: &Path) -> Result<()> {
    list(dir, ArtifactKind::Token, "Tokens:")
}

pub fn addresses(dir: &Path) -> Result<()> {
    list(dir, ArtifactKind::Address, "Addresses:")
}

pub fn breadcrumbs(dir: &Path) -> Result<()> {
    list(dir, ArtifactKind::Breadcrumb, "Breadcrumbs:")
}

fn list(dir: &Path, kind: ArtifactKind, title: &str) -> Result<()> {
    let (_lock, store) = open_store(dir)?;
    let entries = store.list(kind)?;

    if entries.is_empty() {
        println!("No {} artifacts", kind);
        return Ok(());
    }

    println!("{}", style(title).bold());
    let width = name_width(entries.iter().map(|(name, _)| name.as_str()));
    for (name, artifact) in entries {
        let value = match &artifact {
            Artifact::Token(token) => format!(
                "{} ({} decimals, supply {})",
                style(&token.identifier).cyan(),
                token.decimals,
                token.supply
            ),
            Artifact::Address(address) => style(address).cyan().to_string(),
            Artifact::Breadcrumb(value) => {
                format!("{} {}", style(value.type_name()).dim(), value)
            }
        };
        println!("  {:<width$}  {}", name, value, width = width);
    }
    Ok(())
}

/// Display width of the widest name, in characters.
fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(|name| name.chars().count()).max().unwrap_or(0)
}
