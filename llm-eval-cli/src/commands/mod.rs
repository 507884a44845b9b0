//! Subcommand implementations

pub mod auth;
pub mod config;
pub mod datasets;
pub mod experiments;
pub mod parameters;
pub mod projects;
pub mod report;
pub mod wizard;

use anyhow::{Context as _, Result};

/// Asks before a destructive action unless `force` is set.
pub(crate) fn confirm(prompt: &str, force: bool) -> Result<bool> {
    if force {
        return Ok(true);
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to get confirmation")
}
