// src/commands/config.rs
//! Configuration commands

use anyhow::{Context as _, Result};
use txplan::Context;

/// Print the effective configuration
pub fn cmd_show_config(ctx: &Context) -> Result<()> {
    let text = ctx
        .config()
        .to_toml()
        .context("Failed to serialize configuration")?;
    print!("{}", text);
    Ok(())
}
