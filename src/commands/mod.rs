// src/commands/mod.rs
//! Command handlers for the txplan CLI

mod config;
mod plan;

pub use config::cmd_show_config;
pub use plan::{PlanArgs, cmd_plan};
