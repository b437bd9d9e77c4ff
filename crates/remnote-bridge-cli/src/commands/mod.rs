//! CLI commands.

pub mod serve;
pub mod status_check;
