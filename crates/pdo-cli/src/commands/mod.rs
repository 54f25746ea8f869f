//! CLI commands

pub mod pagerduty;
pub mod vault;
