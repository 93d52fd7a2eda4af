//! CLI subcommand implementations for the quoteshot binary.

pub mod capture_cmd;
pub mod doctor;
pub mod output;
pub mod rules_cmd;
