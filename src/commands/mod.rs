//! Subcommand implementations.

pub mod budget_class;
pub mod budget_client;
pub mod create;
pub mod list;
pub mod parser;
