//! # GCP Budget CSV
//!
//! Turns tabular or JSON budget descriptions into Cloud Billing budgets.
//!
//! This library provides:
//! - A tolerant tabular reader for budget and threshold files
//! - Per-row validation and threshold resolution that never aborts a batch
//! - Budget assembly (money, thresholds, scope filter, notification rule)
//! - A trait-based billing client with a REST implementation
//!
//! ## Pipeline
//!
//! ```text
//!   budgets file ──► BatchInput ──► validate_rows ──► resolve_row (per row)
//!                                                          │
//!                                                          ▼
//!                                                      assemble
//!                                                          │
//!                                                          ▼
//!                                   create_budgets ◄── BatchBuild
//!                                         │
//!                                         ▼
//!                                   BillingClient
//! ```
//!
//! ## Modules
//! - `input`: tabular parsing and raw rows
//! - `budget`: budget domain types and the assembler
//! - `resolve`: row to budget, with threshold precedence
//! - `batch`: structural validation and concurrent submission
//! - `client`: billing API client and credentials
//! - `config`: file and environment configuration

pub mod batch;
pub mod budget;
pub mod client;
pub mod config;
pub mod error;
pub mod input;
pub mod resolve;

pub use batch::{build_budgets, create_budgets, BatchBuild, BatchInput, CreateReport};
pub use config::Config;
pub use error::{BudgetError, Result};
