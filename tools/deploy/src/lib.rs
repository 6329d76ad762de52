//! Deployment orchestration for the custody core
//!
//! Runs the deployment protocol against an execution environment and
//! persists the resulting identities for operators and other tooling.
//!
//! # Modules
//! - `config`: Command-line / environment configuration
//! - `deployment`: Protocol steps, deployment record, summary

pub mod config;
pub mod deployment;

/// Deployment record schema version
pub const VERSION: &str = "1.0.0";
