//! Access-controlled value custody
//!
//! This crate implements the two-component custody core: an authorization
//! manager that decides who may move value out, and a secure vault that holds
//! value and consults the manager before releasing any of it. The two are
//! constructed independently and linked by a one-time handshake.
//!
//! # Modules
//! - `errors`: Contract-specific error types
//! - `events`: Events emitted by both components
//! - `security`: Reentrancy guard, owner role, one-time peer link
//! - `authorization`: Withdrawal policy and decisions (`AuthorizationManager`)
//! - `vault`: Pooled custody, deposits, gated withdrawals (`SecureVault`)
//! - `chain`: In-process execution environment with atomic call frames
//!
//! # Version
//! v0.1.0

pub mod authorization;
pub mod chain;
pub mod errors;
pub mod events;
pub mod security;
pub mod vault;

/// Contract ABI version, frozen after release
pub const CONTRACT_ABI_VERSION: &str = "1.0.0";
