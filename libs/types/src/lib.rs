//! Types library for the custody core
//!
//! Core type definitions shared by the contracts crate and the deployment
//! tooling, so that identities and amounts mean the same thing everywhere.
//!
//! # Modules
//! - `ids`: Identities (`Address`) and transaction identifiers (`TxId`)
//! - `units`: Smallest-unit amounts and human-readable conversion
//! - `errors`: Error taxonomy for parsing identities and amounts

pub mod errors;
pub mod ids;
pub mod units;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::ids::*;
    pub use crate::units::*;
}
