//! Contract events
//!
//! Events are immutable records emitted by contract operations and collected
//! by the execution environment into its log.

use serde::{Deserialize, Serialize};
use types::ids::Address;
use types::units::Amount;

/// Which side of the handshake a component plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    AuthorizationManager,
    SecureVault,
}

/// A component completed its half of the initialization handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Initialized {
    pub component: ComponentKind,
    pub peer: Address,
}

/// Value received by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    pub depositor: Address,
    pub amount: Amount,
    pub balance_after: Amount,
}

/// Authorized value released by the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub actor: Address,
    pub recipient: Address,
    pub amount: Amount,
    pub balance_after: Amount,
}

/// Actor granted withdrawal permission, optionally capped per call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationGranted {
    pub actor: Address,
    pub limit: Option<Amount>,
}

/// Actor's withdrawal permission revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationRevoked {
    pub actor: Address,
}

/// Administrator role moved to a new identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTransferred {
    pub previous_owner: Address,
    pub new_owner: Address,
}

/// Enum wrapper for all contract events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractEvent {
    Initialized(Initialized),
    Deposit(Deposit),
    Withdrawal(Withdrawal),
    AuthorizationGranted(AuthorizationGranted),
    AuthorizationRevoked(AuthorizationRevoked),
    OwnershipTransferred(OwnershipTransferred),
}
