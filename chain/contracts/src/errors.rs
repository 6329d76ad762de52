//! Contract-specific error types
//!
//! Error taxonomy for the authorization manager, the vault, and the execution
//! environment that hosts them. Every variant is a hard failure of the single
//! call that produced it.

use thiserror::Error;
use types::ids::Address;
use types::units::Amount;

/// Authorization manager errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("Authorization manager already initialized")]
    AlreadyInitialized,

    #[error("Authorization manager not initialized")]
    NotInitialized,

    #[error("Unauthorized caller: {caller} is not the registered vault")]
    UnauthorizedCaller { caller: Address },

    #[error("Unauthorized: {caller} is not the owner")]
    NotOwner { caller: Address },

    #[error("Zero address is not a valid identity")]
    ZeroAddress,

    #[error("No authorization manager deployed at {address}")]
    UnknownManager { address: Address },
}

/// Vault-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Vault already initialized")]
    AlreadyInitialized,

    #[error("Vault not initialized")]
    NotInitialized,

    #[error("Unauthorized: withdrawal denied")]
    Unauthorized,

    #[error("Unauthorized: {caller} is not the deployer")]
    NotDeployer { caller: Address },

    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: Amount, available: Amount },

    #[error("Deposit amount must be positive")]
    ZeroValueDeposit,

    #[error("Withdrawal amount must be positive")]
    ZeroValueWithdrawal,

    #[error("Transfer failed: {reason}")]
    TransferFailed { reason: String },

    #[error("Reentrancy detected")]
    Reentrancy,

    #[error("Arithmetic overflow in balance calculation")]
    Overflow,

    #[error("Zero address is not a valid identity")]
    ZeroAddress,

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),
}

/// Execution environment errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("No contract of the expected kind at {address}")]
    UnknownContract { address: Address },

    #[error("Insufficient funds at {address}: required {required}, available {available}")]
    InsufficientFunds {
        address: Address,
        required: Amount,
        available: Amount,
    },

    #[error("Call depth exceeded (max {max})")]
    CallDepthExceeded { max: usize },

    #[error("Transfer rejected by recipient: {reason}")]
    Rejected { reason: String },

    #[error("Arithmetic overflow in account balance")]
    Overflow,

    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),
}

impl ChainError {
    /// The vault error carried by this failure, if any.
    pub fn as_vault_error(&self) -> Option<&VaultError> {
        match self {
            ChainError::Vault(e) => Some(e),
            _ => None,
        }
    }
}
