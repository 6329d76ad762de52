//! Shared security primitives for the custody components
//!
//! Provides the reentrancy lock held by the vault across outbound transfers,
//! the explicit owner role of the authorization manager, and the one-time
//! peer link both components use for the initialization handshake.

use serde::{Deserialize, Serialize};
use types::ids::Address;

use crate::events::OwnershipTransferred;

/// Reentrancy guard preventing nested entry into a protected operation.
///
/// The vault acquires the guard after its checks pass and releases it once
/// the outbound transfer settled, whichever way it went.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReentrancyGuard {
    locked: bool,
}

impl ReentrancyGuard {
    /// Create a new unlocked guard.
    pub fn new() -> Self {
        Self { locked: false }
    }

    /// Acquire the guard. Returns `false` if already locked (reentrancy attempt).
    pub fn acquire(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    /// Release the guard.
    pub fn release(&mut self) {
        self.locked = false;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// Single administrator identity with explicit, event-emitting transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownable {
    owner: Address,
}

impl Ownable {
    pub fn new(owner: Address) -> Self {
        Self { owner }
    }

    pub fn is_owner(&self, caller: &Address) -> bool {
        self.owner == *caller
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Move ownership to `new_owner`.
    ///
    /// Returns `None` when `caller` is not the current owner; the caller maps
    /// that to its own error type. Zero-address checks belong to the caller.
    pub fn transfer(&mut self, caller: &Address, new_owner: Address) -> Option<OwnershipTransferred> {
        if !self.is_owner(caller) {
            return None;
        }
        let previous_owner = std::mem::replace(&mut self.owner, new_owner);
        Some(OwnershipTransferred {
            previous_owner,
            new_owner,
        })
    }
}

/// Outcome of a failed link attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    AlreadyLinked,
    ZeroAddress,
}

/// Write-once reference to a peer component, stored as its address.
///
/// Unset until the handshake; immutable afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerLink {
    peer: Option<Address>,
}

impl PeerLink {
    pub fn new() -> Self {
        Self { peer: None }
    }

    /// Set the peer. A second call fails even with the same address.
    pub fn link(&mut self, peer: Address) -> Result<(), LinkError> {
        if self.peer.is_some() {
            return Err(LinkError::AlreadyLinked);
        }
        if peer.is_zero() {
            return Err(LinkError::ZeroAddress);
        }
        self.peer = Some(peer);
        Ok(())
    }

    pub fn peer(&self) -> Option<Address> {
        self.peer
    }

    pub fn is_linked(&self) -> bool {
        self.peer.is_some()
    }

    pub fn is(&self, candidate: &Address) -> bool {
        self.peer.as_ref() == Some(candidate)
    }
}
