//! Secure Vault: pooled custody gated by an external authorization manager
//!
//! Implements the custody side of the two-component core:
//! - Deposits from any sender, before or after the handshake
//! - Balance tracking with a per-depositor contribution record
//! - Withdrawals gated by the linked manager's decision
//! - Checks-effects-interactions: the balance is debited and the reentrancy
//!   lock taken before any value leaves; the host settles the transfer and
//!   either completes or aborts the withdrawal

use std::collections::HashMap;
use tracing::{debug, warn};
use types::ids::Address;
use types::units::Amount;

use crate::authorization::{Action, AuthorizationOracle};
use crate::errors::VaultError;
use crate::events::{ComponentKind, ContractEvent, Deposit, Initialized, Withdrawal};
use crate::security::{LinkError, PeerLink, ReentrancyGuard};

/// A withdrawal whose checks and effects are done but whose value has not
/// left the vault yet.
///
/// Produced by [`SecureVault::withdraw`] and consumed by exactly one of
/// [`SecureVault::complete_withdrawal`] or [`SecureVault::abort_withdrawal`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending withdrawal holds the vault lock until settled"]
pub struct PendingWithdrawal {
    actor: Address,
    recipient: Address,
    amount: Amount,
}

impl PendingWithdrawal {
    pub fn actor(&self) -> Address {
        self.actor
    }

    pub fn recipient(&self) -> Address {
        self.recipient
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// Core vault contract managing pooled custody.
///
/// `balance` always equals total deposits minus completed withdrawals.
#[derive(Debug, Clone)]
pub struct SecureVault {
    address: Address,
    deployer: Address,
    authorization_manager: PeerLink,
    balance: Amount,
    /// Gross amount contributed per depositor
    contributions: HashMap<Address, Amount>,
    reentrancy_guard: ReentrancyGuard,
    /// Emitted events log (append-only until drained)
    events: Vec<ContractEvent>,
}

impl SecureVault {
    /// Construct an unlinked vault at `address`, deployed by `deployer`.
    pub fn new(address: Address, deployer: Address) -> Self {
        Self {
            address,
            deployer,
            authorization_manager: PeerLink::new(),
            balance: 0,
            contributions: HashMap::new(),
            reentrancy_guard: ReentrancyGuard::new(),
            events: Vec::new(),
        }
    }

    // ───────────────────────── Handshake ─────────────────────────

    /// Link this vault to its authorization manager. Deployer-only, exactly once.
    pub fn initialize(
        &mut self,
        caller: &Address,
        authorization_manager: Address,
    ) -> Result<ContractEvent, VaultError> {
        if self.authorization_manager.is_linked() {
            return Err(VaultError::AlreadyInitialized);
        }
        if *caller != self.deployer {
            return Err(VaultError::NotDeployer { caller: *caller });
        }

        self.authorization_manager
            .link(authorization_manager)
            .map_err(|e| match e {
                LinkError::AlreadyLinked => VaultError::AlreadyInitialized,
                LinkError::ZeroAddress => VaultError::ZeroAddress,
            })?;
        debug!(vault = %self.address, manager = %authorization_manager, "vault linked");

        Ok(self.emit(ContractEvent::Initialized(Initialized {
            component: ComponentKind::SecureVault,
            peer: authorization_manager,
        })))
    }

    pub fn is_initialized(&self) -> bool {
        self.authorization_manager.is_linked()
    }

    // ───────────────────────── Deposit ─────────────────────────

    /// Accept `amount` from `depositor`. Open to anyone, linked or not.
    pub fn deposit(
        &mut self,
        depositor: Address,
        amount: Amount,
    ) -> Result<ContractEvent, VaultError> {
        if amount == 0 {
            return Err(VaultError::ZeroValueDeposit);
        }

        let balance_after = self
            .balance
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;
        let contributed = self.contributions.get(&depositor).copied().unwrap_or(0);
        let contributed_after = contributed
            .checked_add(amount)
            .ok_or(VaultError::Overflow)?;

        self.balance = balance_after;
        self.contributions.insert(depositor, contributed_after);
        debug!(vault = %self.address, %depositor, amount, balance_after, "deposit accepted");

        Ok(self.emit(ContractEvent::Deposit(Deposit {
            depositor,
            amount,
            balance_after,
        })))
    }

    // ───────────────────────── Withdraw ─────────────────────────

    /// Run the checks and effects of a withdrawal requested by `caller`.
    ///
    /// Order: linked, positive amount, valid recipient, manager decision,
    /// balance, lock. On success the balance is already debited and the lock
    /// held; the returned [`PendingWithdrawal`] must be settled.
    pub(crate) fn withdraw<O>(
        &mut self,
        caller: &Address,
        amount: Amount,
        recipient: Address,
        oracle: &O,
    ) -> Result<PendingWithdrawal, VaultError>
    where
        O: AuthorizationOracle + ?Sized,
    {
        let manager = self
            .authorization_manager
            .peer()
            .ok_or(VaultError::NotInitialized)?;
        if amount == 0 {
            return Err(VaultError::ZeroValueWithdrawal);
        }
        if recipient.is_zero() {
            return Err(VaultError::ZeroAddress);
        }

        let authorized =
            oracle.is_authorized(&manager, &self.address, caller, Action::Withdraw, amount)?;
        if !authorized {
            warn!(vault = %self.address, actor = %caller, amount, "withdrawal denied by policy");
            return Err(VaultError::Unauthorized);
        }

        if amount > self.balance {
            warn!(
                vault = %self.address,
                actor = %caller,
                amount,
                available = self.balance,
                "withdrawal exceeds balance"
            );
            return Err(VaultError::InsufficientBalance {
                required: amount,
                available: self.balance,
            });
        }

        if !self.reentrancy_guard.acquire() {
            warn!(vault = %self.address, actor = %caller, "reentrant withdrawal blocked");
            return Err(VaultError::Reentrancy);
        }

        // Effects before interactions: debit now, transfer later.
        self.balance -= amount;
        debug!(vault = %self.address, actor = %caller, %recipient, amount, "withdrawal debited");

        Ok(PendingWithdrawal {
            actor: *caller,
            recipient,
            amount,
        })
    }

    /// Settle a withdrawal whose outbound transfer succeeded.
    pub(crate) fn complete_withdrawal(&mut self, pending: PendingWithdrawal) -> ContractEvent {
        self.reentrancy_guard.release();
        debug!(
            vault = %self.address,
            recipient = %pending.recipient,
            amount = pending.amount,
            "withdrawal completed"
        );

        self.emit(ContractEvent::Withdrawal(Withdrawal {
            actor: pending.actor,
            recipient: pending.recipient,
            amount: pending.amount,
            balance_after: self.balance,
        }))
    }

    /// Undo a withdrawal whose outbound transfer failed.
    ///
    /// Restores the debited amount, releases the lock and returns the error
    /// to surface to the caller.
    pub(crate) fn abort_withdrawal(
        &mut self,
        pending: PendingWithdrawal,
        reason: impl Into<String>,
    ) -> VaultError {
        self.reentrancy_guard.release();
        let reason = reason.into();
        warn!(
            vault = %self.address,
            recipient = %pending.recipient,
            amount = pending.amount,
            %reason,
            "withdrawal transfer failed, restoring balance"
        );

        match self.balance.checked_add(pending.amount) {
            Some(restored) => {
                self.balance = restored;
                VaultError::TransferFailed { reason }
            }
            None => VaultError::Overflow,
        }
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Total value held. Available in every lifecycle state.
    pub fn get_vault_balance(&self) -> Amount {
        self.balance
    }

    /// Gross amount `depositor` has sent to the vault.
    pub fn contribution_of(&self, depositor: &Address) -> Amount {
        self.contributions.get(depositor).copied().unwrap_or(0)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn deployer(&self) -> Address {
        self.deployer
    }

    /// The linked manager, once initialized.
    pub fn authorization_manager(&self) -> Option<Address> {
        self.authorization_manager.peer()
    }

    /// Whether an outbound transfer is currently in flight.
    pub fn is_locked(&self) -> bool {
        self.reentrancy_guard.is_locked()
    }

    // ───────────────────────── Events ─────────────────────────

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: ContractEvent) -> ContractEvent {
        self.events.push(event.clone());
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authorization::AuthorizationManager;
    use crate::errors::AuthorizationError;

    fn deployer() -> Address {
        Address::from_label("deployer")
    }

    fn alice() -> Address {
        Address::from_label("alice")
    }

    fn recipient() -> Address {
        Address::from_label("recipient")
    }

    /// Linked vault/manager pair plus the registry the vault consults.
    fn setup() -> (SecureVault, HashMap<Address, AuthorizationManager>) {
        let vault_addr = Address::from_label("vault");
        let manager_addr = Address::from_label("manager");

        let mut manager = AuthorizationManager::new(manager_addr, deployer());
        manager.initialize(&deployer(), vault_addr).unwrap();
        manager.grant_authorization(&deployer(), alice()).unwrap();

        let mut vault = SecureVault::new(vault_addr, deployer());
        vault.initialize(&deployer(), manager_addr).unwrap();

        let mut registry = HashMap::new();
        registry.insert(manager_addr, manager);
        (vault, registry)
    }

    // ─── Initialization tests ───

    #[test]
    fn test_initialize_twice_fails() {
        let (mut vault, _) = setup();
        assert_eq!(
            vault.initialize(&deployer(), Address::from_label("manager")),
            Err(VaultError::AlreadyInitialized)
        );
        assert_eq!(
            vault.initialize(&alice(), Address::from_label("other")),
            Err(VaultError::AlreadyInitialized)
        );
    }

    #[test]
    fn test_initialize_requires_deployer() {
        let mut vault = SecureVault::new(Address::from_label("vault"), deployer());
        assert_eq!(
            vault.initialize(&alice(), Address::from_label("manager")),
            Err(VaultError::NotDeployer { caller: alice() })
        );
        assert!(!vault.is_initialized());
    }

    #[test]
    fn test_initialize_rejects_zero_manager() {
        let mut vault = SecureVault::new(Address::from_label("vault"), deployer());
        assert_eq!(
            vault.initialize(&deployer(), Address::ZERO),
            Err(VaultError::ZeroAddress)
        );
    }

    // ─── Deposit tests ───

    #[test]
    fn test_deposit_before_initialize() {
        let mut vault = SecureVault::new(Address::from_label("vault"), deployer());
        vault.deposit(alice(), 10).unwrap();
        assert_eq!(vault.get_vault_balance(), 10);
    }

    #[test]
    fn test_deposit_accumulates_and_records_contributions() {
        let (mut vault, _) = setup();
        let bob = Address::from_label("bob");

        vault.deposit(alice(), 1000).unwrap();
        vault.deposit(bob, 500).unwrap();
        vault.deposit(alice(), 1).unwrap();

        assert_eq!(vault.get_vault_balance(), 1501);
        assert_eq!(vault.contribution_of(&alice()), 1001);
        assert_eq!(vault.contribution_of(&bob), 500);
    }

    #[test]
    fn test_deposit_zero_amount() {
        let (mut vault, _) = setup();
        assert_eq!(vault.deposit(alice(), 0), Err(VaultError::ZeroValueDeposit));
        assert!(vault.events().iter().all(|e| !matches!(e, ContractEvent::Deposit(_))));
    }

    #[test]
    fn test_deposit_overflow_leaves_balance() {
        let (mut vault, _) = setup();
        vault.deposit(alice(), u128::MAX).unwrap();
        assert_eq!(vault.deposit(alice(), 1), Err(VaultError::Overflow));
        assert_eq!(vault.get_vault_balance(), u128::MAX);
    }

    // ─── Withdraw tests ───

    #[test]
    fn test_withdraw_before_initialize() {
        let mut vault = SecureVault::new(Address::from_label("vault"), deployer());
        vault.deposit(alice(), 10).unwrap();
        let registry: HashMap<Address, AuthorizationManager> = HashMap::new();
        assert_eq!(
            vault.withdraw(&alice(), 1, recipient(), &registry),
            Err(VaultError::NotInitialized)
        );
        assert_eq!(vault.get_vault_balance(), 10);
    }

    #[test]
    fn test_withdraw_debits_before_transfer() {
        let (mut vault, registry) = setup();
        vault.deposit(alice(), 100).unwrap();

        let pending = vault.withdraw(&alice(), 40, recipient(), &registry).unwrap();
        assert_eq!(vault.get_vault_balance(), 60);
        assert!(vault.is_locked());
        assert_eq!(pending.amount(), 40);
        assert_eq!(pending.recipient(), recipient());

        let event = vault.complete_withdrawal(pending);
        assert!(!vault.is_locked());
        assert!(matches!(
            event,
            ContractEvent::Withdrawal(ref w) if w.amount == 40 && w.balance_after == 60
        ));
    }

    #[test]
    fn test_withdraw_unauthorized_actor() {
        let (mut vault, registry) = setup();
        vault.deposit(alice(), 100).unwrap();
        let eve = Address::from_label("eve");

        assert_eq!(
            vault.withdraw(&eve, 1, eve, &registry),
            Err(VaultError::Unauthorized)
        );
        assert_eq!(vault.get_vault_balance(), 100);
        assert!(!vault.is_locked());
    }

    #[test]
    fn test_withdraw_insufficient_balance() {
        let (mut vault, registry) = setup();
        vault.deposit(alice(), 100).unwrap();

        assert_eq!(
            vault.withdraw(&alice(), 101, recipient(), &registry),
            Err(VaultError::InsufficientBalance {
                required: 101,
                available: 100
            })
        );
        assert_eq!(vault.get_vault_balance(), 100);
    }

    #[test]
    fn test_withdraw_zero_amount_and_zero_recipient() {
        let (mut vault, registry) = setup();
        vault.deposit(alice(), 100).unwrap();

        assert_eq!(
            vault.withdraw(&alice(), 0, recipient(), &registry),
            Err(VaultError::ZeroValueWithdrawal)
        );
        assert_eq!(
            vault.withdraw(&alice(), 1, Address::ZERO, &registry),
            Err(VaultError::ZeroAddress)
        );
    }

    #[test]
    fn test_withdraw_while_locked_is_reentrancy() {
        let (mut vault, registry) = setup();
        vault.deposit(alice(), 100).unwrap();

        let pending = vault.withdraw(&alice(), 10, recipient(), &registry).unwrap();
        assert_eq!(
            vault.withdraw(&alice(), 10, recipient(), &registry),
            Err(VaultError::Reentrancy)
        );
        // The nested attempt did not touch the balance.
        assert_eq!(vault.get_vault_balance(), 90);
        let _ = vault.complete_withdrawal(pending);
    }

    #[test]
    fn test_abort_restores_balance() {
        let (mut vault, registry) = setup();
        vault.deposit(alice(), 100).unwrap();

        let pending = vault.withdraw(&alice(), 30, recipient(), &registry).unwrap();
        let err = vault.abort_withdrawal(pending, "recipient rejected");
        assert_eq!(
            err,
            VaultError::TransferFailed {
                reason: "recipient rejected".to_string()
            }
        );
        assert_eq!(vault.get_vault_balance(), 100);
        assert!(!vault.is_locked());
    }

    #[test]
    fn test_manager_not_linked_back_propagates() {
        let vault_addr = Address::from_label("vault");
        let manager_addr = Address::from_label("manager");

        // Manager never initialized: only the vault side of the handshake ran.
        let manager = AuthorizationManager::new(manager_addr, deployer());
        let mut registry = HashMap::new();
        registry.insert(manager_addr, manager);

        let mut vault = SecureVault::new(vault_addr, deployer());
        vault.initialize(&deployer(), manager_addr).unwrap();
        vault.deposit(alice(), 10).unwrap();

        assert_eq!(
            vault.withdraw(&alice(), 1, recipient(), &registry),
            Err(VaultError::Authorization(AuthorizationError::NotInitialized))
        );
    }

    #[test]
    fn test_manager_linked_to_other_vault() {
        let manager_addr = Address::from_label("manager");
        let mut manager = AuthorizationManager::new(manager_addr, deployer());
        manager
            .initialize(&deployer(), Address::from_label("other-vault"))
            .unwrap();
        manager.grant_authorization(&deployer(), alice()).unwrap();
        let mut registry = HashMap::new();
        registry.insert(manager_addr, manager);

        let vault_addr = Address::from_label("vault");
        let mut vault = SecureVault::new(vault_addr, deployer());
        vault.initialize(&deployer(), manager_addr).unwrap();
        vault.deposit(alice(), 10).unwrap();

        assert_eq!(
            vault.withdraw(&alice(), 1, recipient(), &registry),
            Err(VaultError::Authorization(
                AuthorizationError::UnauthorizedCaller { caller: vault_addr }
            ))
        );
    }
}
