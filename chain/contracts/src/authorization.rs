//! Authorization Manager: withdrawal policy for a single linked vault
//!
//! Holds the per-actor withdrawal policy and answers decision queries, but
//! only for the vault it was linked to during the initialization handshake:
//! - One-time link to the vault identity
//! - Owner-only grant / revoke, with an optional per-call amount cap
//! - Explicit, event-emitting ownership transfer
//! - Side-effect-free decisions (stateless policy lookup)

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;
use types::ids::Address;
use types::units::Amount;

use crate::errors::AuthorizationError;
use crate::events::{
    AuthorizationGranted, AuthorizationRevoked, ComponentKind, ContractEvent, Initialized,
};
use crate::security::{LinkError, Ownable, PeerLink};

/// Kind of value movement a decision is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Withdraw,
}

/// Policy entry for one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Permission {
    /// May withdraw; `limit` caps the amount of any single withdrawal.
    Authorized { limit: Option<Amount> },
    /// Explicitly revoked. Equivalent to no entry for decisions.
    Revoked,
}

impl Permission {
    fn allows(&self, amount: Amount) -> bool {
        match self {
            Permission::Authorized { limit } => limit.map_or(true, |cap| amount <= cap),
            Permission::Revoked => false,
        }
    }
}

/// Source of withdrawal decisions as seen by the vault.
///
/// The vault names its manager by address only; whoever hosts both
/// components resolves that address and forwards the query. Crate-private:
/// decisions leave the manager only through a vault's withdrawal path.
pub(crate) trait AuthorizationOracle {
    fn is_authorized(
        &self,
        manager: &Address,
        caller: &Address,
        actor: &Address,
        action: Action,
        amount: Amount,
    ) -> Result<bool, AuthorizationError>;
}

impl AuthorizationOracle for HashMap<Address, AuthorizationManager> {
    fn is_authorized(
        &self,
        manager: &Address,
        caller: &Address,
        actor: &Address,
        action: Action,
        amount: Amount,
    ) -> Result<bool, AuthorizationError> {
        self.get(manager)
            .ok_or(AuthorizationError::UnknownManager { address: *manager })?
            .is_authorized(caller, actor, action, amount)
    }
}

/// Authorization decision component.
#[derive(Debug, Clone)]
pub struct AuthorizationManager {
    address: Address,
    owner: Ownable,
    vault: PeerLink,
    policy: HashMap<Address, Permission>,
    /// Emitted events log (append-only until drained)
    events: Vec<ContractEvent>,
}

impl AuthorizationManager {
    /// Construct an unlinked manager. `owner` becomes the administrator.
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner: Ownable::new(owner),
            vault: PeerLink::new(),
            policy: HashMap::new(),
            events: Vec::new(),
        }
    }

    // ───────────────────────── Handshake ─────────────────────────

    /// Link this manager to its vault. Owner-only, exactly once.
    pub fn initialize(
        &mut self,
        caller: &Address,
        vault: Address,
    ) -> Result<ContractEvent, AuthorizationError> {
        if self.vault.is_linked() {
            return Err(AuthorizationError::AlreadyInitialized);
        }
        self.ensure_owner(caller)?;

        self.vault.link(vault).map_err(|e| match e {
            LinkError::AlreadyLinked => AuthorizationError::AlreadyInitialized,
            LinkError::ZeroAddress => AuthorizationError::ZeroAddress,
        })?;
        debug!(manager = %self.address, %vault, "authorization manager linked");

        Ok(self.emit(ContractEvent::Initialized(Initialized {
            component: ComponentKind::AuthorizationManager,
            peer: vault,
        })))
    }

    pub fn is_initialized(&self) -> bool {
        self.vault.is_linked()
    }

    // ───────────────────────── Decisions ─────────────────────────

    /// Decide whether `actor` may perform `action` for `amount`.
    ///
    /// Only the linked vault may ask. Never mutates state.
    pub(crate) fn is_authorized(
        &self,
        caller: &Address,
        actor: &Address,
        action: Action,
        amount: Amount,
    ) -> Result<bool, AuthorizationError> {
        if !self.vault.is_linked() {
            return Err(AuthorizationError::NotInitialized);
        }
        if !self.vault.is(caller) {
            return Err(AuthorizationError::UnauthorizedCaller { caller: *caller });
        }

        let decision = match action {
            Action::Withdraw => self
                .policy
                .get(actor)
                .map_or(false, |permission| permission.allows(amount)),
        };
        debug!(%actor, ?action, amount, decision, "authorization decision");
        Ok(decision)
    }

    // ───────────────────────── Policy Administration ─────────────────────────

    /// Authorize `actor` to withdraw any amount. Owner-only.
    pub fn grant_authorization(
        &mut self,
        caller: &Address,
        actor: Address,
    ) -> Result<ContractEvent, AuthorizationError> {
        self.set_authorized(caller, actor, None)
    }

    /// Authorize `actor` to withdraw at most `limit` per call. Owner-only.
    pub fn grant_authorization_with_limit(
        &mut self,
        caller: &Address,
        actor: Address,
        limit: Amount,
    ) -> Result<ContractEvent, AuthorizationError> {
        self.set_authorized(caller, actor, Some(limit))
    }

    /// Revoke `actor`'s permission. Owner-only.
    pub fn revoke_authorization(
        &mut self,
        caller: &Address,
        actor: Address,
    ) -> Result<ContractEvent, AuthorizationError> {
        self.ensure_owner(caller)?;
        self.policy.insert(actor, Permission::Revoked);
        debug!(manager = %self.address, %actor, "authorization revoked");

        Ok(self.emit(ContractEvent::AuthorizationRevoked(AuthorizationRevoked {
            actor,
        })))
    }

    /// Current policy entry for `actor`, if any.
    pub fn permission(&self, actor: &Address) -> Option<Permission> {
        self.policy.get(actor).copied()
    }

    fn set_authorized(
        &mut self,
        caller: &Address,
        actor: Address,
        limit: Option<Amount>,
    ) -> Result<ContractEvent, AuthorizationError> {
        self.ensure_owner(caller)?;
        if actor.is_zero() {
            return Err(AuthorizationError::ZeroAddress);
        }
        self.policy.insert(actor, Permission::Authorized { limit });
        debug!(manager = %self.address, %actor, ?limit, "authorization granted");

        Ok(self.emit(ContractEvent::AuthorizationGranted(AuthorizationGranted {
            actor,
            limit,
        })))
    }

    // ───────────────────────── Ownership ─────────────────────────

    /// Hand the administrator role to `new_owner`.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> Result<ContractEvent, AuthorizationError> {
        self.ensure_owner(caller)?;
        if new_owner.is_zero() {
            return Err(AuthorizationError::ZeroAddress);
        }
        let event = self
            .owner
            .transfer(caller, new_owner)
            .ok_or(AuthorizationError::NotOwner { caller: *caller })?;
        debug!(
            manager = %self.address,
            previous = %event.previous_owner,
            new = %event.new_owner,
            "ownership transferred"
        );

        Ok(self.emit(ContractEvent::OwnershipTransferred(event)))
    }

    pub fn owner(&self) -> Address {
        self.owner.owner()
    }

    // ───────────────────────── Accessors ─────────────────────────

    pub fn address(&self) -> Address {
        self.address
    }

    /// The linked vault, once initialized.
    pub fn vault(&self) -> Option<Address> {
        self.vault.peer()
    }

    pub fn events(&self) -> &[ContractEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<ContractEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Internal ─────────────────────────

    fn ensure_owner(&self, caller: &Address) -> Result<(), AuthorizationError> {
        if !self.owner.is_owner(caller) {
            return Err(AuthorizationError::NotOwner { caller: *caller });
        }
        Ok(())
    }

    fn emit(&mut self, event: ContractEvent) -> ContractEvent {
        self.events.push(event.clone());
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Address {
        Address::from_label("admin")
    }

    fn vault() -> Address {
        Address::from_label("vault")
    }

    fn setup_manager() -> AuthorizationManager {
        let mut manager = AuthorizationManager::new(Address::from_label("manager"), admin());
        manager.initialize(&admin(), vault()).unwrap();
        manager
    }

    // ─── Initialization tests ───

    #[test]
    fn test_initialize_links_vault() {
        let manager = setup_manager();
        assert!(manager.is_initialized());
        assert_eq!(manager.vault(), Some(vault()));
        assert!(matches!(manager.events()[0], ContractEvent::Initialized(_)));
    }

    #[test]
    fn test_initialize_twice_fails_regardless_of_argument() {
        let mut manager = setup_manager();
        assert_eq!(
            manager.initialize(&admin(), vault()),
            Err(AuthorizationError::AlreadyInitialized)
        );
        assert_eq!(
            manager.initialize(&Address::from_label("eve"), Address::from_label("other")),
            Err(AuthorizationError::AlreadyInitialized)
        );
        assert_eq!(manager.vault(), Some(vault()));
    }

    #[test]
    fn test_initialize_requires_owner() {
        let eve = Address::from_label("eve");
        let mut manager = AuthorizationManager::new(Address::from_label("manager"), admin());
        assert_eq!(
            manager.initialize(&eve, vault()),
            Err(AuthorizationError::NotOwner { caller: eve })
        );
        assert!(!manager.is_initialized());
    }

    #[test]
    fn test_initialize_rejects_zero_vault() {
        let mut manager = AuthorizationManager::new(Address::from_label("manager"), admin());
        assert_eq!(
            manager.initialize(&admin(), Address::ZERO),
            Err(AuthorizationError::ZeroAddress)
        );
    }

    // ─── Decision tests ───

    #[test]
    fn test_decision_before_initialize() {
        let manager = AuthorizationManager::new(Address::from_label("manager"), admin());
        let result = manager.is_authorized(&vault(), &admin(), Action::Withdraw, 1);
        assert_eq!(result, Err(AuthorizationError::NotInitialized));
    }

    #[test]
    fn test_decision_rejects_non_vault_caller() {
        let manager = setup_manager();
        let outsider = Address::from_label("outsider");
        let result = manager.is_authorized(&outsider, &admin(), Action::Withdraw, 1);
        assert_eq!(
            result,
            Err(AuthorizationError::UnauthorizedCaller { caller: outsider })
        );
    }

    #[test]
    fn test_unknown_actor_denied() {
        let manager = setup_manager();
        let actor = Address::from_label("stranger");
        assert!(!manager
            .is_authorized(&vault(), &actor, Action::Withdraw, 1)
            .unwrap());
    }

    #[test]
    fn test_grant_and_revoke() {
        let mut manager = setup_manager();
        let actor = Address::from_label("alice");

        manager.grant_authorization(&admin(), actor).unwrap();
        assert!(manager
            .is_authorized(&vault(), &actor, Action::Withdraw, u128::MAX)
            .unwrap());

        manager.revoke_authorization(&admin(), actor).unwrap();
        assert!(!manager
            .is_authorized(&vault(), &actor, Action::Withdraw, 1)
            .unwrap());
        assert_eq!(manager.permission(&actor), Some(Permission::Revoked));
    }

    #[test]
    fn test_limit_caps_single_withdrawal() {
        let mut manager = setup_manager();
        let actor = Address::from_label("alice");
        manager
            .grant_authorization_with_limit(&admin(), actor, 100)
            .unwrap();

        assert!(manager.is_authorized(&vault(), &actor, Action::Withdraw, 100).unwrap());
        assert!(!manager.is_authorized(&vault(), &actor, Action::Withdraw, 101).unwrap());
        // Stateless: the same decision twice.
        assert!(manager.is_authorized(&vault(), &actor, Action::Withdraw, 100).unwrap());
    }

    #[test]
    fn test_policy_can_be_set_before_initialize() {
        let mut manager = AuthorizationManager::new(Address::from_label("manager"), admin());
        let actor = Address::from_label("alice");
        manager.grant_authorization(&admin(), actor).unwrap();
        manager.initialize(&admin(), vault()).unwrap();
        assert!(manager.is_authorized(&vault(), &actor, Action::Withdraw, 5).unwrap());
    }

    #[test]
    fn test_non_owner_cannot_grant_or_revoke() {
        let mut manager = setup_manager();
        let eve = Address::from_label("eve");
        assert_eq!(
            manager.grant_authorization(&eve, eve),
            Err(AuthorizationError::NotOwner { caller: eve })
        );
        assert_eq!(
            manager.revoke_authorization(&eve, admin()),
            Err(AuthorizationError::NotOwner { caller: eve })
        );
        assert_eq!(manager.permission(&eve), None);
    }

    #[test]
    fn test_grant_rejects_zero_actor() {
        let mut manager = setup_manager();
        assert_eq!(
            manager.grant_authorization(&admin(), Address::ZERO),
            Err(AuthorizationError::ZeroAddress)
        );
    }

    // ─── Ownership tests ───

    #[test]
    fn test_transfer_ownership_emits_event() {
        let mut manager = setup_manager();
        let bob = Address::from_label("bob");
        let event = manager.transfer_ownership(&admin(), bob).unwrap();
        assert!(matches!(
            event,
            ContractEvent::OwnershipTransferred(ref e) if e.previous_owner == admin() && e.new_owner == bob
        ));
        assert_eq!(manager.owner(), bob);

        // Former owner lost the role.
        assert!(manager.grant_authorization(&admin(), bob).is_err());
        assert!(manager.grant_authorization(&bob, bob).is_ok());
    }

    #[test]
    fn test_transfer_ownership_unauthorized() {
        let mut manager = setup_manager();
        let eve = Address::from_label("eve");
        assert_eq!(
            manager.transfer_ownership(&eve, eve),
            Err(AuthorizationError::NotOwner { caller: eve })
        );
        assert_eq!(
            manager.transfer_ownership(&admin(), Address::ZERO),
            Err(AuthorizationError::ZeroAddress)
        );
    }

    #[test]
    fn test_transfer_ownership_checks_owner_before_target() {
        let mut manager = setup_manager();
        let eve = Address::from_label("eve");
        assert_eq!(
            manager.transfer_ownership(&eve, Address::ZERO),
            Err(AuthorizationError::NotOwner { caller: eve })
        );
        assert_eq!(manager.owner(), admin());
        assert!(manager.events().iter().all(|e| !matches!(e, ContractEvent::OwnershipTransferred(_))));
    }

    // ─── Oracle tests ───

    #[test]
    fn test_oracle_resolves_manager_by_address() {
        let mut manager = setup_manager();
        let actor = Address::from_label("alice");
        manager.grant_authorization(&admin(), actor).unwrap();

        let address = manager.address();
        let mut registry = HashMap::new();
        registry.insert(address, manager);

        assert!(registry
            .is_authorized(&address, &vault(), &actor, Action::Withdraw, 1)
            .unwrap());

        let missing = Address::from_label("missing");
        assert_eq!(
            registry.is_authorized(&missing, &vault(), &actor, Action::Withdraw, 1),
            Err(AuthorizationError::UnknownManager { address: missing })
        );
    }

    #[test]
    fn test_drain_events() {
        let mut manager = setup_manager();
        manager
            .grant_authorization(&admin(), Address::from_label("alice"))
            .unwrap();
        assert_eq!(manager.drain_events().len(), 2);
        assert!(manager.events().is_empty());
    }
}
