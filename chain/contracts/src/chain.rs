//! Execution environment hosting the custody components
//!
//! An in-process stand-in for the chain both contracts live on:
//! - Native value accounts and per-sender nonces for contract addresses
//! - Call frames: state is snapshotted on entry and restored when the call
//!   fails, so every operation succeeds or fails as one unit
//! - Receive hooks on recipient addresses, which may call back into the
//!   chain while value is in flight (the reentrancy surface). Hooks act
//!   through a [`CallContext`] bound to their own address.
//! - An event log keyed by transaction and emitter

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::ids::{Address, TxId};
use types::units::Amount;

use crate::authorization::AuthorizationManager;
use crate::errors::{AuthorizationError, ChainError};
use crate::events::ContractEvent;
use crate::vault::SecureVault;

/// Maximum nesting of calls, counting hooks that call back in.
pub const MAX_CALL_DEPTH: usize = 64;

/// Network metadata reported in receipts and deployment records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub network: String,
    pub chain_id: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            network: "localhost".to_string(),
            chain_id: 31337,
        }
    }
}

/// Value arriving at a hooked address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveContext {
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

/// Code that runs at a recipient when value arrives.
///
/// Returning an error rejects the transfer. The hook may issue further calls
/// through `call`, exactly like a contract's receive function, but only as
/// the recipient itself.
pub trait ReceiveHook: Send + Sync {
    fn on_receive(
        &self,
        call: &mut CallContext<'_>,
        payment: &ReceiveContext,
    ) -> Result<(), ChainError>;
}

/// Handle on the chain for code running at a contract address.
///
/// Every call made through it is sent by `sender`, the address whose code is
/// running. There is no way to pick another sender.
pub struct CallContext<'a> {
    chain: &'a mut Chain,
    sender: Address,
}

impl<'a> CallContext<'a> {
    fn new(chain: &'a mut Chain, sender: Address) -> Self {
        Self { chain, sender }
    }

    /// The address this code runs as.
    pub fn sender(&self) -> Address {
        self.sender
    }

    pub fn transfer(&mut self, to: Address, amount: Amount) -> Result<TxReceipt, ChainError> {
        self.chain.transfer(self.sender, to, amount)
    }

    pub fn withdraw(
        &mut self,
        vault: Address,
        amount: Amount,
        recipient: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.chain.withdraw(self.sender, vault, amount, recipient)
    }

    pub fn grant_authorization(
        &mut self,
        manager: Address,
        actor: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.chain.grant_authorization(self.sender, manager, actor)
    }

    pub fn revoke_authorization(
        &mut self,
        manager: Address,
        actor: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.chain.revoke_authorization(self.sender, manager, actor)
    }

    pub fn transfer_ownership(
        &mut self,
        manager: Address,
        new_owner: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.chain.transfer_ownership(self.sender, manager, new_owner)
    }

    pub fn balance_of(&self, address: &Address) -> Amount {
        self.chain.balance_of(address)
    }

    pub fn vault_balance(&self, vault: &Address) -> Result<Amount, ChainError> {
        self.chain.vault_balance(vault)
    }

    pub fn depth(&self) -> usize {
        self.chain.depth()
    }
}

/// An event together with where and when it was emitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub tx_id: TxId,
    pub emitter: Address,
    pub event: ContractEvent,
}

/// Result of a successful call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_id: TxId,
    pub executed_at: DateTime<Utc>,
    pub events: Vec<ContractEvent>,
}

/// Everything a failed frame rolls back.
#[derive(Debug, Clone, Default)]
struct WorldState {
    accounts: HashMap<Address, Amount>,
    nonces: HashMap<Address, u64>,
    managers: HashMap<Address, AuthorizationManager>,
    vaults: HashMap<Address, SecureVault>,
    logs: Vec<LogEntry>,
}

/// In-process execution environment.
///
/// Calls are serialized: each public operation runs to completion before the
/// next one starts, apart from the nested calls a receive hook makes. The
/// `caller`/`from` argument of a public operation is the signer of an
/// external transaction; contract code only ever gets a [`CallContext`].
pub struct Chain {
    config: ChainConfig,
    state: WorldState,
    receivers: HashMap<Address, Arc<dyn ReceiveHook>>,
    depth: usize,
    current_tx: TxId,
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("config", &self.config)
            .field("state", &self.state)
            .field("receivers", &self.receivers.keys().collect::<Vec<_>>())
            .field("depth", &self.depth)
            .finish()
    }
}

impl Chain {
    pub fn new(config: ChainConfig) -> Self {
        Self {
            config,
            state: WorldState::default(),
            receivers: HashMap::new(),
            depth: 0,
            current_tx: TxId::new(),
        }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    // ───────────────────────── Accounts ─────────────────────────

    /// Mint native value to an externally owned account (genesis allocation).
    pub fn fund(&mut self, address: Address, amount: Amount) -> Result<(), ChainError> {
        if self.is_contract(&address) {
            return Err(ChainError::Rejected {
                reason: format!("cannot mint directly to contract {address}"),
            });
        }
        self.credit(address, amount)?;
        debug!(%address, amount, "account funded");
        Ok(())
    }

    /// Native value held at `address`.
    pub fn balance_of(&self, address: &Address) -> Amount {
        self.state.accounts.get(address).copied().unwrap_or(0)
    }

    /// Attach a receive hook to `address`.
    ///
    /// Registration is not part of the rolled-back state. It only happens
    /// outside any call frame, since hooks cannot reach it.
    pub fn register_receiver(&mut self, address: Address, hook: Arc<dyn ReceiveHook>) {
        self.receivers.insert(address, hook);
    }

    /// Send native value. Value sent to a vault is a deposit.
    pub fn transfer(
        &mut self,
        from: Address,
        to: Address,
        amount: Amount,
    ) -> Result<TxReceipt, ChainError> {
        self.execute("transfer", |chain| chain.send_value(from, to, amount))
            .map(|(_, receipt)| receipt)
    }

    // ───────────────────────── Deployment ─────────────────────────

    pub fn deploy_authorization_manager(&mut self, deployer: Address) -> Result<Address, ChainError> {
        let (address, _) = self.execute("deploy_authorization_manager", |chain| {
            let address = chain.next_contract_address(&deployer);
            chain
                .state
                .managers
                .insert(address, AuthorizationManager::new(address, deployer));
            Ok(address)
        })?;
        info!(%address, %deployer, "authorization manager deployed");
        Ok(address)
    }

    /// Deploy a vault. Value already sitting at the new address becomes an
    /// opening deposit credited to the vault itself.
    pub fn deploy_vault(&mut self, deployer: Address) -> Result<Address, ChainError> {
        let (address, _) = self.execute("deploy_vault", |chain| {
            let address = chain.next_contract_address(&deployer);
            let mut vault = SecureVault::new(address, deployer);
            let held = chain.balance_of(&address);
            if held > 0 {
                vault.deposit(address, held)?;
                debug!(%address, held, "pre-deployment value adopted");
            }
            chain.state.vaults.insert(address, vault);
            chain.flush_vault_events(&address);
            Ok(address)
        })?;
        info!(%address, %deployer, "secure vault deployed");
        Ok(address)
    }

    // ───────────────────────── Handshake ─────────────────────────

    pub fn initialize_authorization_manager(
        &mut self,
        caller: Address,
        manager: Address,
        vault: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.call_manager("initialize_authorization_manager", manager, |m| {
            m.initialize(&caller, vault)
        })
    }

    pub fn initialize_vault(
        &mut self,
        caller: Address,
        vault: Address,
        manager: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.execute("initialize_vault", |chain| {
            chain.vault_mut(&vault)?.initialize(&caller, manager)?;
            chain.flush_vault_events(&vault);
            Ok(())
        })
        .map(|(_, receipt)| receipt)
    }

    // ───────────────────────── Policy ─────────────────────────

    pub fn grant_authorization(
        &mut self,
        caller: Address,
        manager: Address,
        actor: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.call_manager("grant_authorization", manager, |m| {
            m.grant_authorization(&caller, actor)
        })
    }

    pub fn grant_authorization_with_limit(
        &mut self,
        caller: Address,
        manager: Address,
        actor: Address,
        limit: Amount,
    ) -> Result<TxReceipt, ChainError> {
        self.call_manager("grant_authorization_with_limit", manager, |m| {
            m.grant_authorization_with_limit(&caller, actor, limit)
        })
    }

    pub fn revoke_authorization(
        &mut self,
        caller: Address,
        manager: Address,
        actor: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.call_manager("revoke_authorization", manager, |m| {
            m.revoke_authorization(&caller, actor)
        })
    }

    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        manager: Address,
        new_owner: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.call_manager("transfer_ownership", manager, |m| {
            m.transfer_ownership(&caller, new_owner)
        })
    }

    // ───────────────────────── Withdraw ─────────────────────────

    /// Withdraw `amount` from `vault` to `recipient` on behalf of `caller`.
    ///
    /// Checks and the balance debit run first, then the value moves in a
    /// nested frame, then the vault completes or aborts. Any failure reverts
    /// the whole call.
    pub fn withdraw(
        &mut self,
        caller: Address,
        vault: Address,
        amount: Amount,
        recipient: Address,
    ) -> Result<TxReceipt, ChainError> {
        self.execute("withdraw", |chain| {
            let pending = {
                let WorldState {
                    managers, vaults, ..
                } = &mut chain.state;
                let custody = vaults
                    .get_mut(&vault)
                    .ok_or(ChainError::UnknownContract { address: vault })?;
                custody.withdraw(&caller, amount, recipient, &*managers)?
            };

            match chain.send_value(vault, recipient, amount) {
                Ok(()) => {
                    let _ = chain.vault_mut(&vault)?.complete_withdrawal(pending);
                    chain.flush_vault_events(&vault);
                    Ok(())
                }
                Err(e) => {
                    let err = chain
                        .vault_mut(&vault)?
                        .abort_withdrawal(pending, e.to_string());
                    Err(err.into())
                }
            }
        })
        .map(|(_, receipt)| receipt)
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn vault_balance(&self, vault: &Address) -> Result<Amount, ChainError> {
        self.vault(vault)
            .map(SecureVault::get_vault_balance)
            .ok_or(ChainError::UnknownContract { address: *vault })
    }

    pub fn vault(&self, address: &Address) -> Option<&SecureVault> {
        self.state.vaults.get(address)
    }

    pub fn authorization_manager(&self, address: &Address) -> Option<&AuthorizationManager> {
        self.state.managers.get(address)
    }

    /// Whether the vault's accounted balance matches the value at its address.
    pub fn custody_consistent(&self, vault: &Address) -> Result<bool, ChainError> {
        Ok(self.vault_balance(vault)? == self.balance_of(vault))
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.state.logs
    }

    /// Current nesting depth; zero outside of any call.
    pub fn depth(&self) -> usize {
        self.depth
    }

    // ───────────────────────── Frames ─────────────────────────

    /// Run `op` as a call, producing a receipt of the events it emitted.
    ///
    /// Top-level calls get a fresh transaction id; nested calls share it.
    fn execute<T>(
        &mut self,
        name: &'static str,
        op: impl FnOnce(&mut Self) -> Result<T, ChainError>,
    ) -> Result<(T, TxReceipt), ChainError> {
        let top_level = self.depth == 0;
        if top_level {
            self.current_tx = TxId::new();
        }
        let start = self.state.logs.len();

        match self.transact(op) {
            Ok(value) => {
                let events = self.state.logs[start..]
                    .iter()
                    .map(|entry| entry.event.clone())
                    .collect();
                let receipt = TxReceipt {
                    tx_id: self.current_tx,
                    executed_at: Utc::now(),
                    events,
                };
                Ok((value, receipt))
            }
            Err(e) => {
                if top_level {
                    warn!(call = name, tx_id = %self.current_tx, error = %e, "transaction reverted");
                } else {
                    debug!(call = name, depth = self.depth, error = %e, "nested call reverted");
                }
                Err(e)
            }
        }
    }

    /// Snapshot, run, and restore the snapshot if `op` fails.
    fn transact<T>(
        &mut self,
        op: impl FnOnce(&mut Self) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(ChainError::CallDepthExceeded {
                max: MAX_CALL_DEPTH,
            });
        }

        let snapshot = self.state.clone();
        self.depth += 1;
        let result = op(self);
        self.depth -= 1;

        if result.is_err() {
            self.state = snapshot;
        }
        result
    }

    fn call_manager(
        &mut self,
        name: &'static str,
        manager: Address,
        op: impl FnOnce(&mut AuthorizationManager) -> Result<ContractEvent, AuthorizationError>,
    ) -> Result<TxReceipt, ChainError> {
        self.execute(name, |chain| {
            let contract = chain
                .state
                .managers
                .get_mut(&manager)
                .ok_or(ChainError::UnknownContract { address: manager })?;
            op(contract)?;
            let events = contract.drain_events();
            chain.log_events(manager, events);
            Ok(())
        })
        .map(|(_, receipt)| receipt)
    }

    // ───────────────────────── Value Movement ─────────────────────────

    /// Move value in its own frame and run whatever sits at the destination.
    fn send_value(&mut self, from: Address, to: Address, amount: Amount) -> Result<(), ChainError> {
        self.transact(|chain| {
            if chain.state.managers.contains_key(&to) {
                return Err(ChainError::Rejected {
                    reason: format!("authorization manager {to} does not accept value"),
                });
            }

            chain.debit(from, amount)?;
            chain.credit(to, amount)?;
            debug!(%from, %to, amount, "value moved");

            if let Some(vault) = chain.state.vaults.get_mut(&to) {
                vault.deposit(from, amount)?;
                chain.flush_vault_events(&to);
            } else if let Some(hook) = chain.receivers.get(&to).cloned() {
                let payment = ReceiveContext { from, to, amount };
                hook.on_receive(&mut CallContext::new(chain, to), &payment)?;
            }
            Ok(())
        })
    }

    fn debit(&mut self, address: Address, amount: Amount) -> Result<(), ChainError> {
        let available = self.balance_of(&address);
        if available < amount {
            return Err(ChainError::InsufficientFunds {
                address,
                required: amount,
                available,
            });
        }
        self.state.accounts.insert(address, available - amount);
        Ok(())
    }

    fn credit(&mut self, address: Address, amount: Amount) -> Result<(), ChainError> {
        let updated = self
            .balance_of(&address)
            .checked_add(amount)
            .ok_or(ChainError::Overflow)?;
        self.state.accounts.insert(address, updated);
        Ok(())
    }

    // ───────────────────────── Internal ─────────────────────────

    fn next_contract_address(&mut self, deployer: &Address) -> Address {
        let nonce = self.state.nonces.entry(*deployer).or_insert(0);
        let address = Address::derive_contract(deployer, *nonce);
        *nonce += 1;
        address
    }

    fn is_contract(&self, address: &Address) -> bool {
        self.state.vaults.contains_key(address) || self.state.managers.contains_key(address)
    }

    fn vault_mut(&mut self, address: &Address) -> Result<&mut SecureVault, ChainError> {
        self.state
            .vaults
            .get_mut(address)
            .ok_or(ChainError::UnknownContract { address: *address })
    }

    fn flush_vault_events(&mut self, vault: &Address) {
        let events = self
            .state
            .vaults
            .get_mut(vault)
            .map(SecureVault::drain_events)
            .unwrap_or_default();
        self.log_events(*vault, events);
    }

    fn log_events(&mut self, emitter: Address, events: Vec<ContractEvent>) {
        let tx_id = self.current_tx;
        self.state.logs.extend(events.into_iter().map(|event| LogEntry {
            tx_id,
            emitter,
            event,
        }));
    }
}
