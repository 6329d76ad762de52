//! Deployment protocol and record
//!
//! Steps, in order:
//! 1. Construct the authorization manager
//! 2. Construct the secure vault
//! 3. Link the manager to the vault
//! 4. Link the vault to the manager
//! 5. Persist both identities with network metadata and a timestamp
//!
//! Any failure aborts the run before the record is written.

use chrono::{DateTime, Utc};
use contracts::chain::Chain;
use contracts::errors::ChainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;
use types::ids::Address;
use types::units::{format_ether, Amount};

use crate::config::DeployConfig;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Deployer must not be the zero address")]
    InvalidDeployer,

    #[error("Deploying {component} failed: {source}")]
    Deploy {
        component: &'static str,
        #[source]
        source: ChainError,
    },

    #[error("Initializing {component} failed: {source}")]
    Initialize {
        component: &'static str,
        #[source]
        source: ChainError,
    },

    #[error("Deposit verification failed: {0}")]
    Verification(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable record of a completed deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub authorization_manager: Address,
    pub secure_vault: Address,
    pub network: String,
    pub chain_id: u64,
    pub deployed_at: DateTime<Utc>,
}

impl fmt::Display for DeploymentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Deployment Summary ===")?;
        writeln!(f, "AuthorizationManager: {}", self.authorization_manager)?;
        writeln!(f, "SecureVault: {}", self.secure_vault)?;
        writeln!(f, "Network: {}", self.network)?;
        write!(f, "Chain ID: {}", self.chain_id)
    }
}

/// Deploy and link both components on `chain`.
pub fn deploy(chain: &mut Chain, deployer: Address) -> Result<DeploymentInfo, DeployError> {
    if deployer.is_zero() {
        return Err(DeployError::InvalidDeployer);
    }
    info!(%deployer, network = %chain.config().network, "starting deployment");

    let manager = chain
        .deploy_authorization_manager(deployer)
        .map_err(|source| DeployError::Deploy {
            component: "AuthorizationManager",
            source,
        })?;
    info!(address = %manager, "AuthorizationManager deployed");

    let vault = chain
        .deploy_vault(deployer)
        .map_err(|source| DeployError::Deploy {
            component: "SecureVault",
            source,
        })?;
    info!(address = %vault, "SecureVault deployed");

    chain
        .initialize_authorization_manager(deployer, manager, vault)
        .map_err(|source| DeployError::Initialize {
            component: "AuthorizationManager",
            source,
        })?;
    info!(%vault, "AuthorizationManager initialized with vault address");

    chain
        .initialize_vault(deployer, vault, manager)
        .map_err(|source| DeployError::Initialize {
            component: "SecureVault",
            source,
        })?;
    info!(%manager, "SecureVault initialized with AuthorizationManager address");

    Ok(DeploymentInfo {
        authorization_manager: manager,
        secure_vault: vault,
        network: chain.config().network.clone(),
        chain_id: chain.config().chain_id,
        deployed_at: Utc::now(),
    })
}

/// Send `amount` from `from` into the vault and confirm it is fully accounted.
pub fn verify_deposit(
    chain: &mut Chain,
    info: &DeploymentInfo,
    from: Address,
    amount: Amount,
) -> Result<(), DeployError> {
    let vault = info.secure_vault;
    let before = chain
        .vault_balance(&vault)
        .map_err(|e| DeployError::Verification(e.to_string()))?;
    chain
        .transfer(from, vault, amount)
        .map_err(|e| DeployError::Verification(e.to_string()))?;
    let after = chain
        .vault_balance(&vault)
        .map_err(|e| DeployError::Verification(e.to_string()))?;

    if after.checked_sub(before) != Some(amount) {
        return Err(DeployError::Verification(format!(
            "expected vault balance to grow by {}, went from {} to {}",
            format_ether(amount),
            format_ether(before),
            format_ether(after)
        )));
    }
    info!(%vault, balance = %format_ether(after), "deposit verified");
    Ok(())
}

/// Write the record as pretty-printed JSON.
pub fn write_deployment_info(path: &Path, info: &DeploymentInfo) -> Result<(), DeployError> {
    let json = serde_json::to_string_pretty(info)?;
    fs::write(path, json).map_err(|source| DeployError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "deployment info saved");
    Ok(())
}

/// Load a previously written record.
pub fn read_deployment_info(path: &Path) -> Result<DeploymentInfo, DeployError> {
    let raw = fs::read_to_string(path).map_err(|source| DeployError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

/// Full run as driven by the command line.
pub fn run(config: &DeployConfig) -> Result<DeploymentInfo, DeployError> {
    let mut chain = Chain::new(config.chain_config());
    let deployer = config.deployer_address();
    let info = deploy(&mut chain, deployer)?;

    if let Some(amount) = config.verify_deposit {
        chain
            .fund(deployer, amount)
            .map_err(|e| DeployError::Verification(e.to_string()))?;
        verify_deposit(&mut chain, &info, deployer, amount)?;
    }

    write_deployment_info(&config.output, &info)?;
    Ok(info)
}
