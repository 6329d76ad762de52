//! Deployment configuration
//!
//! Every flag can also be supplied through the environment, so the tool runs
//! unchanged from scripts and CI.

use clap::Parser;
use contracts::chain::ChainConfig;
use std::path::PathBuf;
use types::errors::UnitsError;
use types::ids::Address;
use types::units::{parse_ether, Amount};

/// Label the default deployer identity is derived from.
pub const DEFAULT_DEPLOYER_LABEL: &str = "custody-deployer";

#[derive(Debug, Clone, Parser)]
#[command(
    name = "custody-deploy",
    version,
    about = "Deploy and link the authorization manager and secure vault"
)]
pub struct DeployConfig {
    /// Network name recorded in the deployment file
    #[arg(long, env = "CUSTODY_NETWORK", default_value = "localhost")]
    pub network: String,

    /// Chain identifier recorded in the deployment file
    #[arg(long, env = "CUSTODY_CHAIN_ID", default_value_t = 31337)]
    pub chain_id: u64,

    /// Where to write the deployment record
    #[arg(
        short,
        long,
        env = "CUSTODY_DEPLOYMENT_FILE",
        default_value = "deployment.json"
    )]
    pub output: PathBuf,

    /// Deployer identity (0x-prefixed hex); derived when omitted
    #[arg(long, env = "CUSTODY_DEPLOYER")]
    pub deployer: Option<Address>,

    /// After linking, send this many units to the vault and check the balance
    #[arg(long, value_parser = parse_amount)]
    pub verify_deposit: Option<Amount>,
}

impl DeployConfig {
    pub fn deployer_address(&self) -> Address {
        self.deployer
            .unwrap_or_else(|| Address::from_label(DEFAULT_DEPLOYER_LABEL))
    }

    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            network: self.network.clone(),
            chain_id: self.chain_id,
        }
    }
}

fn parse_amount(input: &str) -> Result<Amount, UnitsError> {
    parse_ether(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeployConfig::try_parse_from(["custody-deploy"]).unwrap();
        assert_eq!(config.network, "localhost");
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.output, PathBuf::from("deployment.json"));
        assert_eq!(
            config.deployer_address(),
            Address::from_label(DEFAULT_DEPLOYER_LABEL)
        );
        assert_eq!(config.verify_deposit, None);
    }

    #[test]
    fn test_explicit_flags() {
        let deployer = Address::from_label("ops");
        let config = DeployConfig::try_parse_from([
            "custody-deploy",
            "--network",
            "sepolia",
            "--chain-id",
            "11155111",
            "--output",
            "out/sepolia.json",
            "--deployer",
            &deployer.to_string(),
            "--verify-deposit",
            "1.0",
        ])
        .unwrap();

        assert_eq!(config.chain_config().network, "sepolia");
        assert_eq!(config.chain_config().chain_id, 11155111);
        assert_eq!(config.deployer_address(), deployer);
        assert_eq!(config.verify_deposit, Some(1_000_000_000_000_000_000));
    }

    #[test]
    fn test_rejects_bad_deployer() {
        let result = DeployConfig::try_parse_from(["custody-deploy", "--deployer", "0x1234"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_negative_deposit() {
        let result =
            DeployConfig::try_parse_from(["custody-deploy", "--verify-deposit", "-1"]);
        assert!(result.is_err());
    }
}
