//! Definitions of CLI arguments and commands for the release scripts

use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, Subcommand};
use release_common::constants::{
    DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_MAX_IN_FLIGHT, DEFAULT_PROXY_ARTIFACT,
    DEFAULT_RECEIPT_POLL_INTERVAL_MS,
};

use crate::{
    commands::{deploy, prepare_upgrade, propose_admin},
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_CACHE_DIR, DEFAULT_MANIFEST_DIR, DEFAULT_PROPOSALS_DIR,
        DEFAULT_RELEASES_DIR, DEFAULT_RPC_URL,
    },
    errors::ReleaseError,
    types::ExecutionSettings,
};

/// Deploy releases, prepare upgrades, and propose governance actions
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Arguments shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// The command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Arguments shared by every command
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// The network the release targets, naming its cache and manifest files
    #[arg(short, long, env = "NETWORK")]
    pub network: String,

    /// Network RPC URL
    #[arg(short, long, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    /// Private key of the deployer
    #[arg(long = "pkey", env = "PKEY", hide_env_values = true)]
    pub priv_key: Option<String>,

    /// Directory holding release configurations
    #[arg(long, default_value = DEFAULT_RELEASES_DIR)]
    pub releases_dir: PathBuf,

    /// Directory holding the per-network release caches
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Directory holding the per-network manifests
    #[arg(long, default_value = DEFAULT_MANIFEST_DIR)]
    pub manifest_dir: PathBuf,

    /// Directory holding compilation artifacts
    #[arg(long, default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,

    /// The artifact of the proxy placed in front of upgradeable contracts
    #[arg(long, default_value = DEFAULT_PROXY_ARTIFACT)]
    pub proxy_artifact: String,

    /// The maximum number of transactions in flight at once
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    pub max_in_flight: usize,

    /// How long to wait for a transaction to confirm before giving up
    #[arg(long, default_value_t = DEFAULT_CONFIRMATION_TIMEOUT_SECS)]
    pub confirmation_timeout_secs: u64,

    /// The interval between receipt polls
    #[arg(long, default_value_t = DEFAULT_RECEIPT_POLL_INTERVAL_MS)]
    pub poll_interval_ms: u64,
}

impl GlobalArgs {
    /// The confirmation tunables selected on the command line
    pub fn execution_settings(&self) -> ExecutionSettings {
        ExecutionSettings {
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            proxy_artifact: self.proxy_artifact.clone(),
        }
    }
}

/// The release commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy, or resume deploying, the contracts of a release
    Deploy(DeployArgs),
    /// Deploy new implementations for the upgrades of a release
    PrepareUpgrade(PrepareUpgradeArgs),
    /// Assemble and submit the governance proposal of a release
    ProposeAdmin(ProposeAdminArgs),
}

impl Command {
    /// Run the command
    pub async fn run(self, global: &GlobalArgs) -> Result<(), ReleaseError> {
        match self {
            Command::Deploy(args) => deploy(global, args).await,
            Command::PrepareUpgrade(args) => prepare_upgrade(global, args).await,
            Command::ProposeAdmin(args) => propose_admin(global, args).await,
        }
    }
}

/// Deploy the contracts of a release
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// The release to deploy
    pub release: String,

    /// Copy each confirmed deployment into the network manifest
    #[arg(long)]
    pub promote: bool,

    /// Skip the confirmation prompt before promoting
    #[arg(short, long, requires = "promote")]
    pub yes: bool,

    /// Submit again where a previous run may have broadcast without recording
    /// the transaction, or where the recorded transaction reverted
    #[arg(long)]
    pub force_resubmit: bool,
}

/// Prepare the upgrades of a release
#[derive(Args, Debug)]
pub struct PrepareUpgradeArgs {
    /// The release whose upgrades to prepare
    pub release: String,

    /// Submit again where a previous run may have broadcast without recording
    /// the transaction, or where the recorded transaction reverted
    #[arg(long)]
    pub force_resubmit: bool,
}

/// Propose the upgrades and admin actions of a release
#[derive(Args, Debug)]
pub struct ProposeAdminArgs {
    /// The release to propose
    pub release: String,

    /// The proposal title
    pub title: String,

    /// The proposal description
    pub description: String,

    /// The relay service endpoint; without one the proposal is written to disk
    #[arg(long, env = "RELAY_URL")]
    pub relay_url: Option<String>,

    /// The relay service API key
    #[arg(long, env = "RELAY_API_KEY", hide_env_values = true)]
    pub relay_api_key: Option<String>,

    /// Directory proposals are written to when no relay is configured
    #[arg(long, default_value = DEFAULT_PROPOSALS_DIR)]
    pub proposals_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command};

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from([
            "release",
            "--network",
            "sepolia",
            "deploy",
            "v2",
            "--promote",
            "--yes",
        ])
        .unwrap();

        assert_eq!(cli.global.network, "sepolia");
        assert_eq!(cli.global.max_in_flight, 4);
        match cli.command {
            Command::Deploy(args) => {
                assert_eq!(args.release, "v2");
                assert!(args.promote && args.yes && !args.force_resubmit);
            }
            _ => panic!("expected deploy"),
        }
    }

    #[test]
    fn test_yes_requires_promote() {
        assert!(Cli::try_parse_from(["release", "-n", "sepolia", "deploy", "v2", "--yes"]).is_err());
    }
}
