//! Release configurations: the contracts to deploy, the upgrades to prepare,
//! and the administrative calls to propose
//!
//! A configuration is validated and its parameters classified when it is
//! loaded, so a malformed entry fails before any network call.
//!
//! ```json
//! {
//!   "contracts": [
//!     { "name": "Token", "constructorArgs": ["multisig"] },
//!     {
//!       "name": "Staking",
//!       "kind": "upgradeable-proxy",
//!       "constructorArgs": [],
//!       "initArgs": ["deployment.Token", "roles.DEFAULT_ADMIN"]
//!     }
//!   ],
//!   "upgrades": [{ "name": "Vault", "artifact": "VaultV2", "constructorArgs": [] }],
//!   "adminActions": [
//!     { "contract": "Staking", "method": "setRate", "args": ["1000"] }
//!   ]
//! }
//! ```

use std::{
    collections::{BTreeSet, HashMap},
    path::Path,
};

use release_common::{constants::DEFAULT_INITIALIZER, keys::ContractKeys, types::ContractKind};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    constants::JSON_EXTENSION, errors::ReleaseError, params::Param, utils::read_json_file,
};

// ---------------
// | Raw Entries |
// ---------------

/// A release configuration as written on disk
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawReleaseConfig {
    /// The contracts to deploy, in order
    #[serde(default)]
    contracts: Vec<RawContract>,
    /// The upgrades to prepare, in order
    #[serde(default)]
    upgrades: Vec<RawUpgrade>,
    /// The administrative calls to propose, in order
    #[serde(default)]
    admin_actions: Vec<RawAdminAction>,
}

/// A contract entry as written on disk
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawContract {
    /// The logical name
    name: String,
    /// The artifact name, defaulting to the logical name
    artifact: Option<String>,
    /// The contract kind
    #[serde(default)]
    kind: ContractKind,
    /// The constructor arguments (of the implementation, for proxies)
    constructor_args: Option<Vec<Value>>,
    /// The initializer arguments of a proxy
    init_args: Option<Vec<Value>>,
    /// The initializer of a proxy
    initializer: Option<String>,
}

/// An upgrade entry as written on disk
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawUpgrade {
    /// The logical name of the upgraded proxy
    name: String,
    /// The artifact of the new implementation
    artifact: Option<String>,
    /// The constructor arguments of the new implementation
    constructor_args: Option<Vec<Value>>,
}

/// An admin action entry as written on disk
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawAdminAction {
    /// The logical name of the target contract
    contract: String,
    /// The artifact holding the target's ABI
    artifact: Option<String>,
    /// The method to call
    method: String,
    /// A single row of arguments
    args: Option<Vec<Value>>,
    /// Several rows of arguments, one call each
    rows: Option<Vec<Vec<Value>>>,
}

// ----------------------
// | Validated Entries |
// ----------------------

/// A validated release configuration
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// The release name, which namespaces its cache
    pub name: String,
    /// The contracts to deploy, in order
    pub contracts: Vec<ContractSpec>,
    /// The upgrades to prepare, in order
    pub upgrades: Vec<UpgradeSpec>,
    /// The administrative calls to propose, in order
    pub admin_actions: Vec<AdminAction>,
}

/// How a contract is deployed
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeploymentKind {
    /// Deployed directly
    Immutable,
    /// An implementation behind an ERC-1967 proxy, initialized on construction
    UpgradeableProxy {
        /// The initializer arguments
        init_args: Vec<Param>,
        /// The initializer method
        initializer: String,
    },
}

/// A contract to deploy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractSpec {
    /// The logical name
    pub name: String,
    /// The artifact holding its ABI and bytecode
    pub artifact: String,
    /// The constructor arguments (of the implementation, for proxies)
    pub constructor_args: Vec<Param>,
    /// How it is deployed
    pub kind: DeploymentKind,
}

impl ContractSpec {
    /// The kind recorded in the manifest
    pub fn contract_kind(&self) -> ContractKind {
        match self.kind {
            DeploymentKind::Immutable => ContractKind::Immutable,
            DeploymentKind::UpgradeableProxy { .. } => ContractKind::UpgradeableProxy,
        }
    }

    /// The names of the deployments referenced by its arguments
    pub fn dependencies(&self) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        self.constructor_args
            .iter()
            .for_each(|p| p.collect_deployment_refs(&mut deps));
        if let DeploymentKind::UpgradeableProxy { init_args, .. } = &self.kind {
            init_args.iter().for_each(|p| p.collect_deployment_refs(&mut deps));
        }
        deps
    }
}

/// A new implementation to deploy for an existing proxy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpgradeSpec {
    /// The logical name of the proxy
    pub name: String,
    /// The artifact of the new implementation
    pub artifact: String,
    /// The constructor arguments of the new implementation
    pub constructor_args: Vec<Param>,
}

/// An administrative call to propose
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdminAction {
    /// The logical name of the target contract
    pub contract: String,
    /// The artifact holding the target's ABI
    pub artifact: String,
    /// The method to call
    pub method: String,
    /// The argument rows; never empty
    pub rows: Vec<Vec<Param>>,
}

impl ReleaseConfig {
    /// Load `<releases_dir>/<release>.json`
    pub async fn load(releases_dir: &Path, release: &str) -> Result<Self, ReleaseError> {
        let path = releases_dir.join(format!("{release}.{JSON_EXTENSION}"));
        let json: Value = read_json_file(&path).await?.ok_or_else(|| {
            ReleaseError::Schema(format!("no release configuration at {}", path.display()))
        })?;

        Self::from_json(release, &json)
    }

    /// Validate a configuration and classify its parameters
    pub fn from_json(release: &str, json: &Value) -> Result<Self, ReleaseError> {
        let raw: RawReleaseConfig = serde_json::from_value(json.clone())
            .map_err(|e| ReleaseError::Schema(format!("release {release}: {e}")))?;

        let contracts = raw
            .contracts
            .into_iter()
            .map(parse_contract)
            .collect::<Result<Vec<_>, _>>()?;
        check_unique(contracts.iter().map(|c| c.name.as_str()), "contract")?;

        let upgrades = raw
            .upgrades
            .into_iter()
            .map(parse_upgrade)
            .collect::<Result<Vec<_>, _>>()?;
        check_unique(upgrades.iter().map(|u| u.name.as_str()), "upgrade")?;

        let admin_actions = raw
            .admin_actions
            .into_iter()
            .map(parse_admin_action)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: release.to_string(),
            contracts,
            upgrades,
            admin_actions,
        })
    }
}

/// Validate a contract entry
fn parse_contract(raw: RawContract) -> Result<ContractSpec, ReleaseError> {
    check_name(&raw.name, "contract")?;
    let constructor_args = required_args(raw.constructor_args, &raw.name, "constructorArgs")?;

    let kind = match raw.kind {
        ContractKind::Immutable => {
            if raw.init_args.is_some() || raw.initializer.is_some() {
                return Err(ReleaseError::Schema(format!(
                    "{}: initializer settings are only valid for upgradeable proxies",
                    raw.name
                )));
            }
            DeploymentKind::Immutable
        }
        ContractKind::UpgradeableProxy => DeploymentKind::UpgradeableProxy {
            init_args: required_args(raw.init_args, &raw.name, "initArgs")?,
            initializer: raw
                .initializer
                .unwrap_or_else(|| DEFAULT_INITIALIZER.to_string()),
        },
    };

    Ok(ContractSpec {
        artifact: raw.artifact.unwrap_or_else(|| raw.name.clone()),
        name: raw.name,
        constructor_args,
        kind,
    })
}

/// Validate an upgrade entry
fn parse_upgrade(raw: RawUpgrade) -> Result<UpgradeSpec, ReleaseError> {
    check_name(&raw.name, "upgrade")?;
    Ok(UpgradeSpec {
        constructor_args: required_args(raw.constructor_args, &raw.name, "constructorArgs")?,
        artifact: raw.artifact.unwrap_or_else(|| raw.name.clone()),
        name: raw.name,
    })
}

/// Validate an admin action entry
fn parse_admin_action(raw: RawAdminAction) -> Result<AdminAction, ReleaseError> {
    check_name(&raw.contract, "admin action target")?;
    let label = format!("{}.{}", raw.contract, raw.method);

    let raw_rows = match (raw.args, raw.rows) {
        (Some(args), None) => vec![args],
        (None, Some(rows)) if !rows.is_empty() => rows,
        (None, Some(_)) => {
            return Err(ReleaseError::Schema(format!("{label}: rows must not be empty")))
        }
        (Some(_), Some(_)) => {
            return Err(ReleaseError::Schema(format!(
                "{label}: give either args or rows, not both"
            )))
        }
        (None, None) => {
            return Err(ReleaseError::Schema(format!(
                "{label}: missing args; if none, set an empty list"
            )))
        }
    };

    let rows = raw_rows
        .iter()
        .map(|row| Param::parse_all(row))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ReleaseError::Schema(format!("{label}: {e}")))?;

    Ok(AdminAction {
        artifact: raw.artifact.unwrap_or_else(|| raw.contract.clone()),
        contract: raw.contract,
        method: raw.method,
        rows,
    })
}

/// Classify a required argument list
fn required_args(
    args: Option<Vec<Value>>,
    name: &str,
    field: &str,
) -> Result<Vec<Param>, ReleaseError> {
    let args = args.ok_or_else(|| {
        ReleaseError::Schema(format!("{name}: missing {field}; if none, set an empty list"))
    })?;

    Param::parse_all(&args).map_err(|e| ReleaseError::Schema(format!("{name}.{field}: {e}")))
}

/// Reject empty names
fn check_name(name: &str, what: &str) -> Result<(), ReleaseError> {
    if name.trim().is_empty() {
        return Err(ReleaseError::Schema(format!("{what} with an empty name")));
    }
    Ok(())
}

/// Reject names that share a cache-key prefix, e.g. `MyToken` and `my_token`
fn check_unique<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> Result<(), ReleaseError> {
    let mut seen: HashMap<String, &str> = HashMap::new();
    for name in names {
        let prefix = ContractKeys::new(name).prefix().to_string();
        if let Some(first) = seen.insert(prefix.clone(), name) {
            return Err(ReleaseError::Schema(format!(
                "duplicate {what} {name}: shares cache keys {prefix}.* with {first}"
            )));
        }
    }
    Ok(())
}
