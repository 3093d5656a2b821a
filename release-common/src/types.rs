//! The release data model: deployment records, prepared upgrades, and
//! governance proposal payloads

use std::fmt::{self, Display};

use alloy_primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::VERSION_SENTINEL;

/// The kind of a deployed contract
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractKind {
    /// A contract deployed directly, without a proxy
    #[default]
    Immutable,
    /// A proxy delegating to a replaceable implementation
    UpgradeableProxy,
}

impl Display for ContractKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractKind::Immutable => write!(f, "immutable"),
            ContractKind::UpgradeableProxy => write!(f, "upgradeable-proxy"),
        }
    }
}

/// The progress of a single deployment transaction, derived from cache contents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeploymentState {
    /// Nothing has been submitted yet
    Fresh,
    /// A transaction was submitted but its result has not been recorded
    PendingConfirmation {
        /// The hash of the submitted transaction
        tx_hash: TxHash,
    },
    /// The deployment is confirmed; any earlier hash is historical
    Confirmed {
        /// The address of the deployed contract
        address: Address,
    },
}

/// A confirmed deployment of one logical contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    /// The logical name, stable across upgrades
    #[serde(default)]
    pub name: String,
    /// The kind of the contract
    #[serde(default)]
    pub kind: ContractKind,
    /// The address of the contract (the proxy, for upgradeable contracts)
    pub address: Address,
    /// The live implementation behind a proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_address: Option<Address>,
    /// The resolved constructor arguments (of the implementation, for proxies)
    #[serde(default)]
    pub constructor_args: Vec<Value>,
    /// The resolved initializer arguments of a proxy
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub init_args: Vec<Value>,
    /// The version reported by the contract, or the zero sentinel
    #[serde(default = "default_version")]
    pub version: String,
}

/// A new implementation deployed for an existing proxy, awaiting governance approval
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedUpgrade {
    /// The logical name of the upgraded contract
    pub name: String,
    /// The address of the proxy being upgraded
    pub proxy_address: Address,
    /// The address of the newly deployed implementation
    pub new_implementation_address: Address,
    /// The resolved constructor arguments of the new implementation
    pub constructor_args: Vec<Value>,
    /// The version reported by the new implementation
    pub version: String,
}

/// How a proposal step invokes its target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CallType {
    /// A direct call of the target function
    Plain,
    /// Individually encoded calls wrapped in one `multicall(bytes[])`
    Multicall,
}

/// A typed input of a proposal step's target function
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionInput {
    /// The Solidity type, e.g. `address` or `tuple`
    #[serde(rename = "type")]
    pub ty: String,
    /// The parameter name, possibly empty
    #[serde(default)]
    pub name: String,
    /// The component inputs of a tuple type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<FunctionInput>,
}

impl FunctionInput {
    /// The canonical type string, with tuples expanded into their components
    pub fn canonical_type(&self) -> String {
        match self.ty.strip_prefix("tuple") {
            Some(suffix) => {
                let inner = self.components.iter().map(FunctionInput::canonical_type);
                format!("({}){suffix}", inner.collect::<Vec<_>>().join(","))
            }
            None => self.ty.clone(),
        }
    }
}

/// The function a proposal step invokes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetFunction {
    /// The function name
    pub name: String,
    /// The function inputs
    pub inputs: Vec<FunctionInput>,
}

impl TargetFunction {
    /// The canonical signature, e.g. `multicall(bytes[])`
    pub fn signature(&self) -> String {
        let inputs: Vec<String> = self.inputs.iter().map(FunctionInput::canonical_type).collect();
        format!("{}({})", self.name, inputs.join(","))
    }
}

/// One governance call in a batched proposal
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalStep {
    /// The target contract, as `<network>-<address>`
    pub target_contract_id: String,
    /// The function invoked on the target
    pub target_function: TargetFunction,
    /// The encoded inputs of the call, one JSON value per function input
    pub function_inputs: Vec<Value>,
    /// Whether the call is plain or multicall-wrapped
    pub call_type: CallType,
}

/// A contract referenced by a proposal, listed in the proposal metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalContract {
    /// The contract id, as `<network>-<address>`
    pub contract_id: String,
    /// The network the contract lives on
    pub network: String,
    /// The contract address
    pub address: Address,
    /// The logical name of the contract
    pub name: String,
    /// The contract ABI, as it appears in its compilation artifact
    pub abi: Value,
}

/// A batched governance proposal, ready for the relay service
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proposal {
    /// The proposal title
    pub title: String,
    /// The proposal description
    pub description: String,
    /// The distinct contracts targeted by the steps
    pub contracts: Vec<ProposalContract>,
    /// The ordered steps
    pub steps: Vec<ProposalStep>,
    /// The multisig executing the proposal
    pub via: Address,
    /// The kind of account executing the proposal
    pub via_type: String,
}

/// Format the id of a contract on a network, as used by the relay service
pub fn contract_id(network: &str, address: Address) -> String {
    format!("{network}-{address}")
}

/// The version recorded when a contract reports none
fn default_version() -> String {
    VERSION_SENTINEL.to_string()
}
