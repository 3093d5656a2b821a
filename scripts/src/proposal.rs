//! Assembly of batched governance proposals
//!
//! A proposal lists the prepared upgrades of a release first, then its
//! administrative calls, in configuration order. Calls whose first parameter is
//! a struct, or that are given several argument rows, are wrapped in a single
//! `multicall(bytes[])` on the same contract: each row is encoded as a complete
//! call payload here, so the relay never has to encode struct parameters.

use alloy::json_abi::Function;
use alloy_primitives::Address;
use alloy_sol_types::SolCall;
use itertools::Itertools;
use release_common::{
    keys::ContractKeys,
    types::{
        contract_id, CallType, FunctionInput, PreparedUpgrade, Proposal, ProposalContract,
        ProposalStep, TargetFunction,
    },
};
use serde_json::Value;
use tracing::info;

use crate::{
    artifacts::{Artifact, ArtifactStore},
    cache::Cache,
    config::{AdminAction, ReleaseConfig, UpgradeSpec},
    constants::{MULTICALL_METHOD, PROPOSAL_VIA_TYPE, TUPLE_TYPE_PREFIX},
    context::ReleaseContext,
    encoding::{encode_function_call, target_function},
    errors::ReleaseError,
    manifest::Manifest,
    params::to_json_list,
    resolver::resolve,
    solidity::multicallCall,
    types::RunSummary,
};

/// The name of the proxy upgrade entry point
const UPGRADE_METHOD: &str = "upgradeTo";

/// Builds the ordered steps of a proposal
pub struct ProposalAssembler<'a> {
    /// The network the proposal targets
    network: &'a str,
    /// The release cache holding prepared upgrades
    cache: &'a Cache,
    /// The artifacts holding target ABIs
    artifacts: &'a ArtifactStore,
    /// The manifest the targets and parameters resolve against
    manifest: Manifest,
    /// The steps so far
    steps: Vec<ProposalStep>,
    /// The targets of the steps so far, possibly repeated
    contracts: Vec<ProposalContract>,
}

impl<'a> ProposalAssembler<'a> {
    /// An empty assembler over the state of a release
    pub async fn new(ctx: &'a ReleaseContext) -> Self {
        Self {
            network: &ctx.network,
            cache: &ctx.cache,
            artifacts: &ctx.artifacts,
            manifest: ctx.manifest.snapshot().await,
            steps: Vec::new(),
            contracts: Vec::new(),
        }
    }

    /// Add an `upgradeTo` step for a prepared upgrade
    pub async fn add_upgrade(&mut self, spec: &UpgradeSpec) -> Result<(), ReleaseError> {
        let key = ContractKeys::new(&spec.name).prepared_upgrade();
        let prepared: PreparedUpgrade = self.cache.get_as(&key).await?.ok_or_else(|| {
            ReleaseError::MissingPreparedUpgrade(format!(
                "{}; run prepare-upgrade for this release first",
                spec.name
            ))
        })?;
        let artifact = self.artifacts.load(&spec.artifact).await?;

        let target = self.add_contract(&prepared.name, prepared.proxy_address, &artifact);
        self.steps.push(ProposalStep {
            target_contract_id: target,
            target_function: upgrade_function(),
            function_inputs: vec![Value::String(
                prepared.new_implementation_address.to_string(),
            )],
            call_type: CallType::Plain,
        });

        Ok(())
    }

    /// Add a step for an administrative call, wrapping it in a multicall if needed
    pub async fn add_admin_action(&mut self, action: &AdminAction) -> Result<(), ReleaseError> {
        let address = self.manifest.address_of(&action.contract).ok_or_else(|| {
            ReleaseError::MissingManifestEntry(format!(
                "{} is not deployed on {}",
                action.contract, self.network
            ))
        })?;
        let artifact = self.artifacts.load(&action.artifact).await?;

        let rows = action
            .rows
            .iter()
            .map(|row| resolve(row, &self.manifest))
            .collect::<Result<Vec<_>, _>>()?;
        let first_row = rows.first().ok_or_else(|| {
            ReleaseError::Schema(format!("{}.{}: no arguments", action.contract, action.method))
        })?;
        let function = artifact.function_for(&action.method, first_row.len())?;

        let takes_struct = function
            .inputs
            .first()
            .is_some_and(|input| input.ty.starts_with(TUPLE_TYPE_PREFIX));

        let step = if takes_struct || rows.len() > 1 {
            let multicall = multicall_function(&artifact)?;
            let payloads = rows
                .iter()
                .map(|row| encode_function_call(function, row))
                .map_ok(|payload| Value::String(payload.to_string()))
                .collect::<Result<Vec<_>, _>>()?;

            info!(
                "wrapping {} call(s) of {}.{} in {MULTICALL_METHOD}",
                payloads.len(),
                action.contract,
                action.method
            );
            (target_function(multicall), vec![Value::Array(payloads)], CallType::Multicall)
        } else {
            // Encode once so malformed arguments fail here rather than at the relay
            encode_function_call(function, first_row)?;
            (target_function(function), to_json_list(first_row), CallType::Plain)
        };

        let target = self.add_contract(&action.contract, address, &artifact);
        let (target_function, function_inputs, call_type) = step;
        self.steps.push(ProposalStep {
            target_contract_id: target,
            target_function,
            function_inputs,
            call_type,
        });

        Ok(())
    }

    /// Add every upgrade and admin action of a release, collecting each item's outcome
    pub async fn add_all(&mut self, config: &ReleaseConfig) -> RunSummary<()> {
        let mut outcomes = Vec::new();
        for upgrade in &config.upgrades {
            let res = self.add_upgrade(upgrade).await;
            outcomes.push((format!("upgrade {}", upgrade.name), res));
        }
        for action in &config.admin_actions {
            let res = self.add_admin_action(action).await;
            outcomes.push((format!("{}.{}", action.contract, action.method), res));
        }

        RunSummary { outcomes }
    }

    /// The assembled proposal, executed by the manifest's multisig
    pub fn finish(self, title: &str, description: &str) -> Result<Proposal, ReleaseError> {
        if self.steps.is_empty() {
            return Err(ReleaseError::EmptyConfiguration(
                "no upgrades or admin actions to propose".to_string(),
            ));
        }

        let via = self
            .manifest
            .multisig
            .ok_or_else(|| ReleaseError::MissingIdentity("multisig".to_string()))?;

        let contracts = self
            .contracts
            .into_iter()
            .unique_by(|c| c.contract_id.clone())
            .collect();

        Ok(Proposal {
            title: title.to_string(),
            description: description.to_string(),
            contracts,
            steps: self.steps,
            via,
            via_type: PROPOSAL_VIA_TYPE.to_string(),
        })
    }

    /// Record a step target, returning its contract id
    fn add_contract(
        &mut self,
        name: &str,
        address: Address,
        artifact: &Artifact,
    ) -> String {
        let id = contract_id(self.network, address);
        self.contracts.push(ProposalContract {
            contract_id: id.clone(),
            network: self.network.to_string(),
            address,
            name: name.to_string(),
            abi: artifact.raw_abi.clone(),
        });
        id
    }
}

/// Assemble the proposal of a release: its prepared upgrades, then its admin actions
///
/// Every item is attempted and every failure logged before the first one is
/// returned, so one run reports all the problems with a configuration.
pub async fn assemble_proposal(
    ctx: &ReleaseContext,
    config: &ReleaseConfig,
    title: &str,
    description: &str,
) -> Result<Proposal, ReleaseError> {
    let mut assembler = ProposalAssembler::new(ctx).await;
    let summary = assembler.add_all(config).await;
    if !summary.is_success() {
        summary.log();
        if let Some(e) = summary.outcomes.into_iter().find_map(|(_, res)| res.err()) {
            return Err(e);
        }
    }

    let proposal = assembler.finish(title, description)?;
    info!(
        "assembled proposal with {} steps across {} contracts: {}",
        proposal.steps.len(),
        proposal.contracts.len(),
        proposal.steps.iter().map(|s| s.target_function.signature()).join(", ")
    );
    Ok(proposal)
}

/// The `upgradeTo(address)` step target
fn upgrade_function() -> TargetFunction {
    TargetFunction {
        name: UPGRADE_METHOD.to_string(),
        inputs: vec![FunctionInput {
            ty: "address".to_string(),
            name: "newImplementation".to_string(),
            components: vec![],
        }],
    }
}

/// The artifact's `multicall(bytes[])` entry point
fn multicall_function(artifact: &Artifact) -> Result<&Function, ReleaseError> {
    artifact
        .functions_named(MULTICALL_METHOD)
        .iter()
        .find(|f| f.signature() == multicallCall::SIGNATURE)
        .ok_or_else(|| {
            ReleaseError::UnsupportedMulticall(format!(
                "{} has no {}",
                artifact.name,
                multicallCall::SIGNATURE
            ))
        })
}

#[cfg(test)]
mod tests {
    use alloy_sol_types::SolCall;

    use super::upgrade_function;
    use crate::solidity::upgradeToCall;

    #[test]
    fn test_upgrade_signature() {
        assert_eq!(upgrade_function().signature(), upgradeToCall::SIGNATURE);
    }
}
