mod common;

use alloy_primitives::{keccak256, Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use common::{harness, harness_with, fast_settings, multisig, relayer, test_manifest, entries};
use eyre::Result;
use release_common::types::{
    contract_id, CallType, ContractKind, DeploymentRecord, PreparedUpgrade, Proposal,
};
use release_scripts::{
    config::ReleaseConfig,
    errors::ReleaseError,
    manifest::{Manifest, ManifestHandle},
    proposal::{assemble_proposal, ProposalAssembler},
    relay::{FileRelay, ProposalRelay},
};
use serde_json::{json, Value};

sol! {
    struct Config {
        address target;
        uint256 value;
    }

    function setConfig(Config config);
}

/// The address of the deployed `Governed`
fn governed() -> Address {
    Address::repeat_byte(0x60)
}

/// The proxy address of the deployed `Staking`
fn staking() -> Address {
    Address::repeat_byte(0x51)
}

/// The implementation prepared for `Staking`
fn staking_v2() -> Address {
    Address::repeat_byte(0x52)
}

/// A deployment record with the given name, kind, and address
fn record(name: &str, kind: ContractKind, address: Address) -> DeploymentRecord {
    DeploymentRecord {
        name: name.to_string(),
        kind,
        address,
        implementation_address: None,
        constructor_args: vec![],
        init_args: vec![],
        version: "1.0.0".to_string(),
    }
}

/// A manifest holding `Governed`, `Ungoverned`, and `Staking`
fn governed_manifest() -> Manifest {
    let mut manifest = test_manifest();
    manifest.promote(record("Governed", ContractKind::Immutable, governed()));
    manifest.promote(record("Ungoverned", ContractKind::Immutable, Address::repeat_byte(0x61)));
    manifest.promote(record("Staking", ContractKind::UpgradeableProxy, staking()));
    manifest
}

/// Assemble the proposal of the given release configuration
async fn propose(manifest: Manifest, config: Value) -> Result<Proposal, ReleaseError> {
    let h = harness(ManifestHandle::in_memory(manifest))
        .await
        .map_err(|e| ReleaseError::Store(e.to_string()))?;
    let config = ReleaseConfig::from_json(common::RELEASE, &config)?;
    assemble_proposal(&h.ctx, &config, "Q3 parameters", "Adjust configuration").await
}

#[tokio::test]
async fn test_multicall_fallback_encodes_each_row() -> Result<()> {
    let first = Address::repeat_byte(0x01);
    let second = Address::repeat_byte(0x02);

    let proposal = propose(
        governed_manifest(),
        json!({
            "adminActions": [{
                "contract": "Governed",
                "method": "setConfig",
                "rows": [[[first.to_string(), "5"]], [[second.to_string(), "6"]]]
            }]
        }),
    )
    .await?;

    assert_eq!(proposal.steps.len(), 1);
    let step = &proposal.steps[0];
    assert_eq!(step.call_type, CallType::Multicall);
    assert_eq!(step.target_function.signature(), "multicall(bytes[])");
    assert_eq!(step.target_contract_id, contract_id(common::NETWORK, governed()));

    let expected: Vec<Value> = [(first, 5u64), (second, 6u64)]
        .into_iter()
        .map(|(target, value)| {
            let call = setConfigCall {
                config: Config {
                    target,
                    value: U256::from(value),
                },
            };
            Value::String(Bytes::from(call.abi_encode()).to_string())
        })
        .collect();
    assert_eq!(step.function_inputs, vec![Value::Array(expected)]);

    Ok(())
}

#[tokio::test]
async fn test_single_struct_row_is_wrapped() -> Result<()> {
    let proposal = propose(
        governed_manifest(),
        json!({
            "adminActions": [{
                "contract": "Governed",
                "method": "setConfig",
                "args": [["0x0000000000000000000000000000000000000001", "5"]]
            }]
        }),
    )
    .await?;

    assert_eq!(proposal.steps[0].call_type, CallType::Multicall);
    assert_eq!(proposal.steps[0].function_inputs[0].as_array().map(Vec::len), Some(1));

    Ok(())
}

#[tokio::test]
async fn test_unsupported_multicall() {
    let res = propose(
        governed_manifest(),
        json!({
            "adminActions": [{
                "contract": "Ungoverned",
                "method": "setConfig",
                "args": [["0x0000000000000000000000000000000000000001", "5"]]
            }]
        }),
    )
    .await;

    assert!(matches!(res, Err(ReleaseError::UnsupportedMulticall(_))));
}

#[tokio::test]
async fn test_plain_call() -> Result<()> {
    let proposal = propose(
        governed_manifest(),
        json!({
            "adminActions": [{
                "contract": "Governed",
                "method": "grantRole",
                "args": ["roles.OPERATOR_ROLE", "relayer"]
            }]
        }),
    )
    .await?;

    let step = &proposal.steps[0];
    assert_eq!(step.call_type, CallType::Plain);
    assert_eq!(step.target_function.signature(), "grantRole(bytes32,address)");
    assert_eq!(
        step.function_inputs,
        vec![
            json!(keccak256("OPERATOR_ROLE").to_string()),
            json!(relayer().to_string())
        ]
    );
    assert_eq!(proposal.via, multisig());
    assert_eq!(proposal.via_type, "Safe");

    Ok(())
}

#[tokio::test]
async fn test_missing_method() {
    let res = propose(
        governed_manifest(),
        json!({ "adminActions": [{ "contract": "Governed", "method": "pause", "args": [] }] }),
    )
    .await;

    assert!(matches!(res, Err(ReleaseError::MissingMethod(_))));
}

#[tokio::test]
async fn test_upgrades_precede_admin_actions() -> Result<()> {
    let prepared = PreparedUpgrade {
        name: "Staking".to_string(),
        proxy_address: staking(),
        new_implementation_address: staking_v2(),
        constructor_args: vec![],
        version: "2.0.0".to_string(),
    };
    let cache = entries(&[("staking.prepared-upgrade", serde_json::to_value(&prepared)?)]);
    let h = harness_with(ManifestHandle::in_memory(governed_manifest()), cache, fast_settings())
        .await?;

    let config = ReleaseConfig::from_json(
        common::RELEASE,
        &json!({
            "upgrades": [{ "name": "Staking", "artifact": "StakingV2", "constructorArgs": [] }],
            "adminActions": [
                { "contract": "Governed", "method": "setFee", "args": ["30"] },
                { "contract": "Governed", "method": "setFee", "rows": [["40"], ["50"]] }
            ]
        }),
    )?;
    let proposal = assemble_proposal(&h.ctx, &config, "Upgrade", "Staking v2").await?;

    let signatures: Vec<String> = proposal
        .steps
        .iter()
        .map(|s| s.target_function.signature())
        .collect();
    assert_eq!(signatures, vec!["upgradeTo(address)", "setFee(uint256)", "multicall(bytes[])"]);
    assert_eq!(proposal.steps[0].target_contract_id, contract_id(common::NETWORK, staking()));
    assert_eq!(proposal.steps[0].function_inputs, vec![json!(staking_v2().to_string())]);

    // Targets are listed once each, in first-use order
    let targets: Vec<&str> = proposal.contracts.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(targets, vec!["Staking", "Governed"]);

    Ok(())
}

#[tokio::test]
async fn test_unprepared_upgrade() {
    let res = propose(
        governed_manifest(),
        json!({ "upgrades": [{ "name": "Staking", "artifact": "StakingV2", "constructorArgs": [] }] }),
    )
    .await;

    assert!(matches!(res, Err(ReleaseError::MissingPreparedUpgrade(_))));
}

#[tokio::test]
async fn test_empty_proposal_rejected() {
    let res = propose(governed_manifest(), json!({})).await;
    assert!(matches!(res, Err(ReleaseError::EmptyConfiguration(_))));
}

#[tokio::test]
async fn test_proposal_requires_multisig() {
    let mut manifest = governed_manifest();
    manifest.multisig = None;

    let res = propose(
        manifest,
        json!({ "adminActions": [{ "contract": "Governed", "method": "setFee", "args": ["30"] }] }),
    )
    .await;

    assert!(matches!(res, Err(ReleaseError::MissingIdentity(_))));
}

#[tokio::test]
async fn test_file_relay_writes_payload() -> Result<()> {
    let proposal = propose(
        governed_manifest(),
        json!({ "adminActions": [{ "contract": "Governed", "method": "setFee", "args": ["30"] }] }),
    )
    .await?;

    let dir = tempfile::tempdir()?;
    let relay = FileRelay::new(dir.path().to_path_buf(), common::RELEASE);
    let location = relay.create_proposal(&proposal).await?;

    let written: Proposal = serde_json::from_str(&std::fs::read_to_string(&location)?)?;
    assert_eq!(written, proposal);
    assert!(location.ends_with("v1-proposal.json"));

    Ok(())
}

#[tokio::test]
async fn test_every_action_failure_is_reported() -> Result<()> {
    let h = harness(ManifestHandle::in_memory(governed_manifest())).await?;
    let config = ReleaseConfig::from_json(
        common::RELEASE,
        &json!({
            "adminActions": [
                {
                    "contract": "Ungoverned",
                    "method": "setConfig",
                    "args": [["0x0000000000000000000000000000000000000001", "5"]]
                },
                { "contract": "Governed", "method": "setFee", "args": ["30"] },
                { "contract": "Governed", "method": "pause", "args": [] }
            ]
        }),
    )?;

    let mut assembler = ProposalAssembler::new(&h.ctx).await;
    let summary = assembler.add_all(&config).await;

    let failed: Vec<&str> = summary.failed().map(|(name, _)| name).collect();
    let succeeded: Vec<&str> = summary.succeeded().map(|(name, _)| name).collect();
    assert_eq!(failed, vec!["Ungoverned.setConfig", "Governed.pause"]);
    assert_eq!(succeeded, vec!["Governed.setFee"]);

    // Assembly refuses to produce a proposal, surfacing the first failure
    let res = assemble_proposal(&h.ctx, &config, "Fees", "Adjust fees").await;
    assert!(matches!(res, Err(ReleaseError::UnsupportedMulticall(_))));

    Ok(())
}
