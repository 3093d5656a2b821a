mod common;

use std::sync::atomic::Ordering;

use alloy_primitives::Address;
use common::{harness, test_manifest, MockChain};
use eyre::Result;
use release_common::types::{ContractKind, DeploymentRecord, PreparedUpgrade};
use release_scripts::{
    config::ReleaseConfig,
    errors::ReleaseError,
    manifest::{Manifest, ManifestHandle},
    types::DeployOptions,
    upgrade::{prepare_upgrade, prepare_upgrades},
};
use serde_json::json;

/// The proxy address of the deployed `Staking`
fn staking_proxy() -> Address {
    Address::repeat_byte(0x51)
}

/// A manifest holding `Staking` behind a proxy
fn manifest_with_staking() -> Manifest {
    let mut manifest = test_manifest();
    manifest.promote(DeploymentRecord {
        name: "Staking".to_string(),
        kind: ContractKind::UpgradeableProxy,
        address: staking_proxy(),
        implementation_address: Some(Address::repeat_byte(0x50)),
        constructor_args: vec![],
        init_args: vec![json!("0x0000000000000000000000000000000000000001")],
        version: "1.0.0".to_string(),
    });
    manifest
}

/// A release upgrading `Staking` to `StakingV2`
fn staking_upgrade() -> Result<ReleaseConfig> {
    Ok(ReleaseConfig::from_json(
        common::RELEASE,
        &json!({
            "upgrades": [{ "name": "Staking", "artifact": "StakingV2", "constructorArgs": [] }]
        }),
    )?)
}

#[tokio::test]
async fn test_prepare_upgrade() -> Result<()> {
    let h = harness(ManifestHandle::in_memory(manifest_with_staking())).await?;
    h.chain.set_version(MockChain::address(1), "2.0.0");
    let config = staking_upgrade()?;

    let prepared = prepare_upgrade(&h.ctx, &config.upgrades[0], &DeployOptions::default()).await?;
    assert_eq!(
        prepared,
        PreparedUpgrade {
            name: "Staking".to_string(),
            proxy_address: staking_proxy(),
            new_implementation_address: MockChain::address(1),
            constructor_args: vec![],
            version: "2.0.0".to_string(),
        }
    );

    let cache = h.ctx.cache.entries().await;
    assert_eq!(cache["staking.upgrade.impl.address"], json!(MockChain::address(1)));
    assert!(cache.contains_key("staking-upgrade-deploy-tx"));
    assert_eq!(cache["staking.prepared-upgrade"], serde_json::to_value(&prepared)?);

    // The proxy itself is untouched until governance approves the upgrade
    let manifest = h.ctx.manifest.snapshot().await;
    assert_eq!(manifest, manifest_with_staking());

    Ok(())
}

#[tokio::test]
async fn test_prepared_upgrade_is_not_redeployed() -> Result<()> {
    let h = harness(ManifestHandle::in_memory(manifest_with_staking())).await?;
    let config = staking_upgrade()?;

    let first = prepare_upgrades(h.ctx.clone(), &config, DeployOptions::default())
        .await?
        .into_result()?;
    let persists = h.store.persist_count();

    let second = prepare_upgrades(h.ctx.clone(), &config, DeployOptions::default())
        .await?
        .into_result()?;

    assert_eq!(first, second);
    assert_eq!(h.chain.submissions.load(Ordering::SeqCst), 1);
    assert_eq!(h.store.persist_count(), persists);

    Ok(())
}

#[tokio::test]
async fn test_missing_proxy() -> Result<()> {
    let h = harness(ManifestHandle::in_memory(test_manifest())).await?;
    let config = staking_upgrade()?;

    let res = prepare_upgrade(&h.ctx, &config.upgrades[0], &DeployOptions::default()).await;
    assert!(matches!(res, Err(ReleaseError::MissingManifestEntry(_))));
    assert_eq!(h.chain.submissions.load(Ordering::SeqCst), 0);

    Ok(())
}

#[tokio::test]
async fn test_empty_upgrades_rejected() -> Result<()> {
    let h = harness(ManifestHandle::in_memory(manifest_with_staking())).await?;
    let config = ReleaseConfig::from_json(common::RELEASE, &json!({ "upgrades": [] }))?;

    let res = prepare_upgrades(h.ctx.clone(), &config, DeployOptions::default()).await;
    assert!(matches!(res, Err(ReleaseError::EmptyConfiguration(_))));

    Ok(())
}

#[tokio::test]
async fn test_missing_constructor_args_rejected() {
    let res = ReleaseConfig::from_json(
        common::RELEASE,
        &json!({ "upgrades": [{ "name": "Staking", "artifact": "StakingV2" }] }),
    );
    assert!(matches!(res, Err(ReleaseError::Schema(_))));
}
