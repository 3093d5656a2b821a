//! Preparation of upgrades: new implementations deployed for existing
//! proxies, left inactive until governance approves the switch

use std::sync::Arc;

use release_common::{
    keys::ContractKeys,
    types::{ContractKind, PreparedUpgrade},
};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::info;

use crate::{
    concurrency::join_ordered,
    config::{ReleaseConfig, UpgradeSpec},
    context::ReleaseContext,
    encoding::encode_constructor_args,
    errors::ReleaseError,
    executor::{probe_version, run_slot},
    params::to_json_list,
    resolver::resolve,
    types::{DeployOptions, RunSummary},
};

/// Deploy the new implementation for one proxy and record the prepared upgrade
pub async fn prepare_upgrade(
    ctx: &ReleaseContext,
    spec: &UpgradeSpec,
    options: &DeployOptions,
) -> Result<PreparedUpgrade, ReleaseError> {
    let keys = ContractKeys::new(&spec.name);
    if let Some(prepared) = ctx
        .cache
        .get_as::<PreparedUpgrade>(&keys.prepared_upgrade())
        .await?
    {
        info!(
            "upgrade of {} already prepared at {:#x}",
            spec.name, prepared.new_implementation_address
        );
        return Ok(prepared);
    }

    let manifest = ctx.manifest.snapshot().await;
    let deployed = manifest.deployment(&spec.name).ok_or_else(|| {
        ReleaseError::MissingManifestEntry(format!("{} is not deployed on {}", spec.name, ctx.network))
    })?;
    if deployed.kind != ContractKind::UpgradeableProxy {
        return Err(ReleaseError::Schema(format!(
            "{} is deployed as {} and cannot be upgraded",
            spec.name, deployed.kind
        )));
    }

    let artifact = ctx.artifacts.load(&spec.artifact).await?;
    let constructor_args = resolve(&spec.constructor_args, &manifest)?;
    let constructor_calldata = encode_constructor_args(&artifact.abi, &constructor_args)?;
    let constructor_args = to_json_list(&constructor_args);
    ctx.cache
        .expect_equals(
            &keys.upgrade_constructor_args(),
            Value::Array(constructor_args.clone()),
        )
        .await?;

    let implementation = run_slot(
        ctx,
        &format!("{} upgrade implementation", spec.name),
        &keys.upgrade_slot(),
        &artifact.bytecode,
        &constructor_calldata,
        options,
    )
    .await?;

    let prepared = PreparedUpgrade {
        name: spec.name.clone(),
        proxy_address: deployed.address,
        new_implementation_address: implementation,
        constructor_args,
        version: probe_version(ctx.chain.as_ref(), implementation).await,
    };

    let value = serde_json::to_value(&prepared)
        .map_err(|e| ReleaseError::Store(format!("prepared upgrade of {}: {e}", spec.name)))?;
    ctx.cache.expect_equals(&keys.prepared_upgrade(), value).await?;

    info!(
        "prepared upgrade of {} ({:#x}) to {:#x}, version {}",
        prepared.name, prepared.proxy_address, implementation, prepared.version
    );
    Ok(prepared)
}

/// Prepare every upgrade of a release
pub async fn prepare_upgrades(
    ctx: Arc<ReleaseContext>,
    config: &ReleaseConfig,
    options: DeployOptions,
) -> Result<RunSummary<PreparedUpgrade>, ReleaseError> {
    if config.upgrades.is_empty() {
        return Err(ReleaseError::EmptyConfiguration(format!(
            "release {} names no upgrades",
            config.name
        )));
    }

    let names: Vec<String> = config.upgrades.iter().map(|u| u.name.clone()).collect();
    let mut tasks = JoinSet::new();
    for (index, spec) in config.upgrades.iter().cloned().enumerate() {
        let ctx = ctx.clone();
        tasks.spawn(async move { (index, prepare_upgrade(&ctx, &spec, &options).await) });
    }

    let summary = join_ordered(tasks, names).await;
    summary.log();
    Ok(summary)
}
