//! Deployment of the contracts of a release
//!
//! Every deployment transaction is driven by a small state machine whose state
//! is read back from the cache on entry:
//!
//! - `Fresh`: set the write-ahead marker, submit, record the hash, confirm
//! - `PendingConfirmation`: confirm the recorded hash, never re-submitting
//! - `Confirmed`: nothing to do
//!
//! Because every transition is recorded before the next one begins, a run
//! interrupted at any point resumes where it left off.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes, TxHash};
use alloy_sol_types::SolCall;
use release_common::{
    constants::VERSION_SENTINEL,
    keys::{ContractKeys, TxSlot},
    types::{DeploymentRecord, DeploymentState},
};
use serde_json::{json, Value};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::{
    cache::Cache,
    chain::{await_receipt, ChainClient},
    concurrency::{join_ordered, Completions},
    config::{ContractSpec, DeploymentKind, ReleaseConfig},
    context::ReleaseContext,
    encoding::{encode_constructor_args, encode_function_call, encode_proxy_args},
    errors::ReleaseError,
    params::{to_json_list, Param},
    resolver::resolve,
    solidity::versionCall,
    types::{DeployOptions, RunSummary},
    utils::unix_timestamp,
};

/// Read the state of a deployment transaction from the cache
pub async fn slot_state(cache: &Cache, slot: &TxSlot) -> Result<DeploymentState, ReleaseError> {
    if let Some(address) = cache.get_as::<Address>(&slot.address_key).await? {
        return Ok(DeploymentState::Confirmed { address });
    }

    if let Some(tx_hash) = cache.get_as::<TxHash>(&slot.tx_key).await? {
        return Ok(DeploymentState::PendingConfirmation { tx_hash });
    }

    Ok(DeploymentState::Fresh)
}

/// Drive one deployment transaction to confirmation, returning the address of
/// the created contract
pub async fn run_slot(
    ctx: &ReleaseContext,
    label: &str,
    slot: &TxSlot,
    bytecode: &Bytes,
    args: &Bytes,
    options: &DeployOptions,
) -> Result<Address, ReleaseError> {
    match slot_state(&ctx.cache, slot).await? {
        DeploymentState::Confirmed { address } => Ok(address),
        DeploymentState::PendingConfirmation { tx_hash } => {
            info!("resuming {label} from pending transaction {tx_hash:#x}");
            let confirmed = {
                let _permit = ctx.gate.admit().await?;
                confirm(ctx, label, slot, tx_hash).await
            };

            match confirmed {
                Err(ReleaseError::ContractDeployment(reason)) if options.force_resubmit => {
                    warn!("{reason}; submitting {label} again");
                    ctx.cache.remove(&slot.tx_key).await?;
                    ctx.cache.remove(&slot.intent_key).await?;
                    submit_and_confirm(ctx, label, slot, bytecode, args).await
                }
                res => res,
            }
        }
        DeploymentState::Fresh => {
            if let Some(intent) = ctx.cache.get(&slot.intent_key).await? {
                if !options.force_resubmit {
                    return Err(ReleaseError::UnreconciledBroadcast(format!(
                        "{label} was being submitted ({intent}) but no transaction hash was \
                         recorded; check the deployer account for a transaction, then re-run \
                         with --force-resubmit"
                    )));
                }

                warn!("clearing write-ahead marker of {label} ({intent})");
                ctx.cache.remove(&slot.intent_key).await?;
            }

            submit_and_confirm(ctx, label, slot, bytecode, args).await
        }
    }
}

/// Submit a deployment and confirm it, holding an admission permit throughout
async fn submit_and_confirm(
    ctx: &ReleaseContext,
    label: &str,
    slot: &TxSlot,
    bytecode: &Bytes,
    args: &Bytes,
) -> Result<Address, ReleaseError> {
    let _permit = ctx.gate.admit().await?;

    ctx.cache
        .set(&slot.intent_key, json!({ "submittedAt": unix_timestamp() }))
        .await?;

    info!("submitting {label}");
    let tx_hash = ctx.chain.submit_deployment(bytecode.clone(), args.clone()).await?;
    ctx.cache.set_as(&slot.tx_key, &tx_hash).await?;

    confirm(ctx, label, slot, tx_hash).await
}

/// Await the receipt of a deployment and record the created address
async fn confirm(
    ctx: &ReleaseContext,
    label: &str,
    slot: &TxSlot,
    tx_hash: TxHash,
) -> Result<Address, ReleaseError> {
    let receipt = await_receipt(
        ctx.chain.as_ref(),
        tx_hash,
        ctx.settings.poll_interval,
        ctx.settings.confirmation_timeout,
    )
    .await?;

    if !receipt.success {
        return Err(ReleaseError::ContractDeployment(format!(
            "{label}: transaction {tx_hash:#x} reverted"
        )));
    }

    let address = receipt.contract_address.ok_or_else(|| {
        ReleaseError::ContractDeployment(format!(
            "{label}: transaction {tx_hash:#x} created no contract"
        ))
    })?;

    ctx.cache.set_as(&slot.address_key, &address).await?;
    info!(address = %address, tx_hash = %tx_hash, "{label} deployed");
    Ok(address)
}

/// Query the version a contract reports, or the zero sentinel if it reports none
pub async fn probe_version(chain: &dyn ChainClient, address: Address) -> String {
    let calldata = Bytes::from(versionCall {}.abi_encode());
    let reported = chain.call_view(address, calldata).await.and_then(|ret| {
        versionCall::abi_decode_returns(&ret, true)
            .map(|ret| ret._0)
            .map_err(|e| ReleaseError::Encoding(e.to_string()))
    });

    match reported {
        Ok(version) => version,
        Err(e) => {
            warn!("{address:#x} reports no version ({e}), recording {VERSION_SENTINEL}");
            VERSION_SENTINEL.to_string()
        }
    }
}

/// Deploy, or resume the deployment of, one contract
pub async fn deploy_contract(
    ctx: &ReleaseContext,
    spec: &ContractSpec,
    options: &DeployOptions,
) -> Result<DeploymentRecord, ReleaseError> {
    let keys = ContractKeys::new(&spec.name);

    let record = match confirmed_deployment(ctx, spec, &keys).await? {
        Some(record) => {
            info!("{} already deployed at {:#x}", spec.name, record.address);
            record
        }
        None => execute_deployment(ctx, spec, &keys, options).await?,
    };

    if options.promote {
        let manifest = ctx.manifest.snapshot().await;
        if manifest.deployment(&spec.name) != Some(&record) {
            ctx.manifest.promote(record.clone()).await?;
        }
    }

    Ok(record)
}

/// The record of a contract whose main address is already confirmed
///
/// Nothing is ever submitted for a confirmed contract. Metadata missing from
/// the cache is filled from what can be read: arguments are resolved against
/// the manifest and the version is probed.
async fn confirmed_deployment(
    ctx: &ReleaseContext,
    spec: &ContractSpec,
    keys: &ContractKeys,
) -> Result<Option<DeploymentRecord>, ReleaseError> {
    let cache = &ctx.cache;
    let Some(address) = cache.get_as::<Address>(&keys.main_slot().address_key).await? else {
        return Ok(None);
    };

    let constructor_args = match cache.get_as::<Vec<Value>>(&keys.constructor_args()).await? {
        Some(args) => args,
        None => recover_args(ctx, &spec.name, &spec.constructor_args).await,
    };

    let (implementation_address, init_args) = match &spec.kind {
        DeploymentKind::Immutable => (None, Vec::new()),
        DeploymentKind::UpgradeableProxy { init_args, .. } => {
            let implementation = cache.get_as::<Address>(&keys.impl_slot().address_key).await?;
            if implementation.is_none() {
                warn!("{} proxy is confirmed but its implementation is not recorded", spec.name);
            }
            let init_args = match cache.get_as::<Vec<Value>>(&keys.init_args()).await? {
                Some(args) => args,
                None => recover_args(ctx, &spec.name, init_args).await,
            };
            (implementation, init_args)
        }
    };

    let version = match cache.get_as::<String>(&keys.version()).await? {
        Some(version) => version,
        None => probe_version(ctx.chain.as_ref(), address).await,
    };

    Ok(Some(DeploymentRecord {
        name: spec.name.clone(),
        kind: spec.contract_kind(),
        address,
        implementation_address,
        constructor_args,
        init_args,
        version,
    }))
}

/// Resolve the arguments of a confirmed contract whose cache does not record them
async fn recover_args(ctx: &ReleaseContext, name: &str, params: &[Param]) -> Vec<Value> {
    let manifest = ctx.manifest.snapshot().await;
    match resolve(params, &manifest) {
        Ok(args) => to_json_list(&args),
        Err(e) => {
            warn!("cannot recover the arguments of {name}: {e}");
            Vec::new()
        }
    }
}

/// Resolve, encode, and deploy a contract
async fn execute_deployment(
    ctx: &ReleaseContext,
    spec: &ContractSpec,
    keys: &ContractKeys,
    options: &DeployOptions,
) -> Result<DeploymentRecord, ReleaseError> {
    let manifest = ctx.manifest.snapshot().await;
    let artifact = ctx.artifacts.load(&spec.artifact).await?;

    let constructor_args = resolve(&spec.constructor_args, &manifest)?;
    let constructor_calldata = encode_constructor_args(&artifact.abi, &constructor_args)?;
    let constructor_args = to_json_list(&constructor_args);
    ctx.cache
        .expect_equals(&keys.constructor_args(), Value::Array(constructor_args.clone()))
        .await?;

    let (address, implementation_address, init_args) = match &spec.kind {
        DeploymentKind::Immutable => {
            let address = run_slot(
                ctx,
                &spec.name,
                &keys.main_slot(),
                &artifact.bytecode,
                &constructor_calldata,
                options,
            )
            .await?;
            (address, None, Vec::new())
        }
        DeploymentKind::UpgradeableProxy {
            init_args,
            initializer,
        } => {
            let init_args = resolve(init_args, &manifest)?;
            // A proxy with no initializer call is constructed with empty data
            let skip_initializer =
                init_args.is_empty() && artifact.functions_named(initializer).is_empty();
            let init_calldata = if skip_initializer {
                Bytes::new()
            } else {
                let function = artifact.function_for(initializer, init_args.len())?;
                encode_function_call(function, &init_args)?
            };
            let init_args = to_json_list(&init_args);
            ctx.cache
                .expect_equals(&keys.init_args(), Value::Array(init_args.clone()))
                .await?;

            let implementation = run_slot(
                ctx,
                &format!("{} implementation", spec.name),
                &keys.impl_slot(),
                &artifact.bytecode,
                &constructor_calldata,
                options,
            )
            .await?;

            let proxy_artifact = ctx.artifacts.load(&ctx.settings.proxy_artifact).await?;
            let proxy = run_slot(
                ctx,
                &format!("{} proxy", spec.name),
                &keys.main_slot(),
                &proxy_artifact.bytecode,
                &encode_proxy_args(implementation, init_calldata),
                options,
            )
            .await?;

            (proxy, Some(implementation), init_args)
        }
    };

    let version = ctx
        .cache
        .get_or_compute(&keys.version(), || async move {
            Ok(Value::String(probe_version(ctx.chain.as_ref(), address).await))
        })
        .await?;

    Ok(DeploymentRecord {
        name: spec.name.clone(),
        kind: spec.contract_kind(),
        address,
        implementation_address,
        constructor_args,
        init_args,
        version: version.as_str().unwrap_or(VERSION_SENTINEL).to_string(),
    })
}

/// Deploy every contract of a release, concurrently up to the admission bound
///
/// A contract referencing an earlier contract of the same release waits for
/// it; with promotion enabled the reference then resolves to the new address.
/// Failures are collected per contract and never abort independent siblings.
pub async fn deploy_release(
    ctx: Arc<ReleaseContext>,
    config: &ReleaseConfig,
    options: DeployOptions,
) -> Result<RunSummary<DeploymentRecord>, ReleaseError> {
    if config.contracts.is_empty() {
        return Err(ReleaseError::EmptyConfiguration(format!(
            "release {} names no contracts",
            config.name
        )));
    }

    info!(
        "deploying {} contracts of release {} to {}",
        config.contracts.len(),
        config.name,
        ctx.network
    );

    let names: Vec<String> = config.contracts.iter().map(|c| c.name.clone()).collect();
    let completions = Completions::new(names.clone());
    let mut tasks = JoinSet::new();

    for (index, spec) in config.contracts.iter().enumerate() {
        let earlier = &names[..index];
        let waits_on: Vec<String> = spec
            .dependencies()
            .into_iter()
            .filter(|dep| earlier.contains(dep))
            .collect();

        let guard = completions.guard(&spec.name);
        let completions = completions.clone();
        let ctx = ctx.clone();
        let spec = spec.clone();

        tasks.spawn(async move {
            for dep in &waits_on {
                if completions.wait(dep).await != Some(true) {
                    let err = ReleaseError::UnresolvedReference(format!(
                        "{} references {dep}, which failed to deploy",
                        spec.name
                    ));
                    return (index, Err(err));
                }
            }

            let result = deploy_contract(&ctx, &spec, &options).await;
            guard.finish(result.is_ok());
            (index, result)
        });
    }

    let summary = join_ordered(tasks, names).await;
    summary.log();
    Ok(summary)
}
