//! Implementations of the release commands

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::info;

use crate::{
    artifacts::ArtifactStore,
    cache::{Cache, FileStore},
    chain::{ChainClient, RpcChainClient},
    cli::{DeployArgs, GlobalArgs, PrepareUpgradeArgs, ProposeAdminArgs},
    config::ReleaseConfig,
    constants::JSON_EXTENSION,
    context::ReleaseContext,
    errors::ReleaseError,
    executor::deploy_release,
    manifest::ManifestHandle,
    proposal::assemble_proposal,
    relay::{FileRelay, HttpRelay, ProposalRelay},
    types::DeployOptions,
    upgrade::prepare_upgrades,
    utils::prompt_for_confirmation,
};

/// Deploy, or resume deploying, the contracts of a release
pub async fn deploy(global: &GlobalArgs, args: DeployArgs) -> Result<(), ReleaseError> {
    let config = ReleaseConfig::load(&global.releases_dir, &args.release).await?;

    if args.promote && !args.yes {
        let prompt = format!(
            "Promote confirmed deployments of {} into the {} manifest?",
            args.release, global.network
        );
        let confirmed = prompt_for_confirmation(&prompt)
            .map_err(|e| ReleaseError::Aborted(e.to_string()))?;
        if !confirmed {
            return Err(ReleaseError::Aborted("promotion declined".to_string()));
        }
    }

    let chain = signing_client(global)?;
    let ctx = Arc::new(open_context(global, &args.release, chain).await?);
    let options = DeployOptions {
        promote: args.promote,
        force_resubmit: args.force_resubmit,
    };

    let records = deploy_release(ctx, &config, options).await?.into_result()?;
    for record in &records {
        info!(
            "{} ({}): {:#x}, version {}",
            record.name, record.kind, record.address, record.version
        );
    }

    Ok(())
}

/// Deploy new implementations for the upgrades of a release
pub async fn prepare_upgrade(
    global: &GlobalArgs,
    args: PrepareUpgradeArgs,
) -> Result<(), ReleaseError> {
    let config = ReleaseConfig::load(&global.releases_dir, &args.release).await?;
    let chain = signing_client(global)?;
    let ctx = Arc::new(open_context(global, &args.release, chain).await?);
    let options = DeployOptions {
        promote: false,
        force_resubmit: args.force_resubmit,
    };

    let prepared = prepare_upgrades(ctx, &config, options).await?.into_result()?;
    for upgrade in &prepared {
        info!(
            "{}: proxy {:#x} -> implementation {:#x}, version {}",
            upgrade.name, upgrade.proxy_address, upgrade.new_implementation_address, upgrade.version
        );
    }

    Ok(())
}

/// Assemble the governance proposal of a release and submit it
pub async fn propose_admin(global: &GlobalArgs, args: ProposeAdminArgs) -> Result<(), ReleaseError> {
    let config = ReleaseConfig::load(&global.releases_dir, &args.release).await?;
    let chain = Arc::new(RpcChainClient::read_only(&global.rpc_url)?);
    let ctx = open_context(global, &args.release, chain).await?;

    let proposal = assemble_proposal(&ctx, &config, &args.title, &args.description).await?;

    let relay: Box<dyn ProposalRelay> = match args.relay_url {
        Some(url) => Box::new(HttpRelay::new(&url, args.relay_api_key)?),
        None => Box::new(FileRelay::new(args.proposals_dir, &args.release)),
    };
    let location = relay.create_proposal(&proposal).await?;
    info!("proposal \"{}\" submitted: {location}", proposal.title);

    Ok(())
}

/// A chain client signing with the deployer key
fn signing_client(global: &GlobalArgs) -> Result<Arc<dyn ChainClient>, ReleaseError> {
    let priv_key = global.priv_key.as_deref().ok_or_else(|| {
        ReleaseError::ClientInitialization("a deployer key is required (--pkey or PKEY)".to_string())
    })?;
    Ok(Arc::new(RpcChainClient::new(priv_key, &global.rpc_url)?))
}

/// Open the cache, manifest, and artifacts of a release on the selected network
async fn open_context(
    global: &GlobalArgs,
    release: &str,
    chain: Arc<dyn ChainClient>,
) -> Result<ReleaseContext, ReleaseError> {
    let cache_path = network_file(&global.cache_dir, &global.network);
    let cache = Cache::open(FileStore::new(cache_path, release)).await?;
    let manifest = ManifestHandle::open(network_file(&global.manifest_dir, &global.network)).await?;
    let artifacts = ArtifactStore::new(global.artifacts_dir.clone());

    Ok(
        ReleaseContext::new(&global.network, release, cache, manifest, chain, artifacts)
            .with_max_in_flight(global.max_in_flight)
            .with_settings(global.execution_settings()),
    )
}

/// `<dir>/<network>.json`
fn network_file(dir: &Path, network: &str) -> PathBuf {
    dir.join(format!("{network}.{JSON_EXTENSION}"))
}
