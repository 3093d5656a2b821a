//! The long-lived per-network manifest of deployed contracts
//!
//! The manifest is written by earlier releases and read by this one. The only
//! mutation performed here is promotion of confirmed records, which happens on
//! explicit operator confirmation.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use alloy_primitives::{Address, B256};
use release_common::types::DeploymentRecord;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    errors::ReleaseError,
    utils::{read_json_file, write_json_file},
};

/// The deployments, roles, and identities known on one network
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// The relayer identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relayer: Option<Address>,
    /// The governance multisig identity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multisig: Option<Address>,
    /// Expected role identifiers, keyed by role name
    #[serde(default)]
    pub roles: BTreeMap<String, B256>,
    /// Deployed contracts, keyed by logical name
    #[serde(default)]
    pub deployments: BTreeMap<String, DeploymentRecord>,
}

impl Manifest {
    /// Load the manifest at the given path, starting empty if it does not exist
    pub async fn load(path: &Path) -> Result<Self, ReleaseError> {
        let Some(mut manifest) = read_json_file::<Manifest>(path).await? else {
            warn!("no manifest at {}, starting from an empty one", path.display());
            return Ok(Manifest::default());
        };

        // Hand-written entries may omit the name, which is implied by the key
        for (name, record) in manifest.deployments.iter_mut() {
            if record.name.is_empty() {
                record.name = name.clone();
            }
        }

        Ok(manifest)
    }

    /// Write the manifest to the given path
    pub async fn save(&self, path: &Path) -> Result<(), ReleaseError> {
        write_json_file(path, self).await
    }

    /// The record of the named deployment
    pub fn deployment(&self, name: &str) -> Option<&DeploymentRecord> {
        self.deployments.get(name)
    }

    /// The address of the named deployment
    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.deployment(name).map(|record| record.address)
    }

    /// Copy a confirmed record into the manifest, keyed by its logical name
    pub fn promote(&mut self, record: DeploymentRecord) {
        self.deployments.insert(record.name.clone(), record);
    }
}

/// A shared handle to the manifest of the network a release targets
///
/// Promotions are applied under the write lock and saved before the lock is
/// released, so promotions from concurrent deployments never interleave.
#[derive(Clone, Debug)]
pub struct ManifestHandle {
    /// The file the manifest is saved to on promotion, if any
    path: Option<PathBuf>,
    /// The manifest contents
    inner: Arc<RwLock<Manifest>>,
}

impl ManifestHandle {
    /// Load the manifest at the given path
    pub async fn open(path: PathBuf) -> Result<Self, ReleaseError> {
        let manifest = Manifest::load(&path).await?;
        Ok(Self {
            path: Some(path),
            inner: Arc::new(RwLock::new(manifest)),
        })
    }

    /// Wrap a manifest that is never written to disk
    pub fn in_memory(manifest: Manifest) -> Self {
        Self {
            path: None,
            inner: Arc::new(RwLock::new(manifest)),
        }
    }

    /// A copy of the current manifest contents
    pub async fn snapshot(&self) -> Manifest {
        self.inner.read().await.clone()
    }

    /// Promote a confirmed record and persist the manifest
    pub async fn promote(&self, record: DeploymentRecord) -> Result<(), ReleaseError> {
        let mut manifest = self.inner.write().await;
        info!(
            "promoting {} ({:#x}) into the manifest",
            record.name, record.address
        );
        let mut updated = manifest.clone();
        updated.promote(record);

        if let Some(path) = &self.path {
            updated.save(path).await?;
        }

        *manifest = updated;
        Ok(())
    }
}
