//! The handles shared by every step of a release run

use std::sync::Arc;

use release_common::constants::DEFAULT_MAX_IN_FLIGHT;

use crate::{
    artifacts::ArtifactStore, cache::Cache, chain::ChainClient, concurrency::AdmissionGate,
    manifest::ManifestHandle, types::ExecutionSettings,
};

/// Everything a release run reads from or records to, passed explicitly
pub struct ReleaseContext {
    /// The network the release targets
    pub network: String,
    /// The release name
    pub release: String,
    /// The release's durable cache
    pub cache: Cache,
    /// The network's manifest
    pub manifest: ManifestHandle,
    /// The chain client
    pub chain: Arc<dyn ChainClient>,
    /// The compilation artifacts
    pub artifacts: ArtifactStore,
    /// The gate bounding in-flight transactions
    pub gate: AdmissionGate,
    /// Confirmation tunables
    pub settings: ExecutionSettings,
}

impl ReleaseContext {
    /// A context with the default in-flight bound and settings
    pub fn new(
        network: &str,
        release: &str,
        cache: Cache,
        manifest: ManifestHandle,
        chain: Arc<dyn ChainClient>,
        artifacts: ArtifactStore,
    ) -> Self {
        Self {
            network: network.to_string(),
            release: release.to_string(),
            cache,
            manifest,
            chain,
            artifacts,
            gate: AdmissionGate::new(DEFAULT_MAX_IN_FLIGHT),
            settings: ExecutionSettings::default(),
        }
    }

    /// Replace the in-flight bound
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.gate = AdmissionGate::new(max_in_flight);
        self
    }

    /// Replace the confirmation tunables
    pub fn with_settings(mut self, settings: ExecutionSettings) -> Self {
        self.settings = settings;
        self
    }
}
