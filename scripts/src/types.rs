//! Type definitions used throughout the scripts

use std::time::Duration;

use release_common::constants::{
    DEFAULT_CONFIRMATION_TIMEOUT_SECS, DEFAULT_PROXY_ARTIFACT, DEFAULT_RECEIPT_POLL_INTERVAL_MS,
};
use tracing::{error, info};

use crate::errors::ReleaseError;

/// Operator choices for a deployment run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeployOptions {
    /// Copy each confirmed record into the manifest as soon as it completes
    pub promote: bool,
    /// Clear write-ahead markers and reverted transactions, and submit again
    pub force_resubmit: bool,
}

/// Tunables of transaction submission and confirmation
#[derive(Clone, Debug)]
pub struct ExecutionSettings {
    /// The upper bound on waiting for a single transaction to confirm
    pub confirmation_timeout: Duration,
    /// The interval between receipt polls
    pub poll_interval: Duration,
    /// The artifact of the proxy deployed in front of upgradeable contracts
    pub proxy_artifact: String,
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_RECEIPT_POLL_INTERVAL_MS),
            proxy_artifact: DEFAULT_PROXY_ARTIFACT.to_string(),
        }
    }
}

/// The per-item outcomes of a run, in configuration order
#[derive(Debug)]
pub struct RunSummary<T> {
    /// Each item's name and outcome
    pub outcomes: Vec<(String, Result<T, ReleaseError>)>,
}

impl<T> RunSummary<T> {
    /// The items that succeeded
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &T)> {
        self.outcomes
            .iter()
            .filter_map(|(name, res)| res.as_ref().ok().map(|v| (name.as_str(), v)))
    }

    /// The items that failed, with their reasons
    pub fn failed(&self) -> impl Iterator<Item = (&str, &ReleaseError)> {
        self.outcomes
            .iter()
            .filter_map(|(name, res)| res.as_ref().err().map(|e| (name.as_str(), e)))
    }

    /// Whether every item succeeded
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, res)| res.is_ok())
    }

    /// Log the outcome of every item
    pub fn log(&self) {
        for (name, _) in self.succeeded() {
            info!("{name}: ok");
        }
        for (name, e) in self.failed() {
            error!("{name}: {e}");
        }
    }

    /// The successful values, or an aggregate error if anything failed
    pub fn into_result(self) -> Result<Vec<T>, ReleaseError> {
        let total = self.outcomes.len();
        let failed = self.failed().count();
        if failed > 0 {
            return Err(ReleaseError::RunFailed { failed, total });
        }

        Ok(self.outcomes.into_iter().filter_map(|(_, res)| res.ok()).collect())
    }
}
